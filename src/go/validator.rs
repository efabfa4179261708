use crate::go::errors::ParseError;
use crate::go::parser::ErrorNode;
use crate::pool::with_parser;

fn report(errors: &[ErrorNode]) -> Result<(), ParseError> {
    match errors {
        [] => Ok(()),
        [only] => Err(ParseError::SyntaxError {
            line: only.start_point.row + 1,
            column: only.start_point.column + 1,
        }),
        many => Err(ParseError::MultipleSyntaxErrors { count: many.len() }),
    }
}

fn error_nodes(source: &str) -> Result<Vec<ErrorNode>, ParseError> {
    with_parser(|parser| parser.parse_with_source(source).map(|p| p.error_nodes()))?
}

/// Validate that an edited file has no more syntax errors than the file it
/// was derived from.
///
/// Offsets move when a file is edited, so errors are compared by count.
/// Files that were already broken may be edited as long as the edit does
/// not make things worse.
pub fn validate_edit(original: &str, edited: &str) -> Result<(), ParseError> {
    let before = error_nodes(original)?;
    let after = error_nodes(edited)?;
    if after.len() <= before.len() {
        return Ok(());
    }
    let introduced: Vec<ErrorNode> = after
        .into_iter()
        .filter(|e| {
            !before
                .iter()
                .any(|o| o.start_point == e.start_point && o.end_point == e.end_point)
        })
        .collect();
    match introduced.len() {
        0 => Err(ParseError::MultipleSyntaxErrors {
            count: before.len() + 1,
        }),
        _ => report(&introduced),
    }
}
