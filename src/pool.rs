//! Thread-local parser pooling.
//!
//! Loading parses files on rayon workers; each worker keeps one parser
//! (with its compiled comment query) for the lifetime of the thread.

use crate::go::{GoParser, ParseError};
use std::cell::RefCell;

thread_local! {
    static GO_PARSER: RefCell<Option<GoParser>> = const { RefCell::new(None) };
}

/// Execute function with pooled parser instance.
///
/// On first call per thread, creates new parser. Subsequent calls reuse
/// the same parser instance.
///
/// # Example
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use goannotate::go::SourceFile;
/// use goannotate::pool::with_parser;
///
/// let file = with_parser(|parser| SourceFile::parse(parser, "package main\n"))??;
/// assert_eq!(file.package.name, "main");
/// # Ok(())
/// # }
/// ```
pub fn with_parser<F, R>(f: F) -> Result<R, ParseError>
where
    F: FnOnce(&mut GoParser) -> R,
{
    GO_PARSER.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            *slot = Some(GoParser::new()?);
        }
        slot.as_mut().map(f).ok_or(ParseError::ParseFailed)
    })
}
