use super::{
    decode_options, AnnotateContext, AnnotateError, Annotation, CommonOptions, Factory, TargetOptions,
    COMMON_FIELDS, TARGET_FIELDS,
};
use crate::config::AnnotationConfig;
use crate::edit::{Delta, Edits};
use crate::go::position::Span;
use crate::loader::FileRecord;
use crate::locate::util::{comment_group_bounds, comment_groups_contain, function_calls, function_statements};
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

pub(super) const FACTORY: Factory = Factory {
    name: "rmlogcall",
    summary: "an annotator that removes instances of calls to functions.",
    fields: &[
        COMMON_FIELDS[0],
        COMMON_FIELDS[1],
        COMMON_FIELDS[2],
        COMMON_FIELDS[3],
        TARGET_FIELDS[0],
        TARGET_FIELDS[1],
        ("function_name_re", "the function call (regexp) to be removed."),
        (
            "comment",
            "comment that must appear in the comments associated with the function call if it is to be removed.",
        ),
        ("deferred", "if set requires that the function to be removed must be deferred."),
    ],
    build,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct Options {
    #[serde(flatten)]
    common: CommonOptions,
    #[serde(flatten)]
    targets: TargetOptions,
    #[serde(alias = "functionNameRE")]
    function_name_re: String,
    comment: String,
    deferred: bool,
}

/// Removes calls to a logging function from located functions. A call is
/// removed together with the comments attached to it, and only when one of
/// those comments contains the configured text.
pub struct RmLogCall {
    name: String,
    options: Options,
    call: Regex,
}

fn build(config: &AnnotationConfig) -> Result<Box<dyn Annotation>, AnnotateError> {
    let options: Options = decode_options(&config.name, &config.options)?;
    if options.function_name_re.is_empty() {
        return Err(AnnotateError::Invalid {
            name: config.name.clone(),
            message: "function_name_re must be set".to_string(),
        });
    }
    let call = Regex::new(&options.function_name_re).map_err(|source| AnnotateError::Pattern {
        name: config.name.clone(),
        pattern: options.function_name_re.clone(),
        source,
    })?;
    Ok(Box::new(RmLogCall {
        name: config.name.clone(),
        options,
        call,
    }))
}

/// Widens `span` to whole lines: back to the line start when only blanks
/// precede it, and over the newline that ends it.
fn whole_lines(file: &FileRecord, span: Span) -> Span {
    let bytes = file.source.as_bytes();
    let line_start = file
        .syntax
        .lines
        .line_start(file.syntax.lines.line(span.start))
        .unwrap_or(span.start);
    let start = if bytes[line_start..span.start].iter().all(|b| *b == b' ' || *b == b'\t') {
        line_start
    } else {
        span.start
    };
    let end = if bytes.get(span.end) == Some(&b'\n') {
        span.end + 1
    } else {
        span.end
    };
    Span::new(start, end)
}

impl Annotation for RmLogCall {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        FACTORY.name
    }

    fn describe(&self) -> String {
        FACTORY.describe()
    }

    fn common(&self) -> &CommonOptions {
        &self.options.common
    }

    fn edits(&self, ctx: &AnnotateContext, packages: &[String]) -> Result<Edits, AnnotateError> {
        let mut locator = ctx.locator(&self.options.common, false);
        locator
            .add_interfaces(self.options.targets.interfaces.iter().cloned())
            .add_functions(self.options.targets.functions.iter().cloned())
            .add_packages(packages.iter().cloned());
        debug!(annotation = %self.name, "locating functions to have a logcall removed");
        locator.run(&ctx.cancel)?;

        let mut edits = Edits::new();
        locator.walk_functions(|entry, file, _pkg| {
            let Some(decl) = &entry.decl else {
                return;
            };
            if function_statements(decl) == 0 {
                return;
            }
            for node in function_calls(decl, &self.call, self.options.deferred) {
                let groups = file.comments.get(&node).unwrap_or_default();
                if !comment_groups_contain(groups, &self.options.comment) {
                    continue;
                }
                let mut span = node.span;
                if let Some(bounds) = comment_group_bounds(groups) {
                    span.start = span.start.min(bounds.start);
                    span.end = span.end.max(bounds.end);
                }
                let span = whole_lines(file, span);
                debug!(
                    function = %entry.name,
                    from = %file.position(span.start),
                    to = %file.position(span.end),
                    "delete"
                );
                edits
                    .entry(file.path.clone())
                    .or_default()
                    .push(Delta::delete(span.start, span.len()));
            }
        });
        Ok(edits)
    }
}
