use super::derive::{args_for_params, args_for_results, context_param, flatten};
use super::{
    decode_options, AnnotateContext, AnnotateError, Annotation, CommonOptions, Factory, TargetOptions,
    COMMON_FIELDS, TARGET_FIELDS,
};
use crate::config::AnnotationConfig;
use crate::edit::{Delta, Edits};
use crate::go::syntax::FuncDecl;
use crate::loader::FileRecord;
use crate::locate::util::import_block;
use crate::locate::{FunctionEntry, HitMask};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

const SUMMARY: &str = "an annotator to add function calls that are intended to log entry
and exit from functions. The signature of these calls is:

func (ctx <context_type>, functionName, callerLocation, format string, arguments ...interface{}) func(ctx <context_type>, format string, namedResults ...interface{})

and their invocation:

defer <logcall>(ctx, \"<function-name>\", \"<location>\", \"<format>\", <parameters>....)(ctx, \"<format>\", <results>)

The context argument is the first parameter when its type is context_type,
and nil otherwise. The logging function must return a function that is
deferred to capture named results and log them on function exit.
";

pub(super) const FACTORY: Factory = Factory {
    name: "addlogcall",
    summary: SUMMARY,
    fields: &[
        COMMON_FIELDS[0],
        COMMON_FIELDS[1],
        COMMON_FIELDS[2],
        COMMON_FIELDS[3],
        TARGET_FIELDS[0],
        TARGET_FIELDS[1],
        ("context_type", "type for the context parameter and result."),
        ("import", "import path for the logging function."),
        ("logcall", "invocation for the logging function."),
        ("ignore_empty_functions", "if set empty functions are ignored."),
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
    #[serde(alias = "contextType")]
    context_type: String,
    import: String,
    logcall: String,
    #[serde(alias = "ignoreEmptyFunctions")]
    ignore_empty_functions: bool,
}

/// Inserts a deferred logging call as the first statement of located
/// functions, and the import it needs.
pub struct AddLogCall {
    name: String,
    options: Options,
}

fn build(config: &AnnotationConfig) -> Result<Box<dyn Annotation>, AnnotateError> {
    let options: Options = decode_options(&config.name, &config.options)?;
    if options.logcall.trim().is_empty() {
        return Err(AnnotateError::Invalid {
            name: config.name.clone(),
            message: "logcall must be set".to_string(),
        });
    }
    Ok(Box::new(AddLogCall {
        name: config.name.clone(),
        options,
    }))
}

/// `dir/file.go:line`, where `dir` is the last component of the file's
/// directory.
fn location(filename: &Path, line: usize) -> String {
    let base = filename.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let parent = filename
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    format!("{parent}/{base}:{line}")
}

impl AddLogCall {
    fn comment(&self) -> String {
        format!("DO NOT EDIT, AUTO GENERATED BY {}#{}", FACTORY.name, self.name)
    }

    /// The statement inserted after the opening brace, without its comment.
    fn invocation(&self, entry: &FunctionEntry, decl: &FuncDecl, file: &FileRecord) -> String {
        let sig = &entry.function.signature;
        let context = context_param(sig, &self.options.context_type);
        let (params, param_args) = args_for_params(sig, context.is_some());
        let (results, result_args) = args_for_results(sig);
        let ctx = context.flatten().unwrap_or_else(|| "nil".to_string());
        let function = format!("{}.{}", entry.function.package, entry.function.name);
        let location = location(&file.path, file.syntax.lines.line(decl.span.start));
        format!(
            "\n\tdefer {logcall}({ctx}, \"{function}\", \"{location}\", {params})({ctx}, {results})",
            logcall = self.options.logcall,
            params = flatten(&params, &param_args),
            results = flatten(&results, &result_args),
        )
    }

    /// The first statement is a defer carrying the generated comment.
    fn already_annotated(&self, decl: &FuncDecl, file: &FileRecord, comment: &str) -> bool {
        let Some(first) = decl.body.as_ref().and_then(|b| b.statements.first()) else {
            return false;
        };
        if first.kind != "defer_statement" {
            return false;
        }
        file.comments
            .get(first)
            .is_some_and(|groups| groups.iter().any(|g| g.text().starts_with(comment)))
    }

    fn already_imported(&self, file: &FileRecord) -> bool {
        file.syntax
            .imports
            .iter()
            .flat_map(|decl| &decl.specs)
            .any(|spec| spec.path == self.options.import)
    }
}

impl Annotation for AddLogCall {
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
        debug!(annotation = %self.name, "locating functions to be annotated with a logcall");
        locator.run(&ctx.cancel)?;

        let comment = self.comment();
        let mut edits = Edits::new();
        let mut dirty = BTreeSet::new();
        locator.walk_functions(|entry, file, _pkg| {
            let Some(decl) = &entry.decl else {
                return;
            };
            let Some(body) = &decl.body else {
                return;
            };
            if self.options.ignore_empty_functions && body.statements.is_empty() {
                return;
            }
            if self.already_annotated(decl, file, &comment) {
                debug!(function = %entry.name, "already annotated");
                return;
            }
            let text = format!("{} // {comment}", self.invocation(entry, decl, file));
            debug!(function = %entry.name, at = %file.position(body.span.start), "insert logcall");
            edits
                .entry(file.path.clone())
                .or_default()
                .push(Delta::insert(body.after_lbrace(), text));
            dirty.insert(file.path.clone());
        });

        if !self.options.import.is_empty() {
            locator.walk_files(|file, _pkg, mask| {
                if !dirty.contains(&file.path) || !mask.contains(HitMask::FUNCTION) {
                    return;
                }
                if self.already_imported(file) {
                    debug!(file = %file.path.display(), import = %self.options.import, "already imported");
                    return;
                }
                let offset = import_block(&file.syntax).map_or(file.syntax.package.span.end, |block| block.end);
                edits
                    .entry(file.path.clone())
                    .or_default()
                    .push(Delta::insert(offset, format!("\nimport \"{}\"\n", self.options.import)));
            });
        }
        Ok(edits)
    }
}
