//! Annotators: configured source transformations built on the locator and
//! the edit engine.
//!
//! An annotator type is registered in a [`Registry`] under a name. Each
//! `[[annotations]]` entry of the configuration names a type and carries
//! its options; the registry turns it into an [`Annotation`] that computes
//! [`Edits`] for a set of packages.

mod addlogcall;
mod copyright;
pub mod derive;
mod registry;
mod rmlogcall;

pub use addlogcall::AddLogCall;
pub use copyright::EnsureCopyright;
pub use registry::{Factory, Registry};
pub use rmlogcall::RmLogCall;

use crate::edit::{ApplyErrors, EditEngine, Edits, FileOutcome};
use crate::locate::{CancelToken, LocateError, LocateOptions, Locator};
use crate::toolchain::Toolchain;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("unknown annotator type {kind:?}{}", .suggestion.as_ref().map(|s| format!(", did you mean {s:?}?")).unwrap_or_default())]
    UnknownType {
        kind: String,
        suggestion: Option<String>,
    },

    #[error("annotation {name}: invalid options: {source}")]
    Options {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("annotation {name}: {message}")]
    Invalid { name: String, message: String },

    #[error("annotation {name}: failed to compile regexp {pattern:?}: {source}")]
    Pattern {
        name: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to locate functions and/or interface implementations: {0}")]
    Locate(#[from] LocateError),

    #[error(transparent)]
    Apply(#[from] ApplyErrors),
}

/// Options every annotator accepts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommonOptions {
    /// Packages to annotate when none are given on the command line.
    pub packages: Vec<String>,
    /// Worker threads; 0 defers to the run settings.
    pub concurrency: usize,
}

/// Which functions an annotator applies to.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TargetOptions {
    /// Interfaces whose implementations are annotated.
    pub interfaces: Vec<String>,
    /// Functions that are annotated.
    pub functions: Vec<String>,
}

/// What an annotation needs from its surroundings.
#[derive(Clone)]
pub struct AnnotateContext {
    pub toolchain: Arc<dyn Toolchain>,
    pub cancel: CancelToken,
    pub concurrency: usize,
}

impl AnnotateContext {
    pub fn new(toolchain: Arc<dyn Toolchain>) -> Self {
        Self {
            toolchain,
            cancel: CancelToken::new(),
            concurrency: 0,
        }
    }

    /// A locator that tolerates specs matching nothing.
    pub(crate) fn locator(&self, common: &CommonOptions, include_tests: bool) -> Locator {
        let concurrency = if common.concurrency == 0 {
            self.concurrency
        } else {
            common.concurrency
        };
        Locator::new(
            Arc::clone(&self.toolchain),
            LocateOptions {
                concurrency,
                include_tests,
                ignore_missing: true,
                include_methods: false,
            },
        )
    }
}

/// A configured annotator.
pub trait Annotation: Send + Sync {
    fn name(&self) -> &str;

    /// Registered type name of the annotator.
    fn kind(&self) -> &'static str;

    fn describe(&self) -> String;

    fn common(&self) -> &CommonOptions;

    /// Edits for `packages`.
    fn edits(&self, ctx: &AnnotateContext, packages: &[String]) -> Result<Edits, AnnotateError>;
}

/// Packages from the command line, or the configured ones when none are
/// given.
pub fn packages_for(annotation: &dyn Annotation, requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        annotation.common().packages.clone()
    } else {
        requested.to_vec()
    }
}

/// Computes the edits of `annotation` and applies them with `engine`.
pub fn run(
    annotation: &dyn Annotation,
    ctx: &AnnotateContext,
    engine: &EditEngine,
    output_root: Option<&Path>,
    packages: &[String],
) -> Result<Vec<FileOutcome>, AnnotateError> {
    let packages = packages_for(annotation, packages);
    info!(annotation = annotation.name(), kind = annotation.kind(), packages = packages.len(), "annotating");
    let edits = annotation.edits(ctx, &packages)?;
    Ok(engine.apply(output_root, &edits)?)
}

/// Deserializes an annotator's options from its configuration entry.
pub(crate) fn decode_options<T: for<'de> Deserialize<'de>>(
    name: &str,
    options: &serde_json::Map<String, serde_json::Value>,
) -> Result<T, AnnotateError> {
    serde_json::from_value(serde_json::Value::Object(options.clone())).map_err(|source| AnnotateError::Options {
        name: name.to_string(),
        source,
    })
}

/// Builds the description from a summary and a field manifest.
pub(crate) fn describe_fields(summary: &str, fields: &[(&str, &str)]) -> String {
    let mut out = summary.trim_end().to_string();
    out.push('\n');
    let width = fields.iter().map(|(f, _)| f.len()).max().unwrap_or(0);
    for (field, description) in fields {
        out.push_str(&format!("  {field:<width$}  {description}\n"));
    }
    out
}

/// Fields shared by every annotator, for manifests.
pub(crate) const COMMON_FIELDS: [(&str, &str); 4] = [
    ("type", "name of annotator type."),
    ("name", "name of annotation."),
    ("packages", "packages to be annotated."),
    ("concurrency", "the number of threads to use, zero for a sensible default."),
];

/// Fields of [`TargetOptions`], for manifests.
pub(crate) const TARGET_FIELDS: [(&str, &str); 2] = [
    ("interfaces", "list of interfaces whose implementations are to be annotated."),
    ("functions", "list of functions that are to be annotated."),
];
