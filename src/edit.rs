//! Offset-addressed edits and their application to files.
//!
//! Every edit is a [`Delta`] against the *original* bytes of a file. All of
//! a file's deltas are applied in one forward pass, the result is run
//! through a [`Formatter`] and written atomically, either in place or
//! mirrored under an output root.

use crate::format::{FormatError, Formatter};
use crate::go::{validate_edit, ParseError};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Deltas to apply, keyed by the file they apply to.
pub type Edits = BTreeMap<PathBuf, Vec<Delta>>;

/// A single edit against original file content.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a Delta does nothing until applied"]
pub enum Delta {
    Insert { offset: usize, text: String },
    Delete { offset: usize, len: usize },
    Replace { offset: usize, len: usize, text: String },
}

impl Delta {
    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Delta::Insert {
            offset,
            text: text.into(),
        }
    }

    pub fn delete(offset: usize, len: usize) -> Self {
        Delta::Delete { offset, len }
    }

    pub fn replace(offset: usize, len: usize, text: impl Into<String>) -> Self {
        Delta::Replace {
            offset,
            len,
            text: text.into(),
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            Delta::Insert { offset, .. } | Delta::Delete { offset, .. } | Delta::Replace { offset, .. } => *offset,
        }
    }

    /// Number of original bytes removed.
    pub fn removed(&self) -> usize {
        match self {
            Delta::Insert { .. } => 0,
            Delta::Delete { len, .. } | Delta::Replace { len, .. } => *len,
        }
    }

    /// Text written in place of the removed bytes.
    pub fn text(&self) -> &str {
        match self {
            Delta::Insert { text, .. } | Delta::Replace { text, .. } => text,
            Delta::Delete { .. } => "",
        }
    }

    // Inserts at an offset come before a removal starting there.
    fn rank(&self) -> u8 {
        match self {
            Delta::Insert { .. } => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delta::Insert { offset, text } => write!(f, "insert @ {offset}: {} bytes", text.len()),
            Delta::Delete { offset, len } => write!(f, "delete @ {offset}: {len} bytes"),
            Delta::Replace { offset, len, text } => {
                write!(f, "replace @ {offset}: {len} bytes with {} bytes", text.len())
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("edit [{start}, {end}) is out of range for content of length {len}")]
    OutOfRange { start: usize, end: usize, len: usize },

    #[error("edited content is not valid UTF-8")]
    InvalidUtf8,
}

/// Applies `deltas` to `content` in a single pass.
///
/// Deltas are ordered by offset, keeping the given order among equal ones.
/// A delta that starts inside bytes already removed by an earlier one only
/// removes what remains of its range.
pub fn apply_deltas(content: &[u8], deltas: &[Delta]) -> Result<Vec<u8>, EditError> {
    let mut sorted: Vec<&Delta> = deltas.iter().collect();
    sorted.sort_by_key(|d| (d.offset(), d.rank()));

    let growth: usize = sorted.iter().map(|d| d.text().len()).sum();
    let mut out = Vec::with_capacity(content.len() + growth);
    let mut cursor = 0;
    for delta in sorted {
        let start = delta.offset();
        let end = match start.checked_add(delta.removed()) {
            Some(end) if end <= content.len() => end,
            end => {
                return Err(EditError::OutOfRange {
                    start,
                    end: end.unwrap_or(usize::MAX),
                    len: content.len(),
                })
            }
        };
        if start > cursor {
            out.extend_from_slice(&content[cursor..start]);
        }
        out.extend_from_slice(delta.text().as_bytes());
        cursor = cursor.max(end);
    }
    out.extend_from_slice(&content[cursor..]);

    std::str::from_utf8(&out).map_err(|_| EditError::InvalidUtf8)?;
    Ok(out)
}

#[derive(Error, Debug)]
pub enum EditApplyError {
    #[error("failed to edit file: {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to edit file: {}: {source}", .path.display())]
    Delta {
        path: PathBuf,
        #[source]
        source: EditError,
    },

    #[error("failed to edit file: {}: edit introduces syntax errors: {source}{}", .path.display(), kept_note(.kept))]
    Syntax {
        path: PathBuf,
        kept: Option<PathBuf>,
        #[source]
        source: ParseError,
    },

    #[error("failed to edit file: {}: {source}{}", .path.display(), kept_note(.kept))]
    Format {
        path: PathBuf,
        kept: Option<PathBuf>,
        #[source]
        source: FormatError,
    },
}

fn kept_note(kept: &Option<PathBuf>) -> String {
    kept.as_ref()
        .map(|k| format!(" (edited content written to {})", k.display()))
        .unwrap_or_default()
}

impl EditApplyError {
    pub fn path(&self) -> &Path {
        match self {
            EditApplyError::Io { path, .. }
            | EditApplyError::Delta { path, .. }
            | EditApplyError::Syntax { path, .. }
            | EditApplyError::Format { path, .. } => path,
        }
    }
}

/// One failure per file that could not be edited.
#[derive(Error, Debug)]
#[error("{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))]
pub struct ApplyErrors(pub Vec<EditApplyError>);

/// What happened to one edited file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Written { source: PathBuf, destination: PathBuf },
    /// In-place edit whose result equals the original bytes.
    Unchanged { source: PathBuf },
}

/// Original and final content of a file, for previews.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub original: String,
    pub formatted: String,
}

pub struct EditEngine {
    formatter: Arc<dyn Formatter>,
    validate: bool,
}

impl EditEngine {
    pub fn new(formatter: Arc<dyn Formatter>) -> Self {
        Self {
            formatter,
            validate: false,
        }
    }

    /// Reject edits that introduce syntax errors before formatting.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Where each edited file is written. Without an output root files are
    /// edited in place; with one, they are mirrored under it relative to
    /// the longest common directory of all edited files.
    pub fn compute_outputs<'a>(
        output_root: Option<&Path>,
        files: impl IntoIterator<Item = &'a Path>,
    ) -> BTreeMap<PathBuf, PathBuf> {
        let files: Vec<&Path> = files.into_iter().collect();
        let Some(root) = output_root.filter(|r| !r.as_os_str().is_empty()) else {
            return files.iter().map(|f| (f.to_path_buf(), f.to_path_buf())).collect();
        };
        let prefix = match files.as_slice() {
            [] => return BTreeMap::new(),
            [single] => single.parent().map(Path::to_path_buf).unwrap_or_default(),
            many => common_prefix(many),
        };
        files
            .iter()
            .map(|f| {
                let relative = f.strip_prefix(&prefix).unwrap_or(f);
                let relative: PathBuf = relative
                    .components()
                    .filter(|c| matches!(c, Component::Normal(_)))
                    .collect();
                (f.to_path_buf(), root.join(relative))
            })
            .collect()
    }

    /// Formatted results without writing anything.
    pub fn preview(&self, edits: &Edits) -> Result<BTreeMap<PathBuf, FileChange>, ApplyErrors> {
        let mut changes = BTreeMap::new();
        let mut errors = Vec::new();
        for (path, deltas) in edits {
            match self.render(path, deltas) {
                Ok((original, formatted)) => {
                    changes.insert(
                        path.clone(),
                        FileChange {
                            original: String::from_utf8_lossy(&original).into_owned(),
                            formatted: String::from_utf8_lossy(&formatted).into_owned(),
                        },
                    );
                }
                Err(e) => errors.push(e),
            }
        }
        if errors.is_empty() {
            Ok(changes)
        } else {
            Err(ApplyErrors(errors))
        }
    }

    /// Applies, formats and writes every file in `edits`. Files that fail
    /// are reported together; files already written stay written.
    pub fn apply(&self, output_root: Option<&Path>, edits: &Edits) -> Result<Vec<FileOutcome>, ApplyErrors> {
        let outputs = Self::compute_outputs(output_root, edits.keys().map(PathBuf::as_path));
        let mut outcomes = Vec::with_capacity(edits.len());
        let mut errors = Vec::new();
        for (path, deltas) in edits {
            let destination = outputs.get(path).cloned().unwrap_or_else(|| path.clone());
            match self.apply_file(path, &destination, deltas) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => errors.push(e),
            }
        }
        if errors.is_empty() {
            Ok(outcomes)
        } else {
            Err(ApplyErrors(errors))
        }
    }

    fn apply_file(&self, path: &Path, destination: &Path, deltas: &[Delta]) -> Result<FileOutcome, EditApplyError> {
        info!(file = %path.display(), deltas = deltas.len(), "editing");
        for delta in deltas {
            debug!(file = %path.display(), %delta, text = %preview_text(delta.text()), "delta");
        }
        let io = |source: std::io::Error| EditApplyError::Io {
            path: path.to_path_buf(),
            source,
        };
        let (original, formatted) = self.render(path, deltas)?;
        if destination == path && formatted == original {
            return Ok(FileOutcome::Unchanged {
                source: path.to_path_buf(),
            });
        }
        let permissions = fs::metadata(path).map_err(io)?.permissions();
        if destination != path {
            if let Some(dir) = destination.parent() {
                fs::create_dir_all(dir).map_err(io)?;
            }
        }
        atomic_write(destination, &formatted, permissions).map_err(io)?;
        Ok(FileOutcome::Written {
            source: path.to_path_buf(),
            destination: destination.to_path_buf(),
        })
    }

    /// Original bytes and the edited, formatted bytes.
    fn render(&self, path: &Path, deltas: &[Delta]) -> Result<(Vec<u8>, Vec<u8>), EditApplyError> {
        let original = fs::read(path).map_err(|source| EditApplyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let edited = apply_deltas(&original, deltas).map_err(|source| EditApplyError::Delta {
            path: path.to_path_buf(),
            source,
        })?;

        if self.validate {
            let before = String::from_utf8_lossy(&original);
            let after = String::from_utf8_lossy(&edited);
            if let Err(source) = validate_edit(&before, &after) {
                return Err(EditApplyError::Syntax {
                    path: path.to_path_buf(),
                    kept: keep_edited(path, &edited),
                    source,
                });
            }
        }

        match self.formatter.format(&edited) {
            Ok(formatted) => Ok((original, formatted)),
            Err(source) => Err(EditApplyError::Format {
                path: path.to_path_buf(),
                kept: keep_edited(path, &edited),
                source,
            }),
        }
    }
}

fn preview_text(text: &str) -> String {
    text.chars().take(30).collect()
}

fn common_prefix(paths: &[&Path]) -> PathBuf {
    let mut prefix: Vec<Component<'_>> = match paths.first() {
        Some(first) => first.components().collect(),
        None => return PathBuf::new(),
    };
    for path in &paths[1..] {
        let shared = prefix
            .iter()
            .zip(path.components())
            .take_while(|(a, b)| **a == *b)
            .count();
        prefix.truncate(shared);
    }
    prefix.into_iter().collect()
}

/// Saves content that failed formatting or validation so it can be
/// inspected.
fn keep_edited(path: &Path, edited: &[u8]) -> Option<PathBuf> {
    let kept = tempfile::Builder::new()
        .prefix("annotate-")
        .suffix(".go")
        .tempfile()
        .and_then(|mut temp| {
            temp.write_all(edited)?;
            temp.keep().map_err(|e| e.error)
        });
    match kept {
        Ok((_, kept)) => {
            warn!(file = %path.display(), kept = %kept.display(), "wrote edited content");
            Some(kept)
        }
        Err(e) => {
            warn!(file = %path.display(), error = %e, "failed to keep edited content");
            None
        }
    }
}

/// Tempfile in the target directory, fsync, rename.
fn atomic_write(path: &Path, content: &[u8], permissions: fs::Permissions) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().set_permissions(permissions)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
