//! goannotate: locate and annotate Go source
//!
//! Packages are resolved through a [`toolchain::Toolchain`], parsed with
//! tree-sitter-go and indexed by a [`locate::Locator`], which finds
//! interfaces, functions, interface implementations and comments by source
//! position. Annotators turn located entries into offset-based
//! [`edit::Delta`]s that the [`edit::EditEngine`] applies in one pass per
//! file, pipes through a formatter and writes in place or under an output
//! root.
//!
//! # Example
//!
//! ```no_run
//! use goannotate::edit::{Delta, EditEngine, Edits};
//! use goannotate::format::Passthrough;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let mut edits = Edits::new();
//! edits.insert(
//!     PathBuf::from("pkg/file.go"),
//!     vec![Delta::insert(0, "// Copyright 2024 Example\n")],
//! );
//! let engine = EditEngine::new(Arc::new(Passthrough));
//! match engine.apply(None, &edits) {
//!     Ok(outcomes) => println!("{outcomes:?}"),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```

pub mod annotate;
pub mod config;
pub mod edit;
pub mod format;
pub mod go;
pub mod loader;
pub mod locate;
pub mod pool;
pub mod spec;
pub mod toolchain;

// Re-exports
pub use annotate::{AnnotateContext, AnnotateError, Annotation, Registry};
pub use config::{load_from_path, load_from_str, AnnotateConfig, ConfigError};
pub use edit::{apply_deltas, ApplyErrors, Delta, EditEngine, EditError, Edits};
pub use locate::{CancelToken, HitMask, LocateError, LocateOptions, Locator};
pub use toolchain::{GoCommand, ModuleLayout, Toolchain};
