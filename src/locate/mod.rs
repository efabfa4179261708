//! Locating interfaces, functions, implementations and comments.
//!
//! A [`Locator`] is configured with specs, then [`Locator::run`] resolves
//! them, loads every package involved and discovers matches concurrently.
//! Results are kept in one mutex-guarded index and handed out through walks
//! that visit entries in `(filename, offset)` order.
//!
//! ```no_run
//! use goannotate::locate::{CancelToken, LocateOptions, Locator};
//! use goannotate::toolchain::GoCommand;
//! use std::sync::Arc;
//!
//! let mut locator = Locator::new(Arc::new(GoCommand::default()), LocateOptions::default());
//! locator.add_functions(["example.com/m/data.Fn1$"]);
//! locator.run(&CancelToken::new())?;
//! locator.walk_functions(|entry, _file, _pkg| println!("{} @ {}", entry.name, entry.position));
//! # Ok::<(), goannotate::locate::LocateError>(())
//! ```

mod comments;
mod errors;
mod functions;
mod implementations;
mod interfaces;
pub mod util;

pub use errors::LocateError;

use crate::go::comments::CommentGroup;
use crate::go::position::Position;
use crate::go::syntax::{FuncDecl, InterfaceType, NodeRef, TypeSpec};
use crate::go::types::{FuncObject, MethodSet, Universe};
use crate::loader::{FileRecord, PackageLoader, PackageRecord};
use crate::spec;
use crate::toolchain::Toolchain;
use std::collections::HashMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

/// Which kinds of entries were found in a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HitMask(u8);

impl HitMask {
    pub const COMMENT: HitMask = HitMask(1);
    pub const FUNCTION: HitMask = HitMask(1 << 1);
    pub const INTERFACE: HitMask = HitMask(1 << 2);

    const NAMES: [(HitMask, &'static str); 3] = [
        (HitMask::COMMENT, "comment"),
        (HitMask::FUNCTION, "function"),
        (HitMask::INTERFACE, "interface"),
    ];

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: HitMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for HitMask {
    type Output = HitMask;

    fn bitor(self, rhs: HitMask) -> HitMask {
        HitMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for HitMask {
    fn bitor_assign(&mut self, rhs: HitMask) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for HitMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(mask, _)| self.contains(*mask))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&names.join(", "))
    }
}

#[derive(Debug, Clone, Default)]
pub struct LocateOptions {
    /// Worker threads; 0 uses the available parallelism.
    pub concurrency: usize,
    pub include_tests: bool,
    /// Do not fail when an interface or function spec matches nothing.
    pub ignore_missing: bool,
    pub include_methods: bool,
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct InterfaceEntry {
    /// `pkgpath.Name`.
    pub name: String,
    pub package: String,
    pub local_name: String,
    pub interface: InterfaceType,
    /// `None` when no ordinary type can implement the interface.
    pub method_set: Option<MethodSet>,
    pub decl: Arc<TypeSpec>,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct FunctionEntry {
    pub name: String,
    pub function: Arc<FuncObject>,
    /// `None` for abstract interface methods.
    pub decl: Option<Arc<FuncDecl>>,
    pub package: String,
    pub position: Position,
    /// Sorted, without duplicates.
    pub implements: Vec<String>,
}

impl FunctionEntry {
    pub fn filename(&self) -> &Path {
        self.position.filename()
    }
}

#[derive(Debug, Clone)]
pub struct CommentEntry {
    pub pattern: String,
    pub group: CommentGroup,
    /// The node the comment group is attached to.
    pub node: NodeRef,
    pub package: String,
    pub position: Position,
}

#[derive(Default)]
struct Index {
    interfaces: HashMap<String, InterfaceEntry>,
    functions: HashMap<String, FunctionEntry>,
    comments: HashMap<String, Vec<CommentEntry>>,
    hits: HashMap<PathBuf, HitMask>,
}

impl Index {
    fn mark(&mut self, filename: &Path, hit: HitMask) {
        *self.hits.entry(filename.to_path_buf()).or_default() |= hit;
    }
}

/// State shared by the discovery units of one run.
struct Discovery<'a> {
    universe: Universe,
    cancel: &'a CancelToken,
    siblings: CancelToken,
    first_error: Mutex<Option<LocateError>>,
}

impl<'a> Discovery<'a> {
    fn new(universe: Universe, cancel: &'a CancelToken) -> Self {
        Self {
            universe,
            cancel,
            siblings: CancelToken::new(),
            first_error: Mutex::new(None),
        }
    }

    fn check(&self) -> Result<(), LocateError> {
        if self.cancel.is_cancelled() || self.siblings.is_cancelled() {
            return Err(LocateError::Cancelled);
        }
        Ok(())
    }

    /// Runs one unit; the first failure is kept and cancels the others.
    fn unit(&self, f: impl FnOnce() -> Result<(), LocateError>) {
        if let Err(err) = f() {
            let mut slot = self
                .first_error
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if slot.is_none() {
                *slot = Some(err);
            }
            self.siblings.cancel();
        }
    }

    fn finish(self) -> Result<(), LocateError> {
        let slot = self
            .first_error
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.map_or(Ok(()), Err)
    }
}

pub struct Locator {
    options: LocateOptions,
    loader: PackageLoader,
    interface_specs: Vec<String>,
    function_specs: Vec<String>,
    package_specs: Vec<String>,
    comment_specs: Vec<String>,
    index: Mutex<Index>,
}

impl Locator {
    pub fn new(toolchain: Arc<dyn Toolchain>, options: LocateOptions) -> Self {
        Self {
            options,
            loader: PackageLoader::new(toolchain),
            interface_specs: Vec::new(),
            function_specs: Vec::new(),
            package_specs: Vec::new(),
            comment_specs: Vec::new(),
            index: Mutex::new(Index::default()),
        }
    }

    pub fn options(&self) -> &LocateOptions {
        &self.options
    }

    pub fn loader(&self) -> &PackageLoader {
        &self.loader
    }

    /// Interfaces to locate, as `path.pattern` specs or listing expressions.
    pub fn add_interfaces<I, S>(&mut self, specs: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interface_specs.extend(specs.into_iter().map(Into::into));
        self
    }

    /// Exported functions (and methods, if enabled) to locate.
    pub fn add_functions<I, S>(&mut self, specs: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.function_specs.extend(specs.into_iter().map(Into::into));
        self
    }

    /// Packages whose methods are checked against every located interface.
    pub fn add_packages<I, S>(&mut self, specs: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.package_specs.extend(specs.into_iter().map(Into::into));
        self
    }

    /// Regular expressions matched against comment text.
    pub fn add_comments<I, S>(&mut self, patterns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.comment_specs.extend(patterns.into_iter().map(Into::into));
        self
    }

    fn lock(&self) -> MutexGuard<'_, Index> {
        self.index.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resolves the configured specs, loads the packages they name and
    /// locates everything. Interfaces are located first since the
    /// implementation scan tests methods against all of them.
    pub fn run(&self, cancel: &CancelToken) -> Result<(), LocateError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.concurrency)
            .thread_name(|i| format!("locate-{i}"))
            .build()?;
        pool.install(|| self.run_in_pool(cancel))
    }

    fn run_in_pool(&self, cancel: &CancelToken) -> Result<(), LocateError> {
        let toolchain = self.loader.toolchain().as_ref();
        let mut errors: Vec<LocateError> = Vec::new();

        let mut expand = |specs: &[String]| {
            spec::expand_list_expressions(toolchain, specs).unwrap_or_else(|e| {
                errors.push(e.into());
                Vec::new()
            })
        };
        let interface_paths = expand(&self.interface_specs);
        let function_paths = expand(&self.function_specs);
        let packages = if self.package_specs.is_empty() {
            Vec::new()
        } else {
            match toolchain.list(&self.package_specs) {
                Ok(listed) => spec::dedup(listed),
                Err(e) => {
                    errors.push(e.into());
                    Vec::new()
                }
            }
        };

        let interfaces = spec::compile_all(&interface_paths).unwrap_or_else(|errs| {
            errors.extend(errs.into_iter().map(LocateError::from));
            Vec::new()
        });
        let functions = spec::compile_all(&function_paths).unwrap_or_else(|errs| {
            errors.extend(errs.into_iter().map(LocateError::from));
            Vec::new()
        });
        let comments = spec::compile_comments(&spec::dedup(self.comment_specs.iter().cloned()))
            .unwrap_or_else(|errs| {
                errors.extend(errs.into_iter().map(LocateError::from));
                Vec::new()
            });
        LocateError::from_many(errors)?;

        let to_load = spec::dedup(
            interfaces
                .iter()
                .map(|s| s.path.clone())
                .chain(functions.iter().map(|s| s.path.clone()))
                .chain(packages.iter().cloned()),
        );
        info!(packages = to_load.len(), "loading packages");
        self.loader.load_paths(&to_load, self.options.include_tests)?;

        let discovery = Discovery::new(self.loader.universe(), cancel);
        info!(specs = interfaces.len(), "locating interfaces");
        self.find_interfaces(&discovery, &interfaces)?;
        discovery.check()?;

        info!("locating functions, implementations and comments");
        rayon::join(
            || {
                rayon::join(
                    || discovery.unit(|| self.find_functions(&discovery, &functions)),
                    || discovery.unit(|| self.find_implementations(&discovery, &packages)),
                )
            },
            || discovery.unit(|| self.find_comments(&discovery, &comments)),
        );
        discovery.finish()
    }

    /// Hit mask of a loaded file; empty when nothing was found in it.
    pub fn hit_mask(&self, filename: &Path) -> HitMask {
        self.lock().hits.get(filename).copied().unwrap_or_default()
    }

    /// Visits located interfaces in `(filename, offset)` order.
    pub fn walk_interfaces(&self, mut f: impl FnMut(&InterfaceEntry, &FileRecord, &PackageRecord)) {
        let mut entries: Vec<InterfaceEntry> = self.lock().interfaces.values().cloned().collect();
        entries.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)));
        for entry in entries {
            if let Some((file, pkg)) = self.loader.lookup_file(entry.position.filename()) {
                f(&entry, &file, &pkg);
            }
        }
    }

    /// Visits located functions and methods in `(filename, offset)` order.
    pub fn walk_functions(&self, mut f: impl FnMut(&FunctionEntry, &FileRecord, &PackageRecord)) {
        let mut entries: Vec<FunctionEntry> = self.lock().functions.values().cloned().collect();
        entries.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)));
        for entry in entries {
            if let Some((file, pkg)) = self.loader.lookup_file(entry.filename()) {
                f(&entry, &file, &pkg);
            }
        }
    }

    /// Visits matched comments in `(filename, offset)` order. A comment
    /// matched by several patterns is visited once per pattern.
    pub fn walk_comments(&self, mut f: impl FnMut(&CommentEntry, &FileRecord, &PackageRecord)) {
        let mut entries: Vec<CommentEntry> =
            self.lock().comments.values().flatten().cloned().collect();
        entries.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.pattern.cmp(&b.pattern)));
        for entry in entries {
            if let Some((file, pkg)) = self.loader.lookup_file(entry.position.filename()) {
                f(&entry, &file, &pkg);
            }
        }
    }

    /// Visits, in filename order, the loaded files in which something was
    /// found.
    pub fn walk_files(&self, mut f: impl FnMut(&FileRecord, &PackageRecord, HitMask)) {
        let hits = self.lock().hits.clone();
        self.loader.walk_files(|file, pkg| {
            if let Some(mask) = hits.get(&file.path).filter(|m| !m.is_empty()) {
                f(file, pkg, *mask);
            }
        });
    }

    /// Visits every loaded file in filename order, including those with an
    /// empty hit mask.
    pub fn walk_all_files(&self, mut f: impl FnMut(&FileRecord, &PackageRecord, HitMask)) {
        let hits = self.lock().hits.clone();
        self.loader.walk_files(|file, pkg| {
            f(file, pkg, hits.get(&file.path).copied().unwrap_or_default());
        });
    }

    /// Visits loaded packages in import path order.
    pub fn walk_packages(&self, f: impl FnMut(&PackageRecord)) {
        self.loader.walk_packages(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_mask_display() {
        let cases = [
            (HitMask::COMMENT, "comment"),
            (HitMask::FUNCTION, "function"),
            (HitMask::INTERFACE, "interface"),
            (HitMask::COMMENT | HitMask::INTERFACE, "comment, interface"),
            (HitMask::INTERFACE | HitMask::COMMENT, "comment, interface"),
            (HitMask::default(), ""),
        ];
        for (mask, want) in cases {
            assert_eq!(mask.to_string(), want);
        }
    }

    #[test]
    fn hit_mask_accumulates() {
        let mut mask = HitMask::default();
        assert!(mask.is_empty());
        mask |= HitMask::FUNCTION;
        mask |= HitMask::FUNCTION;
        assert!(mask.contains(HitMask::FUNCTION));
        assert!(!mask.contains(HitMask::COMMENT));
        assert_eq!(mask, HitMask::FUNCTION);
    }

    #[test]
    fn first_error_wins_and_cancels_siblings() {
        let token = CancelToken::new();
        let discovery = Discovery::new(Universe::default(), &token);
        discovery.unit(|| Ok(()));
        assert!(discovery.check().is_ok());
        discovery.unit(|| {
            Err(LocateError::Lookup {
                kind: "functions",
                package: "a".into(),
            })
        });
        assert!(matches!(discovery.check(), Err(LocateError::Cancelled)));
        discovery.unit(|| Err(LocateError::Cancelled));
        assert!(!token.is_cancelled());
        let err = discovery.finish().unwrap_err();
        assert_eq!(err.to_string(), "locating functions: failed to lookup: a");
    }

    #[test]
    fn repeated_functions_replace_declarations_and_merge_implements() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("go.mod"), "module example.com/m\n").unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("a/a.go"), "package a\n\nfunc F() {}\n\nfunc G() {}\n").unwrap();
        let layout = crate::toolchain::ModuleLayout::new(dir.path()).unwrap();
        let locator = Locator::new(Arc::new(layout), LocateOptions::default());
        locator.loader.load_paths(&["example.com/m/a".to_string()], false).unwrap();

        let pkg = locator.loader.lookup_package("example.com/m/a").unwrap();
        let f = Arc::clone(&pkg.types.funcs[0]);
        let g = &pkg.types.funcs[1];
        let moved = Arc::new(FuncObject {
            name_span: g.name_span,
            decl: g.decl.clone(),
            ..(*f).clone()
        });

        locator.add_function(&f, vec!["example.com/m/b.J".to_string()]);
        locator.add_function(&moved, vec!["example.com/m/b.I".to_string(), "example.com/m/b.J".to_string()]);

        let mut entries = Vec::new();
        locator.walk_functions(|entry, _file, _pkg| entries.push(entry.clone()));
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.name, "example.com/m/a.F");
        assert_eq!(entry.position.line, 5);
        assert!(Arc::ptr_eq(&entry.function, &moved));
        assert!(Arc::ptr_eq(entry.decl.as_ref().unwrap(), g.decl.as_ref().unwrap()));
        assert_eq!(entry.implements, vec!["example.com/m/b.I", "example.com/m/b.J"]);
    }

    #[test]
    fn cancelled_token_stops_discovery() {
        let token = CancelToken::new();
        token.cancel();
        let discovery = Discovery::new(Universe::default(), &token);
        assert!(matches!(discovery.check(), Err(LocateError::Cancelled)));
    }
}
