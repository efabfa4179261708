//! Package loading.
//!
//! Packages are resolved through a [`Toolchain`], every file is parsed in
//! parallel into an owned [`SourceFile`] with its [`CommentMap`], and each
//! package gets a [`TypeInfo`] table. Loading then verifies what a type
//! checker would reject outright and reports every failing package at once.
//!
//! Packages that loaded interfaces embed interfaces from are type-tabled as
//! dependencies so that method sets can be completed. They are not indexed.

use crate::go::comments::CommentMap;
use crate::go::position::{Position, Span};
use crate::go::syntax::{Decl, NamedType, SourceFile, TypeExpr};
use crate::go::types::{TypeInfo, Universe};
use crate::go::ParseError;
use crate::pool::with_parser;
use crate::toolchain::{ListingError, ResolvedPackage, Toolchain};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PackageFailure {
    #[error("failed to find: {path}{}", .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    NotFound { path: String, reason: Option<String> },

    #[error("failed to type check: {path}: {}", .reasons.join("; "))]
    TypeCheck { path: String, reasons: Vec<String> },
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Listing(#[from] ListingError),

    #[error(transparent)]
    Parser(#[from] ParseError),

    #[error("{}", join_failures(.0))]
    Packages(Vec<PackageFailure>),
}

fn join_failures(failures: &[PackageFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// A parsed file. `package` names the owning package by import path.
#[derive(Debug)]
pub struct FileRecord {
    pub path: PathBuf,
    pub package: String,
    pub source: Arc<str>,
    pub syntax: SourceFile,
    pub comments: CommentMap,
}

impl FileRecord {
    pub fn position(&self, offset: usize) -> Position {
        Position::new(&self.path, &self.syntax.lines, offset)
    }

    pub fn text(&self, span: Span) -> &str {
        self.source.get(span.start..span.end).unwrap_or_default()
    }
}

#[derive(Debug)]
pub struct PackageRecord {
    pub path: String,
    pub name: String,
    pub dir: PathBuf,
    /// In filename order.
    pub files: Vec<Arc<FileRecord>>,
    pub types: Arc<TypeInfo>,
}

#[derive(Default)]
struct Index {
    packages: BTreeMap<String, Arc<PackageRecord>>,
    files: BTreeMap<PathBuf, Arc<FileRecord>>,
    dependencies: BTreeMap<String, Arc<TypeInfo>>,
    unresolved: BTreeSet<String>,
}

impl Index {
    fn knows(&self, path: &str) -> bool {
        self.packages.contains_key(path) || self.dependencies.contains_key(path) || self.unresolved.contains(path)
    }

    /// Import path to package name for everything loaded so far.
    fn package_names(&self) -> HashMap<String, String> {
        self.dependencies
            .values()
            .map(|t| (t.path.clone(), t.name.clone()))
            .chain(self.packages.values().map(|p| (p.path.clone(), p.name.clone())))
            .collect()
    }
}

struct Unit {
    path: String,
    name: String,
    dir: PathBuf,
    files: Vec<PathBuf>,
    /// Files may also declare `<name>_test`.
    tests: bool,
}

type Parsed = Result<(Arc<str>, SourceFile, CommentMap), String>;

pub struct PackageLoader {
    toolchain: Arc<dyn Toolchain>,
    index: Mutex<Index>,
}

impl PackageLoader {
    pub fn new(toolchain: Arc<dyn Toolchain>) -> Self {
        Self {
            toolchain,
            index: Mutex::new(Index::default()),
        }
    }

    pub fn toolchain(&self) -> &Arc<dyn Toolchain> {
        &self.toolchain
    }

    fn lock(&self) -> MutexGuard<'_, Index> {
        self.index.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Loads `paths` (and their test variants when `include_tests`), parsing
    /// files on the current rayon pool. Nothing is indexed unless every
    /// package loads cleanly.
    pub fn load_paths(&self, paths: &[String], include_tests: bool) -> Result<(), LoadError> {
        if paths.is_empty() {
            return Ok(());
        }
        let resolved = self.toolchain.resolve(paths)?;

        let mut failures = Vec::new();
        let mut units = Vec::new();
        for pkg in resolved {
            if pkg.name.is_empty() || pkg.go_files.is_empty() {
                failures.push(PackageFailure::NotFound {
                    path: pkg.import_path.clone(),
                    reason: pkg.error.as_ref().map(|e| e.err.clone()),
                });
                continue;
            }
            let mut files = pkg.absolute(&pkg.go_files);
            if include_tests {
                files.extend(pkg.absolute(&pkg.test_go_files));
                if !pkg.xtest_go_files.is_empty() {
                    units.push(Unit {
                        path: format!("{}_test", pkg.import_path),
                        name: format!("{}_test", pkg.name),
                        dir: pkg.dir.clone(),
                        files: pkg.absolute(&pkg.xtest_go_files),
                        tests: false,
                    });
                }
            }
            files.sort();
            units.push(Unit {
                path: pkg.import_path,
                name: pkg.name,
                dir: pkg.dir,
                files,
                tests: include_tests,
            });
        }

        let jobs: Vec<(usize, &Path)> = units
            .iter()
            .enumerate()
            .flat_map(|(i, u)| u.files.iter().map(move |f| (i, f.as_path())))
            .collect();
        let parsed: Vec<(usize, PathBuf, Parsed)> = jobs
            .into_par_iter()
            .map(|(i, path)| (i, path.to_path_buf(), parse_file(path)))
            .collect();

        let mut by_unit: Vec<Vec<(PathBuf, Parsed)>> = units.iter().map(|_| Vec::new()).collect();
        for (i, path, result) in parsed {
            by_unit[i].push((path, result));
        }

        let mut names = self.lock().package_names();
        names.extend(units.iter().map(|u| (u.path.clone(), u.name.clone())));

        let mut records = Vec::with_capacity(units.len());
        for (unit, files) in units.into_iter().zip(by_unit) {
            match build_package(unit, files, &names) {
                Ok(record) => records.push(record),
                Err(failure) => failures.push(failure),
            }
        }
        if !failures.is_empty() {
            return Err(LoadError::Packages(failures));
        }

        let embedded: BTreeSet<String> = records.iter().flat_map(|r| foreign_embeds(&r.types)).collect();
        {
            let mut index = self.lock();
            for record in records {
                for file in &record.files {
                    debug!(file = %file.path.display(), "load: file");
                    index.files.insert(file.path.clone(), Arc::clone(file));
                }
                debug!(package = %record.path, "load: package");
                index.dependencies.remove(&record.path);
                index.packages.insert(record.path.clone(), Arc::new(record));
            }
        }
        self.load_dependencies(embedded);
        Ok(())
    }

    /// Type-tables the packages that `pending` names, and transitively the
    /// packages their interfaces embed from. A package that cannot be
    /// resolved or parsed is skipped with a warning; interfaces embedding
    /// from it have no method set.
    fn load_dependencies(&self, mut pending: BTreeSet<String>) {
        loop {
            let wanted: Vec<String> = {
                let index = self.lock();
                pending.into_iter().filter(|p| !index.knows(p)).collect()
            };
            if wanted.is_empty() {
                return;
            }
            let resolved = match self.toolchain.resolve(&wanted) {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!(packages = ?wanted, error = %e, "cannot resolve packages of embedded interfaces");
                    self.lock().unresolved.extend(wanted);
                    return;
                }
            };
            let names = self.lock().package_names();
            let tables: Vec<(String, Result<TypeInfo, String>)> = resolved
                .par_iter()
                .map(|pkg| (pkg.import_path.clone(), dependency_types(pkg, &names)))
                .collect();

            pending = BTreeSet::new();
            let mut index = self.lock();
            for (path, result) in tables {
                match result {
                    Ok(types) => {
                        debug!(package = %path, "load: dependency");
                        pending.extend(foreign_embeds(&types));
                        index.dependencies.insert(path, Arc::new(types));
                    }
                    Err(reason) => {
                        warn!(package = %path, %reason, "interfaces embedding from this package cannot be implemented");
                        index.unresolved.insert(path);
                    }
                }
            }
        }
    }

    pub fn lookup_package(&self, path: &str) -> Option<Arc<PackageRecord>> {
        self.lock().packages.get(path).cloned()
    }

    pub fn lookup_file(&self, filename: &Path) -> Option<(Arc<FileRecord>, Arc<PackageRecord>)> {
        let index = self.lock();
        let file = index.files.get(filename)?;
        let pkg = index.packages.get(&file.package)?;
        Some((Arc::clone(file), Arc::clone(pkg)))
    }

    pub fn position(&self, filename: &Path, offset: usize) -> Option<Position> {
        self.lock().files.get(filename).map(|f| f.position(offset))
    }

    /// Calls `f` for every loaded file in filename order. The index lock is
    /// not held during the calls.
    pub fn walk_files(&self, mut f: impl FnMut(&FileRecord, &PackageRecord)) {
        let snapshot: Vec<(Arc<FileRecord>, Arc<PackageRecord>)> = {
            let index = self.lock();
            index
                .files
                .values()
                .filter_map(|file| {
                    index
                        .packages
                        .get(&file.package)
                        .map(|pkg| (Arc::clone(file), Arc::clone(pkg)))
                })
                .collect()
        };
        for (file, pkg) in snapshot {
            f(&file, &pkg);
        }
    }

    /// Snapshot of the loaded files in filename order.
    pub fn files(&self) -> Vec<Arc<FileRecord>> {
        self.lock().files.values().cloned().collect()
    }

    /// Calls `f` for every loaded package in import path order.
    pub fn walk_packages(&self, mut f: impl FnMut(&PackageRecord)) {
        let snapshot: Vec<Arc<PackageRecord>> = self.lock().packages.values().cloned().collect();
        for pkg in snapshot {
            f(&pkg);
        }
    }

    /// Type tables of every loaded package and of the dependencies their
    /// interfaces embed from.
    pub fn universe(&self) -> Universe {
        let index = self.lock();
        Universe::new(
            index
                .dependencies
                .values()
                .cloned()
                .chain(index.packages.values().map(|p| Arc::clone(&p.types))),
        )
    }
}

fn parse_file(path: &Path) -> Parsed {
    let source: Arc<str> = fs::read_to_string(path)
        .map_err(|e| format!("{}: {e}", path.display()))?
        .into();
    let syntax = with_parser(|parser| SourceFile::parse(parser, &source))
        .and_then(|r| r)
        .map_err(|e| format!("{}: {e}", path.display()))?;
    let comments = CommentMap::new(&syntax.nodes, &syntax.comments, &syntax.lines);
    Ok((source, syntax, comments))
}

fn dependency_types(pkg: &ResolvedPackage, names: &HashMap<String, String>) -> Result<TypeInfo, String> {
    if pkg.name.is_empty() || pkg.go_files.is_empty() {
        return Err(pkg
            .error
            .as_ref()
            .map_or_else(|| "no Go files".to_string(), |e| e.err.clone()));
    }
    let mut files = pkg.absolute(&pkg.go_files);
    files.sort();
    let parsed = files
        .into_iter()
        .map(|path| parse_file(&path).map(|(_, syntax, _)| (path, syntax)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TypeInfo::build(
        &pkg.import_path,
        &pkg.name,
        parsed.iter().map(|(path, syntax)| (path.as_path(), syntax)),
        names,
    ))
}

/// Import paths of other packages that interfaces in `types` embed from.
fn foreign_embeds(types: &TypeInfo) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for def in types.types.values() {
        let TypeExpr::Interface(ifc) = &def.spec.ty else {
            continue;
        };
        for embed in &ifc.embeds {
            if let TypeExpr::Named(NamedType { package: Some(local), .. }) = embed {
                if let Some(path) = def.scope.imports.get(local) {
                    if *path != types.path {
                        out.insert(path.clone());
                    }
                }
            }
        }
    }
    out
}

fn build_package(
    unit: Unit,
    files: Vec<(PathBuf, Parsed)>,
    names: &HashMap<String, String>,
) -> Result<PackageRecord, PackageFailure> {
    let mut reasons = Vec::new();
    let mut ok = Vec::with_capacity(files.len());
    for (path, result) in files {
        match result {
            Ok(parsed) => ok.push((path, parsed)),
            Err(reason) => reasons.push(reason),
        }
    }

    for (path, (_, syntax, _)) in &ok {
        for issue in &syntax.issues {
            reasons.push(format!(
                "{}:{}:{}: syntax error",
                path.display(),
                issue.line,
                issue.column
            ));
        }
        let declared = syntax.package.name.as_str();
        let test_name = format!("{}_test", unit.name);
        let is_test_file = path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().ends_with("_test.go"));
        let allowed = declared == unit.name || (unit.tests && is_test_file && declared == test_name);
        if !allowed {
            reasons.push(format!(
                "found packages {} and {declared} ({}) in {}",
                unit.name,
                path.display(),
                unit.dir.display()
            ));
        }
    }

    let types = TypeInfo::build(
        &unit.path,
        &unit.name,
        ok.iter().map(|(path, (_, syntax, _))| (path.as_path(), syntax)),
        names,
    );
    reasons.extend(check_declarations(&ok));
    reasons.extend(check_references(&types));

    if !reasons.is_empty() {
        return Err(PackageFailure::TypeCheck {
            path: unit.path,
            reasons,
        });
    }

    let files = ok
        .into_iter()
        .map(|(path, (source, syntax, comments))| {
            Arc::new(FileRecord {
                path,
                package: unit.path.clone(),
                source,
                syntax,
                comments,
            })
        })
        .collect();
    Ok(PackageRecord {
        path: unit.path,
        name: unit.name,
        dir: unit.dir,
        files,
        types: Arc::new(types),
    })
}

/// Package-level names must be unique, as must methods per receiver type.
fn check_declarations(files: &[(PathBuf, (Arc<str>, SourceFile, CommentMap))]) -> Vec<String> {
    let mut reasons = Vec::new();
    let mut seen = BTreeSet::new();
    let mut methods = BTreeSet::new();
    let mut declare = |name: &str, reasons: &mut Vec<String>| {
        if name != "_" && !seen.insert(name.to_string()) {
            reasons.push(format!("{name} redeclared in this block"));
        }
    };
    for (_, (_, syntax, _)) in files {
        for decl in &syntax.decls {
            match decl {
                Decl::Func(func) => match &func.receiver {
                    Some(recv) => {
                        if func.name.name != "_"
                            && !methods.insert((recv.type_name.clone(), func.name.name.clone()))
                        {
                            reasons.push(format!(
                                "method {}.{} already declared",
                                recv.type_name, func.name.name
                            ));
                        }
                    }
                    None if func.name.name == "init" => {}
                    None => declare(&func.name.name, &mut reasons),
                },
                Decl::Type { specs, .. } => {
                    for spec in specs {
                        declare(&spec.name.name, &mut reasons);
                    }
                }
                Decl::Value { names, .. } => {
                    for name in names {
                        declare(&name.name, &mut reasons);
                    }
                }
            }
        }
    }
    reasons
}

/// Receiver types and unqualified embedded interfaces must be declared in
/// the package.
fn check_references(types: &TypeInfo) -> Vec<String> {
    let mut reasons = Vec::new();
    for receiver in types.methods.keys() {
        if !types.types.contains_key(receiver) {
            reasons.push(format!("undefined: {receiver}"));
        }
    }
    for def in types.types.values() {
        let TypeExpr::Interface(ifc) = &def.spec.ty else {
            continue;
        };
        for embed in &ifc.embeds {
            let TypeExpr::Named(named) = embed else {
                continue;
            };
            let predeclared = matches!(named.name.as_str(), "error" | "comparable" | "any");
            let declared = match &named.package {
                None => predeclared || types.types.contains_key(&named.name),
                Some(local) => def.scope.imports.contains_key(local),
            };
            if !declared {
                reasons.push(format!("undefined: {}", display_named(named)));
            }
        }
    }
    reasons
}

fn display_named(named: &NamedType) -> String {
    match &named.package {
        Some(pkg) => format!("{pkg}.{}", named.name),
        None => named.name.clone(),
    }
}
