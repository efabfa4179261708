//! Package resolution.
//!
//! A [`Toolchain`] turns listing expressions (`./...`) into import paths and
//! import paths into directories and file lists. Two implementations are
//! provided:
//!
//! 1. [`GoCommand`] shells out to `go list`, so module resolution, build
//!    constraints and vendoring behave exactly as the Go tool sees them.
//! 2. [`ModuleLayout`] reads a single `go.mod` tree in-process. It needs no
//!    Go installation and is what the tests use.

use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ListingError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command}: {stderr}")]
    Failed { command: String, stderr: String },

    #[error("failed to decode go list output: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no module line in {0}")]
    NoModule(PathBuf),

    #[error("invalid listing expression {0}")]
    InvalidPattern(String),
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ResolvedPackageError {
    pub err: String,
}

/// One package as reported by `go list -json`. File names are relative to
/// `dir`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct ResolvedPackage {
    pub import_path: String,
    pub name: String,
    pub dir: PathBuf,
    pub go_files: Vec<String>,
    pub test_go_files: Vec<String>,
    #[serde(rename = "XTestGoFiles")]
    pub xtest_go_files: Vec<String>,
    pub error: Option<ResolvedPackageError>,
}

impl ResolvedPackage {
    fn not_found(import_path: &str, reason: impl Into<String>) -> Self {
        Self {
            import_path: import_path.to_string(),
            error: Some(ResolvedPackageError { err: reason.into() }),
            ..Self::default()
        }
    }

    /// Absolute paths of the given relative file names.
    pub fn absolute(&self, names: &[String]) -> Vec<PathBuf> {
        names.iter().map(|n| self.dir.join(n)).collect()
    }
}

pub trait Toolchain: Send + Sync {
    /// Expands listing expressions into concrete import paths.
    fn list(&self, exprs: &[String]) -> Result<Vec<String>, ListingError>;

    /// Resolves import paths. Packages that cannot be found are returned
    /// with an empty name and an error rather than failing the batch.
    fn resolve(&self, paths: &[String]) -> Result<Vec<ResolvedPackage>, ListingError>;
}

/// Runs the `go` command.
#[derive(Debug, Clone)]
pub struct GoCommand {
    program: String,
    dir: Option<PathBuf>,
}

impl Default for GoCommand {
    fn default() -> Self {
        Self {
            program: "go".to_string(),
            dir: None,
        }
    }
}

impl GoCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            dir: None,
        }
    }

    /// Run the command in `dir` instead of the current directory.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    fn run(&self, args: &[&str], exprs: &[String]) -> Result<Vec<u8>, ListingError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .args(exprs)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }
        let output = cmd.output().map_err(|source| ListingError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        if !output.status.success() {
            return Err(ListingError::Failed {
                command: format!("{} {} {}", self.program, args.join(" "), exprs.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

impl Toolchain for GoCommand {
    fn list(&self, exprs: &[String]) -> Result<Vec<String>, ListingError> {
        if exprs.is_empty() {
            return Ok(Vec::new());
        }
        let stdout = self.run(&["list"], exprs)?;
        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn resolve(&self, paths: &[String]) -> Result<Vec<ResolvedPackage>, ListingError> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let stdout = self.run(&["list", "-e", "-json"], paths)?;
        decode_packages(&stdout)
    }
}

/// Decodes the concatenated JSON objects printed by `go list -json`.
pub fn decode_packages(stdout: &[u8]) -> Result<Vec<ResolvedPackage>, ListingError> {
    serde_json::Deserializer::from_slice(stdout)
        .into_iter::<ResolvedPackage>()
        .map(|pkg| pkg.map_err(ListingError::from))
        .collect()
}

/// Resolves packages of a single module by reading its directory tree.
///
/// Build constraints are not evaluated: every `.go` file in a package
/// directory belongs to the package.
#[derive(Debug, Clone)]
pub struct ModuleLayout {
    root: PathBuf,
    module: String,
}

impl ModuleLayout {
    /// Reads `<root>/go.mod`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ListingError> {
        let root = root.into();
        let gomod = root.join("go.mod");
        let contents = fs::read_to_string(&gomod).map_err(|source| ListingError::Io {
            path: gomod.clone(),
            source,
        })?;
        let module = contents
            .lines()
            .filter_map(|l| l.trim().strip_prefix("module"))
            .map(|rest| rest.trim().trim_matches('"').to_string())
            .find(|m| !m.is_empty())
            .ok_or(ListingError::NoModule(gomod))?;
        Ok(Self { root, module })
    }

    /// Searches `start` and its ancestors for a `go.mod`.
    pub fn discover(start: &Path) -> Result<Self, ListingError> {
        let found = start.ancestors().find(|dir| dir.join("go.mod").is_file());
        match found {
            Some(dir) => Self::new(dir),
            None => Err(ListingError::NoModule(start.join("go.mod"))),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn import_path_of(&self, dir: &Path) -> Option<String> {
        let rel = dir.strip_prefix(&self.root).ok()?;
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        Some(if rel.is_empty() {
            self.module.clone()
        } else {
            format!("{}/{rel}", self.module)
        })
    }

    fn dir_of(&self, import_path: &str) -> Option<PathBuf> {
        if let Some(rel) = import_path.strip_prefix("./").or_else(|| {
            (import_path == ".").then_some("")
        }) {
            return Some(self.root.join(rel));
        }
        if import_path == self.module {
            return Some(self.root.clone());
        }
        let rel = import_path.strip_prefix(&self.module)?.strip_prefix('/')?;
        Some(self.root.join(rel))
    }

    /// Import paths of every package directory in the module.
    fn packages(&self) -> Vec<String> {
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_type().is_dir() || !skip_dir(e.path(), &self.root));
        let mut out = BTreeSet::new();
        for entry in walker.filter_map(Result::ok) {
            if entry.file_type().is_file() && is_go_source(entry.path()) {
                if let Some(path) = entry.path().parent().and_then(|d| self.import_path_of(d)) {
                    out.insert(path);
                }
            }
        }
        out.into_iter().collect()
    }

    /// Rewrites a relative expression into import-path form.
    fn absolute_expr(&self, expr: &str) -> Result<String, ListingError> {
        if expr == "." || expr.starts_with("./") {
            let rel = expr.strip_prefix("./").unwrap_or_default();
            return Ok(if rel.is_empty() {
                self.module.clone()
            } else {
                format!("{}/{rel}", self.module)
            });
        }
        if expr.starts_with("../") {
            return Err(ListingError::InvalidPattern(expr.to_string()));
        }
        Ok(expr.to_string())
    }
}

fn skip_dir(path: &Path, root: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    name == "testdata"
        || name == "vendor"
        || name.starts_with('.')
        || name.starts_with('_')
        || (path != root && path.join("go.mod").is_file())
}

fn is_go_source(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return false;
    };
    name.ends_with(".go") && !name.starts_with('.') && !name.starts_with('_')
}

/// Compiles a `go list` pattern: `...` matches any string and `x/...` also
/// matches `x` itself.
fn pattern_matcher(pattern: &str) -> Result<Regex, ListingError> {
    let mut re = String::from("^");
    let (body, optional_tail) = match pattern.strip_suffix("/...") {
        Some(prefix) => (prefix, true),
        None => (pattern, false),
    };
    re.push_str(&regex::escape(body).replace(r"\.\.\.", ".*"));
    if optional_tail {
        re.push_str("(/.*)?");
    }
    re.push('$');
    Regex::new(&re).map_err(|_| ListingError::InvalidPattern(pattern.to_string()))
}

/// The name in the package clause of a Go file, skipping leading comments.
fn declared_package(source: &str) -> Option<String> {
    let mut in_block = false;
    for line in source.lines() {
        let mut line = line.trim();
        if in_block {
            match line.find("*/") {
                Some(end) => {
                    in_block = false;
                    line = line[end + 2..].trim();
                }
                None => continue,
            }
        }
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        if let Some(rest) = line.strip_prefix("/*") {
            match rest.find("*/") {
                Some(end) => line = rest[end + 2..].trim(),
                None => {
                    in_block = true;
                    continue;
                }
            }
            if line.is_empty() {
                continue;
            }
        }
        let rest = line.strip_prefix("package")?;
        return rest
            .split(|c: char| c.is_whitespace() || c == ';' || c == '/')
            .find(|w| !w.is_empty())
            .map(str::to_string);
    }
    None
}

impl Toolchain for ModuleLayout {
    fn list(&self, exprs: &[String]) -> Result<Vec<String>, ListingError> {
        let all = self.packages();
        let mut out = BTreeSet::new();
        for expr in exprs {
            let matcher = pattern_matcher(&self.absolute_expr(expr)?)?;
            out.extend(all.iter().filter(|p| matcher.is_match(p)).cloned());
        }
        Ok(out.into_iter().collect())
    }

    fn resolve(&self, paths: &[String]) -> Result<Vec<ResolvedPackage>, ListingError> {
        let mut out = Vec::with_capacity(paths.len());
        for path in paths {
            let Some(dir) = self.dir_of(path).filter(|d| d.is_dir()) else {
                out.push(ResolvedPackage::not_found(
                    path,
                    format!("cannot find package {path} in module {}", self.module),
                ));
                continue;
            };
            let import_path = self.import_path_of(&dir).unwrap_or_else(|| path.clone());
            let mut entries: Vec<PathBuf> = fs::read_dir(&dir)
                .map_err(|source| ListingError::Io {
                    path: dir.clone(),
                    source,
                })?
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.is_file() && is_go_source(p))
                .collect();
            entries.sort();

            let mut pkg = ResolvedPackage {
                import_path,
                dir: dir.clone(),
                ..ResolvedPackage::default()
            };
            let mut test_names = Vec::new();
            for file in entries {
                let source = fs::read_to_string(&file).map_err(|source| ListingError::Io {
                    path: file.clone(),
                    source,
                })?;
                let name = file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let declared = declared_package(&source).unwrap_or_default();
                if name.ends_with("_test.go") {
                    test_names.push((name, declared));
                    continue;
                }
                if pkg.name.is_empty() {
                    pkg.name = declared;
                }
                pkg.go_files.push(name);
            }
            for (name, declared) in test_names {
                if declared.ends_with("_test") && declared != pkg.name {
                    pkg.xtest_go_files.push(name);
                } else {
                    pkg.test_go_files.push(name);
                }
            }
            if pkg.go_files.is_empty() {
                pkg.error = Some(ResolvedPackageError {
                    err: format!("no Go files in {}", dir.display()),
                });
            }
            out.push(pkg);
        }
        Ok(out)
    }
}
