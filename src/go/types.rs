//! Per-package type tables and the structural checks built on them.
//!
//! This is not a type checker. It records what the locator needs: named
//! types, functions and methods per package, the import table of every file,
//! and enough canonicalisation of type expressions to compare method
//! signatures across packages and decide interface satisfaction.

use crate::go::position::Span;
use crate::go::syntax::{
    is_exported, ChanDir, Decl, FuncDecl, InterfaceType, NamedType, Signature, SourceFile,
    TypeExpr, TypeSpec,
};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const MAX_DEPTH: usize = 32;

/// Method name (qualified by package path when unexported) to canonical
/// signature.
pub type MethodSet = BTreeMap<String, String>;

/// Names visible at file level: the package path and the local names of
/// imported packages.
#[derive(Debug, Clone, Default)]
pub struct FileScope {
    pub package: String,
    pub imports: BTreeMap<String, String>,
    pub dot_imports: Vec<String>,
}

impl FileScope {
    /// `names` maps import paths to real package names where they are known;
    /// other imports fall back to the name implied by the path.
    pub fn new(package: &str, file: &SourceFile, names: &HashMap<String, String>) -> Self {
        let mut scope = FileScope {
            package: package.to_string(),
            ..FileScope::default()
        };
        for spec in file.imports.iter().flat_map(|d| &d.specs) {
            match spec.name.as_deref() {
                Some("_") => {}
                Some(".") => scope.dot_imports.push(spec.path.clone()),
                Some(local) => {
                    scope.imports.insert(local.to_string(), spec.path.clone());
                }
                None => {
                    let local = names
                        .get(&spec.path)
                        .cloned()
                        .unwrap_or_else(|| assumed_package_name(&spec.path));
                    scope.imports.insert(local, spec.path.clone());
                }
            }
        }
        scope
    }
}

/// The package name an import path most likely declares: the last path
/// element, skipping a `vN` major version suffix, without a `go-` prefix and
/// cut at the first character that cannot appear in an identifier.
pub fn assumed_package_name(import_path: &str) -> String {
    let mut elems = import_path.rsplit('/');
    let mut base = elems.next().unwrap_or_default();
    if let Some(version) = base.strip_prefix('v') {
        if !version.is_empty() && version.chars().all(|c| c.is_ascii_digit()) {
            if let Some(parent) = elems.next() {
                base = parent;
            }
        }
    }
    let base = base.strip_prefix("go-").unwrap_or(base);
    let end = base
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(base.len());
    base[..end].to_string()
}

#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: String,
    pub spec: Arc<TypeSpec>,
    pub scope: Arc<FileScope>,
    pub filename: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverInfo {
    pub type_name: String,
    pub pointer: bool,
    /// The receiver is an interface: the method is an abstract signature.
    pub interface: bool,
}

/// A function, concrete method or interface method as a named object.
#[derive(Debug, Clone)]
pub struct FuncObject {
    pub name: String,
    /// `pkg.Fn`, `(*pkg.T).M`, `(pkg.T).M` or `(pkg.Ifc).M`.
    pub full_name: String,
    pub package: String,
    pub receiver: Option<ReceiverInfo>,
    pub signature: Signature,
    pub type_params: Vec<String>,
    pub scope: Arc<FileScope>,
    pub filename: PathBuf,
    pub name_span: Span,
    /// Missing exactly when the object is abstract.
    pub decl: Option<Arc<FuncDecl>>,
}

impl FuncObject {
    pub fn is_abstract(&self) -> bool {
        self.receiver.as_ref().is_some_and(|r| r.interface)
    }

    pub fn is_method(&self) -> bool {
        self.receiver.is_some()
    }

    pub fn exported(&self) -> bool {
        is_exported(&self.name)
    }
}

fn full_name(package: &str, name: &str, receiver: Option<&ReceiverInfo>) -> String {
    match receiver {
        None => format!("{package}.{name}"),
        Some(r) if r.pointer => format!("(*{package}.{}).{name}", r.type_name),
        Some(r) => format!("({package}.{}).{name}", r.type_name),
    }
}

/// Named types and functions declared by one package.
#[derive(Debug, Clone, Default)]
pub struct TypeInfo {
    pub path: String,
    pub name: String,
    pub types: BTreeMap<String, TypeDef>,
    /// Concrete methods keyed by receiver type name.
    pub methods: BTreeMap<String, Vec<Arc<FuncObject>>>,
    /// Every function, method and interface method, in file then source
    /// order.
    pub funcs: Vec<Arc<FuncObject>>,
}

impl TypeInfo {
    pub fn build<'a>(
        path: &str,
        name: &str,
        files: impl IntoIterator<Item = (&'a Path, &'a SourceFile)>,
        names: &HashMap<String, String>,
    ) -> Self {
        let mut info = TypeInfo {
            path: path.to_string(),
            name: name.to_string(),
            ..TypeInfo::default()
        };
        for (filename, file) in files {
            let scope = Arc::new(FileScope::new(path, file, names));
            for decl in &file.decls {
                match decl {
                    Decl::Func(func) => info.add_func(filename, &scope, func),
                    Decl::Type { specs, .. } => {
                        for spec in specs {
                            info.add_type(filename, &scope, spec);
                        }
                    }
                    Decl::Value { .. } => {}
                }
            }
        }
        info
    }

    fn add_func(&mut self, filename: &Path, scope: &Arc<FileScope>, func: &Arc<FuncDecl>) {
        let receiver = func.receiver.as_ref().map(|r| ReceiverInfo {
            type_name: r.type_name.clone(),
            pointer: r.pointer,
            interface: false,
        });
        let object = Arc::new(FuncObject {
            name: func.name.name.clone(),
            full_name: full_name(&self.path, &func.name.name, receiver.as_ref()),
            package: self.path.clone(),
            receiver,
            signature: func.signature.clone(),
            type_params: func.type_params.clone(),
            scope: Arc::clone(scope),
            filename: filename.to_path_buf(),
            name_span: func.name.span,
            decl: Some(Arc::clone(func)),
        });
        if let Some(recv) = &func.receiver {
            self.methods
                .entry(recv.type_name.clone())
                .or_default()
                .push(Arc::clone(&object));
        }
        self.funcs.push(object);
    }

    fn add_type(&mut self, filename: &Path, scope: &Arc<FileScope>, spec: &Arc<TypeSpec>) {
        if let TypeExpr::Interface(ifc) = &spec.ty {
            for method in &ifc.methods {
                let receiver = ReceiverInfo {
                    type_name: spec.name.name.clone(),
                    pointer: false,
                    interface: true,
                };
                self.funcs.push(Arc::new(FuncObject {
                    name: method.name.name.clone(),
                    full_name: full_name(&self.path, &method.name.name, Some(&receiver)),
                    package: self.path.clone(),
                    receiver: Some(receiver),
                    signature: method.signature.clone(),
                    type_params: spec.type_params.clone(),
                    scope: Arc::clone(scope),
                    filename: filename.to_path_buf(),
                    name_span: method.name.span,
                    decl: None,
                }));
            }
        }
        self.types.insert(
            spec.name.name.clone(),
            TypeDef {
                name: spec.name.name.clone(),
                spec: Arc::clone(spec),
                scope: Arc::clone(scope),
                filename: filename.to_path_buf(),
            },
        );
    }
}

fn is_predeclared(name: &str) -> bool {
    matches!(
        name,
        "bool"
            | "string"
            | "int"
            | "int8"
            | "int16"
            | "int32"
            | "int64"
            | "uint"
            | "uint8"
            | "uint16"
            | "uint32"
            | "uint64"
            | "uintptr"
            | "byte"
            | "rune"
            | "float32"
            | "float64"
            | "complex64"
            | "complex128"
            | "error"
            | "any"
            | "comparable"
    )
}

fn normalize_predeclared(name: &str) -> &str {
    match name {
        "byte" => "uint8",
        "rune" => "int32",
        "any" => "interface{}",
        other => other,
    }
}

fn method_key(package: &str, name: &str) -> String {
    if is_exported(name) {
        name.to_string()
    } else {
        format!("{package}.{name}")
    }
}

fn error_method_set() -> MethodSet {
    MethodSet::from([("Error".to_string(), "() string".to_string())])
}

/// All loaded packages, for resolving names across package boundaries.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    packages: HashMap<String, Arc<TypeInfo>>,
}

impl Universe {
    pub fn new(packages: impl IntoIterator<Item = Arc<TypeInfo>>) -> Self {
        Self {
            packages: packages
                .into_iter()
                .map(|info| (info.path.clone(), info))
                .collect(),
        }
    }

    pub fn package(&self, path: &str) -> Option<&Arc<TypeInfo>> {
        self.packages.get(path)
    }

    fn type_def(&self, package: &str, name: &str) -> Option<&TypeDef> {
        self.packages.get(package)?.types.get(name)
    }

    /// Resolves a named type to `(package path, name)`. Predeclared types
    /// that the package does not shadow resolve to `None`.
    pub fn resolve_named(&self, scope: &FileScope, named: &NamedType) -> Option<(String, String)> {
        if let Some(local) = &named.package {
            let path = scope.imports.get(local)?;
            return Some((path.clone(), named.name.clone()));
        }
        if self.type_def(&scope.package, &named.name).is_some() {
            return Some((scope.package.clone(), named.name.clone()));
        }
        if is_predeclared(&named.name) {
            return None;
        }
        let dotted = scope
            .dot_imports
            .iter()
            .find(|path| self.type_def(path, &named.name).is_some());
        let package = dotted.unwrap_or(&scope.package);
        Some((package.clone(), named.name.clone()))
    }

    /// Canonical text of a type: local names qualified by package path,
    /// aliases resolved, `byte`, `rune` and `any` normalised.
    pub fn canonical(&self, scope: &FileScope, params: &[String], ty: &TypeExpr) -> String {
        self.canonical_at(scope, params, ty, 0)
    }

    /// Canonical text of a signature: `(params) (results)`, with the
    /// results part omitted when empty.
    pub fn canonical_signature(&self, scope: &FileScope, params: &[String], sig: &Signature) -> String {
        self.signature_at(scope, params, sig, 0)
    }

    pub fn signature_of(&self, func: &FuncObject) -> String {
        self.canonical_signature(&func.scope, &func.type_params, &func.signature)
    }

    fn signature_at(&self, scope: &FileScope, params: &[String], sig: &Signature, depth: usize) -> String {
        let list = |items: &[crate::go::syntax::Param]| {
            items
                .iter()
                .map(|p| {
                    let ty = self.canonical_at(scope, params, &p.ty, depth + 1);
                    if p.variadic {
                        format!("...{ty}")
                    } else {
                        ty
                    }
                })
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut out = format!("({})", list(&sig.params));
        if !sig.results.is_empty() {
            out.push_str(&format!(" ({})", list(&sig.results)));
        }
        out
    }

    fn canonical_at(&self, scope: &FileScope, params: &[String], ty: &TypeExpr, depth: usize) -> String {
        if depth > MAX_DEPTH {
            return String::from("?");
        }
        let next = depth + 1;
        match ty {
            TypeExpr::Named(named) => {
                if named.package.is_none() && params.iter().any(|p| *p == named.name) {
                    return named.name.clone();
                }
                let Some((package, name)) = self.resolve_named(scope, named) else {
                    return normalize_predeclared(&named.name).to_string();
                };
                if let Some(def) = self.type_def(&package, &name) {
                    if def.spec.alias {
                        return self.canonical_at(&def.scope, &def.spec.type_params, &def.spec.ty, next);
                    }
                }
                let mut out = format!("{package}.{name}");
                if !named.args.is_empty() {
                    let args: Vec<_> = named
                        .args
                        .iter()
                        .map(|a| self.canonical_at(scope, params, a, next))
                        .collect();
                    out.push_str(&format!("[{}]", args.join(", ")));
                }
                out
            }
            TypeExpr::Pointer(inner) => format!("*{}", self.canonical_at(scope, params, inner, next)),
            TypeExpr::Slice(elem) => format!("[]{}", self.canonical_at(scope, params, elem, next)),
            TypeExpr::Array { len, elem } => {
                format!("[{len}]{}", self.canonical_at(scope, params, elem, next))
            }
            TypeExpr::Map { key, value } => format!(
                "map[{}]{}",
                self.canonical_at(scope, params, key, next),
                self.canonical_at(scope, params, value, next)
            ),
            TypeExpr::Chan { dir, elem } => {
                let elem = self.canonical_at(scope, params, elem, next);
                match dir {
                    ChanDir::Both => format!("chan {elem}"),
                    ChanDir::Send => format!("chan<- {elem}"),
                    ChanDir::Recv => format!("<-chan {elem}"),
                }
            }
            TypeExpr::Func(sig) => format!("func{}", self.signature_at(scope, params, sig, next)),
            TypeExpr::Interface(ifc) => match self.interface_set(scope, params, ifc, next) {
                Some(set) => {
                    let methods: Vec<_> = set.iter().map(|(n, s)| format!("{n}{s}")).collect();
                    format!("interface{{{}}}", methods.join("; "))
                }
                None => {
                    let embeds: Vec<_> = ifc
                        .embeds
                        .iter()
                        .map(|e| self.canonical_at(scope, params, e, next))
                        .collect();
                    format!("interface{{{}}}", embeds.join("; "))
                }
            },
            TypeExpr::Struct(st) => {
                let fields: Vec<_> = st
                    .fields
                    .iter()
                    .map(|f| {
                        let ty = self.canonical_at(scope, params, &f.ty, next);
                        if f.names.is_empty() {
                            ty
                        } else {
                            let names: Vec<_> = f.names.iter().map(|n| n.name.as_str()).collect();
                            format!("{} {ty}", names.join(", "))
                        }
                    })
                    .collect();
                format!("struct{{{}}}", fields.join("; "))
            }
            TypeExpr::Other(text) => text.clone(),
        }
    }

    /// The interface a named type stands for, following named types and
    /// aliases declared in loaded packages.
    pub fn interface_of(&self, package: &str, name: &str) -> Option<(&TypeDef, &InterfaceType)> {
        let mut package = package.to_string();
        let mut name = name.to_string();
        for _ in 0..MAX_DEPTH {
            let def = self.type_def(&package, &name)?;
            match &def.spec.ty {
                TypeExpr::Interface(ifc) => return Some((def, ifc)),
                TypeExpr::Named(named) => {
                    (package, name) = self.resolve_named(&def.scope, named)?;
                }
                _ => return None,
            }
        }
        None
    }

    /// Interfaces embedded in `package.name` that are declared in the same
    /// package.
    pub fn local_embeds(&self, package: &str, name: &str) -> Vec<String> {
        let Some((def, ifc)) = self.interface_of(package, name) else {
            return Vec::new();
        };
        ifc.embeds
            .iter()
            .filter_map(|embed| match embed {
                TypeExpr::Named(named) => self.resolve_named(&def.scope, named),
                _ => None,
            })
            .filter(|(p, n)| p == package && self.interface_of(p, n).is_some())
            .map(|(_, n)| n)
            .collect()
    }

    /// Full method set of an interface type, or `None` when it cannot be
    /// satisfied by ordinary types: it has type-set elements, embeds
    /// `comparable`, or embeds something that cannot be resolved.
    pub fn interface_method_set(&self, package: &str, name: &str) -> Option<MethodSet> {
        self.named_interface_set(package, name, 0)
    }

    fn named_interface_set(&self, package: &str, name: &str, depth: usize) -> Option<MethodSet> {
        if depth > MAX_DEPTH {
            return None;
        }
        let def = self.type_def(package, name)?;
        match &def.spec.ty {
            TypeExpr::Interface(ifc) => self.interface_set(&def.scope, &def.spec.type_params, ifc, depth + 1),
            TypeExpr::Named(named) => self.embedded_set(&def.scope, named, depth + 1),
            _ => None,
        }
    }

    fn embedded_set(&self, scope: &FileScope, named: &NamedType, depth: usize) -> Option<MethodSet> {
        if named.package.is_none() && self.type_def(&scope.package, &named.name).is_none() {
            match named.name.as_str() {
                "error" => return Some(error_method_set()),
                "any" => return Some(MethodSet::new()),
                _ => {}
            }
        }
        let (package, name) = self.resolve_named(scope, named)?;
        self.named_interface_set(&package, &name, depth + 1)
    }

    fn interface_set(
        &self,
        scope: &FileScope,
        params: &[String],
        ifc: &InterfaceType,
        depth: usize,
    ) -> Option<MethodSet> {
        if ifc.type_set || depth > MAX_DEPTH {
            return None;
        }
        let mut set = MethodSet::new();
        for method in &ifc.methods {
            set.insert(
                method_key(&scope.package, &method.name.name),
                self.signature_at(scope, params, &method.signature, depth + 1),
            );
        }
        for embed in &ifc.embeds {
            let TypeExpr::Named(named) = embed else {
                return None;
            };
            set.extend(self.embedded_set(scope, named, depth + 1)?);
        }
        Some(set)
    }

    /// Method set of `package.name`, or of `*package.name` when `pointer`
    /// is set. Includes methods promoted through embedded fields; declared
    /// methods shadow promoted ones.
    pub fn method_set(&self, package: &str, name: &str, pointer: bool) -> MethodSet {
        self.method_set_at(package, name, pointer, 0)
    }

    fn method_set_at(&self, package: &str, name: &str, pointer: bool, depth: usize) -> MethodSet {
        let mut set = MethodSet::new();
        if depth > MAX_DEPTH {
            return set;
        }
        let Some(info) = self.packages.get(package) else {
            return set;
        };
        let Some(def) = info.types.get(name) else {
            return set;
        };
        if def.spec.alias {
            if let TypeExpr::Named(named) = &def.spec.ty {
                if let Some((p, n)) = self.resolve_named(&def.scope, named) {
                    return self.method_set_at(&p, &n, pointer, depth + 1);
                }
            }
            return set;
        }

        for method in info.methods.get(name).into_iter().flatten() {
            let by_value = method.receiver.as_ref().is_some_and(|r| !r.pointer);
            if pointer || by_value {
                set.insert(method_key(package, &method.name), self.signature_of(method));
            }
        }

        match &def.spec.ty {
            TypeExpr::Struct(st) => {
                for field in st.fields.iter().filter(|f| f.names.is_empty()) {
                    let (inner, field_pointer) = match &field.ty {
                        TypeExpr::Pointer(inner) => (inner.as_ref(), true),
                        other => (other, false),
                    };
                    let TypeExpr::Named(named) = inner else {
                        continue;
                    };
                    let promoted = match self.embedded_set(&def.scope, named, depth + 1) {
                        Some(ifc) => ifc,
                        None => match self.resolve_named(&def.scope, named) {
                            Some((p, n)) => self.method_set_at(&p, &n, pointer || field_pointer, depth + 1),
                            None => continue,
                        },
                    };
                    for (key, sig) in promoted {
                        set.entry(key).or_insert(sig);
                    }
                }
            }
            TypeExpr::Interface(ifc) => {
                if let Some(methods) = self.interface_set(&def.scope, &def.spec.type_params, ifc, depth + 1) {
                    set.extend(methods);
                }
            }
            _ => {}
        }
        set
    }

    /// Reports whether the receiver type (`T`, or `*T` when `pointer`)
    /// implements an interface with the given method set.
    pub fn implements(&self, package: &str, name: &str, pointer: bool, ifc: &MethodSet) -> bool {
        if ifc.is_empty() {
            return true;
        }
        let methods = self.method_set(package, name, pointer);
        ifc.iter().all(|(key, sig)| methods.get(key) == Some(sig))
    }
}
