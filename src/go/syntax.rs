//! Owned syntax model extracted from tree-sitter-go parse trees.
//!
//! Only the parts of a Go file the locator needs are kept: the package
//! clause, imports, top-level declarations with their signatures and type
//! expressions, call statements inside function bodies, comment groups and
//! a pre-order node list for comment association. Nothing here borrows the
//! tree-sitter tree, so files can be shared freely across threads.

use crate::go::comments::{group_comments, Comment, CommentGroup};
use crate::go::errors::ParseError;
use crate::go::parser::GoParser;
use crate::go::position::{LineIndex, Span};
use std::sync::Arc;
use tree_sitter::Node;

/// Reports whether a Go identifier is exported.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

/// Identity of a syntax node: its grammar kind and byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef {
    pub kind: &'static str,
    pub span: Span,
}

impl NodeRef {
    fn of(node: Node<'_>) -> Self {
        Self {
            kind: node.kind(),
            span: node.byte_range().into(),
        }
    }
}

/// Entry in a file's pre-order node list. `group` marks declarations,
/// specs, statements and fields, which comments prefer to attach to.
#[derive(Debug, Clone, Copy)]
pub struct SyntaxNode {
    pub node: NodeRef,
    pub group: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxIssue {
    pub span: Span,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub span: Span,
    pub specs: Vec<ImportSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    pub span: Span,
    /// Explicit local name, including `.` and `_`.
    pub name: Option<String>,
    pub path: String,
}

#[derive(Debug, Clone)]
pub enum Decl {
    Func(Arc<FuncDecl>),
    Type { span: Span, specs: Vec<Arc<TypeSpec>> },
    Value { span: Span, names: Vec<Ident> },
}

impl Decl {
    pub fn span(&self) -> Span {
        match self {
            Decl::Func(f) => f.span,
            Decl::Type { span, .. } | Decl::Value { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    /// From the `func` keyword to the end of the body.
    pub span: Span,
    pub name: Ident,
    pub receiver: Option<Receiver>,
    /// Type parameter names in scope, including those bound by a generic
    /// receiver.
    pub type_params: Vec<String>,
    pub signature: Signature,
    pub body: Option<Block>,
    pub doc: Option<CommentGroup>,
}

impl FuncDecl {
    pub fn is_method(&self) -> bool {
        self.receiver.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Receiver {
    pub name: Option<String>,
    pub type_name: String,
    pub type_args: Vec<String>,
    pub pointer: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub span: Span,
    /// Top-level statements of the block.
    pub statements: Vec<NodeRef>,
    /// Every call and defer statement nested anywhere in the block.
    pub calls: Vec<CallStatement>,
}

impl Block {
    /// Offset just past the opening brace.
    pub fn after_lbrace(&self) -> usize {
        self.span.start + 1
    }
}

/// An expression statement whose expression is a call, or a defer
/// statement, together with what encloses it inside the function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStatement {
    pub node: NodeRef,
    pub deferred: bool,
    /// `name` or `operand.name` of the called function; `None` when the
    /// callee is any other expression.
    pub callee: Option<String>,
    pub in_defer: bool,
    pub in_expression: bool,
    pub in_plain_expression: bool,
}

#[derive(Debug, Clone)]
pub struct TypeSpec {
    pub span: Span,
    pub name: Ident,
    pub alias: bool,
    pub type_params: Vec<String>,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedType {
    /// Package qualifier as written, e.g. `io` in `io.Reader`.
    pub package: Option<String>,
    pub name: String,
    pub args: Vec<TypeExpr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Named(NamedType),
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    Array { len: String, elem: Box<TypeExpr> },
    Map { key: Box<TypeExpr>, value: Box<TypeExpr> },
    Chan { dir: ChanDir, elem: Box<TypeExpr> },
    Func(Signature),
    Interface(InterfaceType),
    Struct(StructType),
    /// Anything else, as source text with whitespace removed.
    Other(String),
}

impl TypeExpr {
    /// The named type at the root of `T`, `*T` or `T[A]`.
    pub fn base_name(&self) -> Option<&NamedType> {
        match self {
            TypeExpr::Named(named) => Some(named),
            TypeExpr::Pointer(inner) => match inner.as_ref() {
                TypeExpr::Named(named) => Some(named),
                _ => None,
            },
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<Param>,
    pub results: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: Option<String>,
    pub ty: TypeExpr,
    pub variadic: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceType {
    pub span: Span,
    pub methods: Vec<MethodElem>,
    pub embeds: Vec<TypeExpr>,
    /// Contains union or `~T` elements; such interfaces only constrain
    /// type parameters.
    pub type_set: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodElem {
    pub name: Ident,
    pub span: Span,
    pub signature: Signature,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructType {
    pub span: Span,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub span: Span,
    /// Empty for an embedded field.
    pub names: Vec<Ident>,
    pub ty: TypeExpr,
}

/// A parsed Go source file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub package: Ident,
    pub package_clause: Span,
    pub imports: Vec<ImportDecl>,
    pub decls: Vec<Decl>,
    pub comments: Vec<CommentGroup>,
    /// Pre-order list of named nodes, starting with the file itself.
    pub nodes: Vec<SyntaxNode>,
    pub issues: Vec<SyntaxIssue>,
    pub lines: LineIndex,
}

impl SourceFile {
    pub fn parse(parser: &mut GoParser, source: &str) -> Result<Self, ParseError> {
        let parsed = parser.parse_with_source(source)?;
        let root = parsed.root_node();
        let lines = LineIndex::new(source);

        let issues = parsed
            .error_nodes()
            .into_iter()
            .map(|e| SyntaxIssue {
                span: Span::new(e.byte_start, e.byte_end),
                line: e.start_point.row + 1,
                column: e.start_point.column + 1,
            })
            .collect();

        let raw_comments = parser
            .comment_query()
            .find_all(&parsed)
            .into_iter()
            .filter_map(|m| {
                m.captures.get("comment").map(|c| Comment {
                    span: Span::new(c.byte_start, c.byte_end),
                    text: c.text.clone(),
                })
            })
            .collect();
        let comments = group_comments(source, raw_comments, &lines);

        let clause = named_children(root)
            .into_iter()
            .find(|n| n.kind() == "package_clause")
            .ok_or(ParseError::MissingPackageClause)?;
        let extract = Extractor {
            src: source,
            lines: &lines,
            comments: &comments,
        };
        let package = named_children(clause)
            .into_iter()
            .next()
            .map(|n| extract.ident(n))
            .ok_or(ParseError::MissingPackageClause)?;

        let mut nodes = vec![SyntaxNode {
            node: NodeRef {
                kind: "source_file",
                span: Span::new(clause.start_byte(), source.len()),
            },
            group: true,
        }];
        collect_nodes(root, &mut nodes);

        let mut imports = Vec::new();
        let mut decls = Vec::new();
        for child in named_children(root) {
            match child.kind() {
                "import_declaration" => imports.push(extract.import_decl(child)),
                "function_declaration" | "method_declaration" => {
                    decls.push(Decl::Func(Arc::new(extract.func_decl(child))))
                }
                "type_declaration" => decls.push(extract.type_decl(child)),
                "const_declaration" | "var_declaration" => decls.push(extract.value_decl(child)),
                _ => {}
            }
        }

        Ok(Self {
            package,
            package_clause: clause.byte_range().into(),
            imports,
            decls,
            comments,
            nodes,
            issues,
            lines,
        })
    }

    pub fn functions(&self) -> impl Iterator<Item = &Arc<FuncDecl>> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Func(f) => Some(f),
            _ => None,
        })
    }

    pub fn type_specs(&self) -> impl Iterator<Item = &Arc<TypeSpec>> {
        self.decls.iter().flat_map(|d| match d {
            Decl::Type { specs, .. } => specs.as_slice(),
            _ => &[],
        })
    }

    /// Span covering the import declarations that lead the file, from
    /// the first `import` keyword to the end of the last one.
    pub fn import_block(&self) -> Option<Span> {
        let first_decl = self.decls.iter().map(|d| d.span().start).min();
        let mut leading = self
            .imports
            .iter()
            .filter(|i| first_decl.map_or(true, |d| i.span.start < d));
        let first = leading.next()?;
        let last = leading.last().unwrap_or(first);
        Some(Span::new(first.span.start, last.span.end))
    }

    /// The node that represents the file itself.
    pub fn file_node(&self) -> NodeRef {
        self.nodes[0].node
    }
}

fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .collect()
}

fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

/// Grammar wrappers that have no counterpart in Go's own syntax tree.
fn is_transparent(kind: &str) -> bool {
    matches!(
        kind,
        "package_clause" | "statement_list" | "import_spec_list" | "var_spec_list"
    )
}

fn is_group_node(kind: &str) -> bool {
    kind.ends_with("_statement")
        || matches!(
            kind,
            "field_declaration"
                | "parameter_declaration"
                | "variadic_parameter_declaration"
                | "method_elem"
                | "method_spec"
                | "type_elem"
                | "interface_type_name"
                | "function_declaration"
                | "method_declaration"
                | "import_declaration"
                | "const_declaration"
                | "var_declaration"
                | "type_declaration"
                | "import_spec"
                | "const_spec"
                | "var_spec"
                | "type_spec"
                | "type_alias"
                | "block"
                | "short_var_declaration"
                | "expression_case"
                | "default_case"
                | "type_case"
                | "communication_case"
        )
}

fn collect_nodes(node: Node<'_>, out: &mut Vec<SyntaxNode>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        let kind = child.kind();
        if kind == "comment" {
            continue;
        }
        if !is_transparent(kind) {
            out.push(SyntaxNode {
                node: NodeRef::of(child),
                group: is_group_node(kind),
            });
        }
        collect_nodes(child, out);
    }
}

#[derive(Clone, Copy, Default)]
struct CallScope {
    in_defer: bool,
    in_expression: bool,
    in_plain_expression: bool,
}

struct Extractor<'a> {
    src: &'a str,
    lines: &'a LineIndex,
    comments: &'a [CommentGroup],
}

impl<'a> Extractor<'a> {
    fn text(&self, node: Node<'_>) -> &'a str {
        &self.src[node.byte_range()]
    }

    fn ident(&self, node: Node<'_>) -> Ident {
        Ident {
            name: self.text(node).to_string(),
            span: node.byte_range().into(),
        }
    }

    /// The comment group directly above `start` with no blank line or code
    /// in between.
    fn doc_for(&self, start: usize) -> Option<CommentGroup> {
        let idx = self.comments.partition_point(|g| g.span.end <= start);
        let group = self.comments.get(idx.checked_sub(1)?)?;
        let between = self.src.get(group.span.end..start)?;
        let adjacent = self.lines.line(group.span.end) + 1 == self.lines.line(start);
        (!group.trailing && between.trim().is_empty() && adjacent).then(|| group.clone())
    }

    fn import_decl(&self, node: Node<'_>) -> ImportDecl {
        let mut specs = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "import_spec" => specs.push(self.import_spec(child)),
                "import_spec_list" => specs.extend(
                    named_children(child)
                        .into_iter()
                        .filter(|c| c.kind() == "import_spec")
                        .map(|c| self.import_spec(c)),
                ),
                _ => {}
            }
        }
        ImportDecl {
            span: node.byte_range().into(),
            specs,
        }
    }

    fn import_spec(&self, node: Node<'_>) -> ImportSpec {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string());
        let path = node
            .child_by_field_name("path")
            .map(|n| self.text(n).trim_matches(|c| c == '"' || c == '`').to_string())
            .unwrap_or_default();
        ImportSpec {
            span: node.byte_range().into(),
            name,
            path,
        }
    }

    fn func_decl(&self, node: Node<'_>) -> FuncDecl {
        let span: Span = node.byte_range().into();
        let name = node
            .child_by_field_name("name")
            .map(|n| self.ident(n))
            .unwrap_or_default();
        let receiver = node
            .child_by_field_name("receiver")
            .and_then(|r| self.receiver(r));
        let mut type_params = node
            .child_by_field_name("type_parameters")
            .map(|n| self.type_param_names(n))
            .unwrap_or_default();
        if let Some(recv) = &receiver {
            type_params.extend(recv.type_args.iter().cloned());
        }
        let signature = self.signature(
            node.child_by_field_name("parameters"),
            node.child_by_field_name("result"),
        );
        let body = node.child_by_field_name("body").map(|b| self.block(b));
        FuncDecl {
            span,
            name,
            receiver,
            type_params,
            signature,
            body,
            doc: self.doc_for(span.start),
        }
    }

    fn receiver(&self, list: Node<'_>) -> Option<Receiver> {
        let param = named_children(list)
            .into_iter()
            .find(|n| n.kind() == "parameter_declaration")?;
        let name = param
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string());
        let mut ty = param.child_by_field_name("type")?;
        let mut pointer = false;
        loop {
            match ty.kind() {
                "pointer_type" => {
                    pointer = true;
                    ty = named_children(ty).into_iter().next()?;
                }
                "parenthesized_type" => ty = named_children(ty).into_iter().next()?,
                _ => break,
            }
        }
        let (type_name, type_args) = match ty.kind() {
            "generic_type" => {
                let base = ty.child_by_field_name("type")?;
                let args = ty
                    .child_by_field_name("type_arguments")
                    .map(|a| {
                        named_children(a)
                            .into_iter()
                            .map(|n| self.text(n).trim().to_string())
                            .collect()
                    })
                    .unwrap_or_default();
                (self.text(base).to_string(), args)
            }
            _ => (self.text(ty).to_string(), Vec::new()),
        };
        Some(Receiver {
            name,
            type_name,
            type_args,
            pointer,
            span: param.byte_range().into(),
        })
    }

    fn type_param_names(&self, list: Node<'_>) -> Vec<String> {
        named_children(list)
            .into_iter()
            .flat_map(|decl| field_children(decl, "name"))
            .map(|n| self.text(n).to_string())
            .collect()
    }

    fn signature(&self, params: Option<Node<'_>>, result: Option<Node<'_>>) -> Signature {
        let params = params.map(|p| self.params(p)).unwrap_or_default();
        let results = match result {
            None => Vec::new(),
            Some(r) if r.kind() == "parameter_list" => self.params(r),
            Some(r) => vec![Param {
                name: None,
                ty: self.type_expr(r),
                variadic: false,
            }],
        };
        Signature { params, results }
    }

    fn params(&self, list: Node<'_>) -> Vec<Param> {
        let mut out = Vec::new();
        for decl in named_children(list) {
            let variadic = match decl.kind() {
                "parameter_declaration" => false,
                "variadic_parameter_declaration" => true,
                _ => continue,
            };
            let ty = decl
                .child_by_field_name("type")
                .map(|t| self.type_expr(t))
                .unwrap_or_else(|| TypeExpr::Other(String::new()));
            let names = field_children(decl, "name");
            if names.is_empty() {
                out.push(Param {
                    name: None,
                    ty,
                    variadic,
                });
                continue;
            }
            for name in names {
                out.push(Param {
                    name: Some(self.text(name).to_string()),
                    ty: ty.clone(),
                    variadic,
                });
            }
        }
        out
    }

    fn first_type(&self, node: Node<'_>) -> TypeExpr {
        named_children(node)
            .into_iter()
            .next()
            .map(|n| self.type_expr(n))
            .unwrap_or_else(|| TypeExpr::Other(String::new()))
    }

    fn field_type(&self, node: Node<'_>, field: &str) -> TypeExpr {
        node.child_by_field_name(field)
            .map(|n| self.type_expr(n))
            .unwrap_or_else(|| TypeExpr::Other(String::new()))
    }

    fn type_expr(&self, node: Node<'_>) -> TypeExpr {
        match node.kind() {
            "type_identifier" | "identifier" => TypeExpr::Named(NamedType {
                package: None,
                name: self.text(node).to_string(),
                args: Vec::new(),
            }),
            "qualified_type" => TypeExpr::Named(NamedType {
                package: node
                    .child_by_field_name("package")
                    .map(|n| self.text(n).to_string()),
                name: node
                    .child_by_field_name("name")
                    .map(|n| self.text(n).to_string())
                    .unwrap_or_default(),
                args: Vec::new(),
            }),
            "generic_type" => {
                let base = node
                    .child_by_field_name("type")
                    .map(|n| self.type_expr(n))
                    .unwrap_or_else(|| TypeExpr::Other(String::new()));
                let args = node
                    .child_by_field_name("type_arguments")
                    .map(|a| {
                        named_children(a)
                            .into_iter()
                            .map(|n| self.type_expr(n))
                            .collect()
                    })
                    .unwrap_or_default();
                match base {
                    TypeExpr::Named(mut named) => {
                        named.args = args;
                        TypeExpr::Named(named)
                    }
                    other => other,
                }
            }
            "pointer_type" => TypeExpr::Pointer(Box::new(self.first_type(node))),
            "slice_type" => TypeExpr::Slice(Box::new(self.field_type(node, "element"))),
            "array_type" => TypeExpr::Array {
                len: node
                    .child_by_field_name("length")
                    .map(|n| strip_whitespace(self.text(n)))
                    .unwrap_or_default(),
                elem: Box::new(self.field_type(node, "element")),
            },
            "implicit_length_array_type" => TypeExpr::Array {
                len: "...".to_string(),
                elem: Box::new(self.field_type(node, "element")),
            },
            "map_type" => TypeExpr::Map {
                key: Box::new(self.field_type(node, "key")),
                value: Box::new(self.field_type(node, "value")),
            },
            "channel_type" => {
                let text = strip_whitespace(self.text(node));
                let dir = if text.starts_with("<-") {
                    ChanDir::Recv
                } else if text.starts_with("chan<-") {
                    ChanDir::Send
                } else {
                    ChanDir::Both
                };
                TypeExpr::Chan {
                    dir,
                    elem: Box::new(self.field_type(node, "value")),
                }
            }
            "function_type" => TypeExpr::Func(self.signature(
                node.child_by_field_name("parameters"),
                node.child_by_field_name("result"),
            )),
            "interface_type" => TypeExpr::Interface(self.interface_type(node)),
            "struct_type" => TypeExpr::Struct(self.struct_type(node)),
            "parenthesized_type" => self.first_type(node),
            "type_elem" => {
                let children = named_children(node);
                match children.as_slice() {
                    [single] => self.type_expr(*single),
                    _ => TypeExpr::Other(strip_whitespace(self.text(node))),
                }
            }
            _ => TypeExpr::Other(strip_whitespace(self.text(node))),
        }
    }

    fn interface_type(&self, node: Node<'_>) -> InterfaceType {
        let mut ifc = InterfaceType {
            span: node.byte_range().into(),
            ..InterfaceType::default()
        };
        for child in named_children(node) {
            match child.kind() {
                "method_elem" | "method_spec" => ifc.methods.push(MethodElem {
                    name: child
                        .child_by_field_name("name")
                        .map(|n| self.ident(n))
                        .unwrap_or_default(),
                    span: child.byte_range().into(),
                    signature: self.signature(
                        child.child_by_field_name("parameters"),
                        child.child_by_field_name("result"),
                    ),
                }),
                "type_elem" => {
                    let elems = named_children(child);
                    match elems.as_slice() {
                        [single]
                            if matches!(
                                single.kind(),
                                "type_identifier" | "qualified_type" | "generic_type"
                            ) =>
                        {
                            ifc.embeds.push(self.type_expr(*single))
                        }
                        _ => ifc.type_set = true,
                    }
                }
                "interface_type_name" => ifc.embeds.push(self.first_type(child)),
                "constraint_elem" | "struct_elem" => ifc.type_set = true,
                _ => {}
            }
        }
        ifc
    }

    fn struct_type(&self, node: Node<'_>) -> StructType {
        let mut st = StructType {
            span: node.byte_range().into(),
            fields: Vec::new(),
        };
        let Some(list) = named_children(node)
            .into_iter()
            .find(|n| n.kind() == "field_declaration_list")
        else {
            return st;
        };
        for field in named_children(list) {
            if field.kind() != "field_declaration" {
                continue;
            }
            let names: Vec<Ident> = field_children(field, "name")
                .into_iter()
                .map(|n| self.ident(n))
                .collect();
            let mut ty = self.field_type(field, "type");
            if names.is_empty() && has_star(field) {
                ty = TypeExpr::Pointer(Box::new(ty));
            }
            st.fields.push(FieldDecl {
                span: field.byte_range().into(),
                names,
                ty,
            });
        }
        st
    }

    fn type_decl(&self, node: Node<'_>) -> Decl {
        let specs = named_children(node)
            .into_iter()
            .filter(|c| matches!(c.kind(), "type_spec" | "type_alias"))
            .map(|c| Arc::new(self.type_spec(c)))
            .collect();
        Decl::Type {
            span: node.byte_range().into(),
            specs,
        }
    }

    fn type_spec(&self, node: Node<'_>) -> TypeSpec {
        TypeSpec {
            span: node.byte_range().into(),
            name: node
                .child_by_field_name("name")
                .map(|n| self.ident(n))
                .unwrap_or_default(),
            alias: node.kind() == "type_alias",
            type_params: node
                .child_by_field_name("type_parameters")
                .map(|n| self.type_param_names(n))
                .unwrap_or_default(),
            ty: self.field_type(node, "type"),
        }
    }

    fn value_decl(&self, node: Node<'_>) -> Decl {
        let mut specs = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "const_spec" | "var_spec" => specs.push(child),
                "var_spec_list" => specs.extend(
                    named_children(child)
                        .into_iter()
                        .filter(|c| c.kind() == "var_spec"),
                ),
                _ => {}
            }
        }
        let names = specs
            .into_iter()
            .flat_map(|spec| field_children(spec, "name"))
            .map(|n| self.ident(n))
            .collect();
        Decl::Value {
            span: node.byte_range().into(),
            names,
        }
    }

    fn block(&self, node: Node<'_>) -> Block {
        let mut statements = Vec::new();
        for child in named_children(node) {
            if child.kind() == "statement_list" {
                statements.extend(named_children(child).into_iter().map(NodeRef::of));
            } else {
                statements.push(NodeRef::of(child));
            }
        }
        let mut calls = Vec::new();
        self.collect_calls(node, CallScope::default(), &mut calls);
        Block {
            span: node.byte_range().into(),
            statements,
            calls,
        }
    }

    fn collect_calls(&self, node: Node<'_>, scope: CallScope, out: &mut Vec<CallStatement>) {
        for child in named_children(node) {
            match child.kind() {
                "expression_statement" => {
                    let expr = named_children(child).into_iter().next();
                    let call = expr.filter(|e| e.kind() == "call_expression");
                    if let Some(call) = call {
                        out.push(CallStatement {
                            node: NodeRef::of(child),
                            deferred: false,
                            callee: self.callee(call),
                            in_defer: scope.in_defer,
                            in_expression: scope.in_expression,
                            in_plain_expression: scope.in_plain_expression,
                        });
                    }
                    let inner = CallScope {
                        in_expression: true,
                        in_plain_expression: scope.in_plain_expression || call.is_none(),
                        ..scope
                    };
                    self.collect_calls(child, inner, out);
                }
                "defer_statement" => {
                    let expr = named_children(child).into_iter().next();
                    out.push(CallStatement {
                        node: NodeRef::of(child),
                        deferred: true,
                        callee: expr
                            .filter(|e| e.kind() == "call_expression")
                            .and_then(|e| self.callee(e)),
                        in_defer: scope.in_defer,
                        in_expression: scope.in_expression,
                        in_plain_expression: scope.in_plain_expression,
                    });
                    let inner = CallScope {
                        in_defer: true,
                        ..scope
                    };
                    self.collect_calls(child, inner, out);
                }
                _ => self.collect_calls(child, scope, out),
            }
        }
    }

    /// Renders the function being called the way call matching sees it:
    /// `name`, `operand.name`, or the callee of an inner call for `f()()`.
    fn callee(&self, call: Node<'_>) -> Option<String> {
        let function = call.child_by_field_name("function")?;
        match function.kind() {
            "identifier" => Some(self.text(function).to_string()),
            "selector_expression" => {
                let operand = function.child_by_field_name("operand")?;
                let field = function.child_by_field_name("field")?;
                (operand.kind() == "identifier")
                    .then(|| format!("{}.{}", self.text(operand), self.text(field)))
            }
            "call_expression" => self.callee(function),
            _ => None,
        }
    }
}

fn has_star(field: Node<'_>) -> bool {
    let mut cursor = field.walk();
    let found = field
        .children(&mut cursor)
        .any(|c| !c.is_named() && c.kind() == "*");
    found
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
