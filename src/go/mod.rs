//! Go front end built on tree-sitter-go.
//!
//! Files are parsed once and turned into an owned syntax model with comment
//! groups and a node list for comment association. Package-level type
//! tables sit on top of that for name resolution and method sets.

pub mod comments;
pub mod errors;
pub mod parser;
pub mod position;
pub mod query;
pub mod syntax;
pub mod types;
pub mod validator;

pub use comments::{CommentGroup, CommentMap};
pub use errors::ParseError;
pub use parser::{GoParser, ParsedSource};
pub use position::{LineIndex, Position, Span};
pub use query::{QueryEngine, QueryMatch};
pub use syntax::{is_exported, FuncDecl, NodeRef, SourceFile, TypeSpec};
pub use types::{FuncObject, MethodSet, TypeInfo, Universe};
pub use validator::validate_edit;
