//! Helpers over located functions and comments, used by annotators to
//! decide where and whether to edit.

use crate::go::comments::{CommentGroup, CommentMap};
use crate::go::position::Span;
use crate::go::syntax::{FuncDecl, NodeRef, SourceFile};
use regex::Regex;

/// Call statements in `decl` whose callee (`name` or `pkg.name`) matches
/// `callname`.
///
/// With `deferred` unset these are expression statements outside any
/// `defer`; with it set, `defer` statements outside any expression
/// statement. Calls nested in the arguments of a non-call expression
/// statement are not considered.
pub fn function_calls(decl: &FuncDecl, callname: &Regex, deferred: bool) -> Vec<NodeRef> {
    let Some(body) = &decl.body else {
        return Vec::new();
    };
    if body.statements.is_empty() {
        return Vec::new();
    }
    body.calls
        .iter()
        .filter(|call| call.deferred == deferred)
        .filter(|call| {
            if deferred {
                !call.in_expression
            } else {
                !call.in_defer && !call.in_plain_expression
            }
        })
        .filter(|call| call.callee.as_deref().is_some_and(|name| callname.is_match(name)))
        .map(|call| call.node)
        .collect()
}

/// Number of top-level statements in the body.
pub fn function_statements(decl: &FuncDecl) -> usize {
    decl.body.as_ref().map_or(0, |body| body.statements.len())
}

/// Reports whether the doc comment of `decl`, or a comment attached to one
/// of its top-level statements, contains `text`.
pub fn function_has_comment(decl: &FuncDecl, comments: &CommentMap, text: &str) -> bool {
    if decl.doc.as_ref().is_some_and(|doc| doc.contains(text)) {
        return true;
    }
    decl.body.iter().flat_map(|body| &body.statements).any(|stmt| {
        comments
            .get(stmt)
            .is_some_and(|groups| comment_groups_contain(groups, text))
    })
}

/// An empty `text` is never contained.
pub fn comment_groups_contain(groups: &[CommentGroup], text: &str) -> bool {
    groups.iter().any(|group| group.contains(text))
}

/// Smallest span covering every group.
pub fn comment_group_bounds(groups: &[CommentGroup]) -> Option<Span> {
    let start = groups.iter().map(|g| g.span.start).min()?;
    let end = groups.iter().map(|g| g.span.end).max()?;
    Some(Span::new(start, end))
}

/// Span of the import declarations leading the file.
pub fn import_block(file: &SourceFile) -> Option<Span> {
    file.import_block()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::go::parser::GoParser;

    const FUNCTIONS: &str = r#"package functions

import (
	"bytes"
	"io/ioutil"
)

func Empty() {
}

func HasCall() {
	// nologcall:

	// Comment before.
	ioutil.ReadFile("x") // Comment on the same line.
	// Comment after.
}

func HasDefer() {
	// Comment before.
	defer ioutil.ReadFile("x") // Comment on the same line.
	// Comment after.
	// nologcall:
}

func HasOther() {
	bytes.NewBuffer()
}

func HasOtherDefer() {
	defer bytes.NewBuffer()
}

func Expressions() {
	x := ioutil.ReadFile
	x("x")

	y := func() func() {
		return func() {}
	}

	y()()
}
"#;

    fn parse() -> (SourceFile, CommentMap) {
        let mut parser = GoParser::new().unwrap();
        let file = SourceFile::parse(&mut parser, FUNCTIONS).unwrap();
        let comments = CommentMap::new(&file.nodes, &file.comments, &file.lines);
        (file, comments)
    }

    #[test]
    fn calls_statements_and_comments() {
        let (file, comments) = parse();
        let read_file = Regex::new("ioutil.ReadFile").unwrap();
        let read_any = Regex::new("ioutil.Read.*").unwrap();
        // (statements, calls, deferred calls, has comment)
        let expected = [
            (0, 0, 0, false),
            (1, 1, 0, true),
            (1, 0, 1, true),
            (1, 0, 0, false),
            (1, 0, 0, false),
            (4, 0, 0, false),
        ];
        let decls: Vec<_> = file.functions().collect();
        assert_eq!(decls.len(), expected.len());
        for (decl, (statements, calls, deferred, commented)) in decls.into_iter().zip(expected) {
            let name = &decl.name.name;
            assert_eq!(function_statements(decl), statements, "{name}");
            assert_eq!(function_calls(decl, &read_file, false).len(), calls, "{name}");
            assert_eq!(function_calls(decl, &read_any, true).len(), deferred, "{name}");
            assert_eq!(function_has_comment(decl, &comments, "nologcall:"), commented, "{name}");
        }
    }

    #[test]
    fn comments_around_a_call() {
        let (file, comments) = parse();
        let read_file = Regex::new("ioutil.ReadFile").unwrap();
        let cases = [("HasCall", false, (12, 2), (16, 19)), ("HasDefer", true, (20, 2), (23, 15))];
        for (name, deferred, first, last) in cases {
            let decl = file.functions().find(|f| f.name.name == name).unwrap();
            let calls = function_calls(decl, &read_file, deferred);
            assert_eq!(calls.len(), 1, "{name}");
            let groups = comments.get(&calls[0]).expect("comments attached to call");
            for text in ["", "not there"] {
                assert!(!comment_groups_contain(groups, text), "{name}: {text:?}");
            }
            for text in ["before", "same line", "after"] {
                assert!(comment_groups_contain(groups, text), "{name}: {text:?}");
            }
            let bounds = comment_group_bounds(groups).unwrap();
            assert_eq!(file.lines.line_col(bounds.start), first, "{name}");
            assert_eq!(file.lines.line_col(bounds.end), last, "{name}");
        }
    }

    #[test]
    fn bounds_of_nothing() {
        assert_eq!(comment_group_bounds(&[]), None);
        assert!(!comment_groups_contain(&[], "x"));
    }

    #[test]
    fn import_block_spans_leading_imports() {
        let (file, _) = parse();
        let block = import_block(&file).unwrap();
        assert_eq!(file.lines.line_col(block.start), (3, 1));
        assert_eq!(file.lines.line_col(block.end), (6, 2));
    }
}
