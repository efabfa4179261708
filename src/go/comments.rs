//! Comment grouping and comment-to-node association.
//!
//! Comments are grouped the way the Go parser groups them: a comment that
//! shares a line with the preceding code starts a group that only absorbs
//! further comments on that same line; otherwise adjacent comments with at
//! most one line break between them form a group. Groups are then attached
//! to syntax nodes following the rules of Go's `ast.NewCommentMap`.

use crate::go::position::{LineIndex, Span};
use crate::go::syntax::{NodeRef, SyntaxNode};
use std::collections::{BTreeMap, HashMap};

/// A single `//` or `/* */` comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub span: Span,
    pub text: String,
}

/// A sequence of comments with no code and no blank line between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentGroup {
    pub comments: Vec<Comment>,
    pub span: Span,
    /// The group started on the same line as preceding code.
    pub trailing: bool,
}

impl CommentGroup {
    fn new(comments: Vec<Comment>, trailing: bool) -> Self {
        let start = comments.first().map(|c| c.span.start).unwrap_or_default();
        let end = comments.last().map(|c| c.span.end).unwrap_or_default();
        Self {
            comments,
            span: Span::new(start, end),
            trailing,
        }
    }

    /// The text of the group with comment markers removed.
    ///
    /// The first space of a line comment is dropped, directives such as
    /// `//go:generate` are omitted, leading and trailing blank lines are
    /// removed and runs of interior blank lines collapse to one. A non-empty
    /// result always ends in a newline.
    pub fn text(&self) -> String {
        let mut lines: Vec<String> = Vec::with_capacity(10);
        for comment in &self.comments {
            let raw = comment.text.as_str();
            let body = if let Some(rest) = raw.strip_prefix("//") {
                if let Some(stripped) = rest.strip_prefix(' ') {
                    stripped
                } else if is_directive(rest) {
                    continue;
                } else {
                    rest
                }
            } else if let Some(rest) = raw.strip_prefix("/*") {
                rest.strip_suffix("*/").unwrap_or(rest)
            } else {
                raw
            };
            for line in body.split('\n') {
                lines.push(line.trim_end_matches([' ', '\t', '\n', '\r']).to_string());
            }
        }

        let mut kept: Vec<String> = Vec::with_capacity(lines.len() + 1);
        for line in lines {
            let previous_blank = kept.last().is_some_and(|l| l.is_empty());
            if !line.is_empty() || (!kept.is_empty() && !previous_blank) {
                kept.push(line);
            }
        }
        if kept.last().is_some_and(|l| !l.is_empty()) {
            kept.push(String::new());
        }
        kept.join("\n")
    }

    /// True if the rendered text contains `needle`. An empty needle never
    /// matches.
    pub fn contains(&self, needle: &str) -> bool {
        !needle.is_empty() && self.text().contains(needle)
    }
}

/// Reports whether a line comment body (without `//`) is a tool directive
/// like `line `, `export `, `extern ` or `[a-z0-9]+:[a-z0-9]`.
fn is_directive(body: &str) -> bool {
    if body.starts_with("line ") || body.starts_with("extern ") || body.starts_with("export ") {
        return true;
    }
    let bytes = body.as_bytes();
    let colon = match body.find(':') {
        Some(c) if c > 0 && c + 1 < bytes.len() => c,
        _ => return false,
    };
    bytes[..=colon + 1]
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != colon)
        .all(|(_, b)| b.is_ascii_lowercase() || b.is_ascii_digit())
}

/// Groups comments (given in source order) the way the Go parser does.
pub fn group_comments(source: &str, comments: Vec<Comment>, lines: &LineIndex) -> Vec<CommentGroup> {
    let mut groups = Vec::new();
    let start_line = |c: &Comment| lines.line(c.span.start);
    let end_line = |c: &Comment| lines.line(c.span.end);

    let mut i = 0;
    let mut scanned = 0;
    let mut code_line: Option<usize> = None;
    while i < comments.len() {
        let gap = source.get(scanned..comments[i].span.start).unwrap_or("");
        if let Some(last) = gap.rfind(|c: char| !c.is_whitespace()) {
            code_line = Some(lines.line(scanned + last));
        }

        // A run is a maximal sequence of comments with no code between.
        let mut run_end = i + 1;
        while run_end < comments.len()
            && source
                .get(comments[run_end - 1].span.end..comments[run_end].span.start)
                .is_some_and(|between| between.trim().is_empty())
        {
            run_end += 1;
        }

        let mut pos = i;
        let mut consume = |pos: &mut usize, gap_lines: usize, trailing: bool| {
            let first = *pos;
            let mut endline = start_line(&comments[first]);
            while *pos < run_end && start_line(&comments[*pos]) <= endline + gap_lines {
                endline = end_line(&comments[*pos]);
                *pos += 1;
            }
            groups.push(CommentGroup::new(comments[first..*pos].to_vec(), trailing));
        };
        if code_line == Some(start_line(&comments[pos])) {
            consume(&mut pos, 0, true);
        }
        while pos < run_end {
            consume(&mut pos, 1, false);
        }

        scanned = comments[run_end - 1].span.end;
        i = run_end;
    }
    groups
}

/// Associates comment groups with the syntax nodes they document.
#[derive(Debug, Clone, Default)]
pub struct CommentMap {
    entries: Vec<(NodeRef, Vec<CommentGroup>)>,
    index: HashMap<NodeRef, usize>,
}

impl CommentMap {
    /// Builds the association for a file given its pre-order node list
    /// (file node first) and its comment groups in source order.
    pub fn new(nodes: &[SyntaxNode], groups: &[CommentGroup], lines: &LineIndex) -> Self {
        let mut assoc: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        if !groups.is_empty() && !nodes.is_empty() {
            associate(nodes, groups, lines, &mut assoc);
        }

        let mut map = CommentMap::default();
        for (node, group_ids) in assoc {
            let node_ref = nodes[node].node;
            map.index.entry(node_ref).or_insert(map.entries.len());
            map.entries.push((
                node_ref,
                group_ids.into_iter().map(|g| groups[g].clone()).collect(),
            ));
        }
        map
    }

    /// Comment groups attached to `node`, if any.
    pub fn get(&self, node: &NodeRef) -> Option<&[CommentGroup]> {
        self.index
            .get(node)
            .map(|&i| self.entries[i].1.as_slice())
    }

    /// All associations, in node order.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeRef, &[CommentGroup])> {
        self.entries.iter().map(|(n, g)| (n, g.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn pop_before(stack: &mut Vec<usize>, nodes: &[SyntaxNode], pos: usize) -> Option<usize> {
    let mut top = None;
    while let Some(&last) = stack.last() {
        if nodes[last].node.span.end > pos {
            break;
        }
        top = Some(last);
        stack.pop();
    }
    top
}

fn associate(
    nodes: &[SyntaxNode],
    groups: &[CommentGroup],
    lines: &LineIndex,
    assoc: &mut BTreeMap<usize, Vec<usize>>,
) {
    let mut next = 0;
    let mut prev: Option<(usize, usize)> = None; // (node, end line)
    let mut prev_group: Option<(usize, usize)> = None;
    let mut stack: Vec<usize> = Vec::new();

    for q in 0..=nodes.len() {
        let at_end = q == nodes.len();
        let (q_offset, q_line) = if at_end {
            (usize::MAX, usize::MAX)
        } else {
            let start = nodes[q].node.span.start;
            (start, lines.line(start))
        };

        while groups[next].span.end <= q_offset {
            let group = &groups[next];
            if let Some(top) = pop_before(&mut stack, nodes, group.span.start) {
                prev_group = Some((top, lines.line(nodes[top].node.span.end)));
            }
            let g_line = lines.line(group.span.start);
            let g_end_line = lines.line(group.span.end);
            let follows = |end_line: usize| {
                end_line == g_line || (end_line + 1 == g_line && g_end_line + 1 < q_line)
            };

            let target = match (prev_group, prev) {
                (Some((pg, pg_end)), _) if follows(pg_end) => Some(pg),
                (_, Some((p, p_end))) if follows(p_end) || at_end => Some(p),
                _ if !at_end => Some(q),
                _ => None,
            };
            if let Some(node) = target {
                assoc.entry(node).or_default().push(next);
            }

            next += 1;
            if next == groups.len() {
                return;
            }
        }

        if at_end {
            return;
        }
        prev = Some((q, lines.line(nodes[q].node.span.end)));
        if nodes[q].group {
            pop_before(&mut stack, nodes, nodes[q].node.span.start);
            stack.push(q);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(source: &str, needle: &str) -> Comment {
        let start = source.find(needle).unwrap();
        Comment {
            span: Span::new(start, start + needle.len()),
            text: needle.to_string(),
        }
    }

    fn group(texts: &[&str]) -> CommentGroup {
        CommentGroup::new(
            texts
                .iter()
                .map(|t| Comment {
                    span: Span::default(),
                    text: t.to_string(),
                })
                .collect(),
            false,
        )
    }

    #[test]
    fn text_strips_markers_and_first_space() {
        assert_eq!(group(&["// hello", "//world"]).text(), "hello\nworld\n");
        assert_eq!(group(&["/* block\n   comment */"]).text(), " block\n   comment\n");
    }

    #[test]
    fn text_drops_directives_and_blank_lines() {
        let g = group(&["//go:generate stringer", "//", "// a", "//", "//", "// b", "//"]);
        assert_eq!(g.text(), "a\n\nb\n");
        assert_eq!(group(&["//line foo.go:1"]).text(), "");
        assert_eq!(group(&["//nolint:gocritic"]).text(), "");
    }

    #[test]
    fn text_keeps_non_directive_colons() {
        assert_eq!(group(&["//Note: x"]).text(), "Note: x\n");
        assert_eq!(group(&["// nologcall:"]).text(), "nologcall:\n");
    }

    #[test]
    fn contains_ignores_empty_needle() {
        let g = group(&["// before"]);
        assert!(g.contains("before"));
        assert!(!g.contains(""));
        assert!(!g.contains("after"));
    }

    #[test]
    fn trailing_comment_starts_its_own_group() {
        let source = "x := 1 // same line\n// next line\n\n// detached\ny := 2\n";
        let lines = LineIndex::new(source);
        let comments = vec![
            comment(source, "// same line"),
            comment(source, "// next line"),
            comment(source, "// detached"),
        ];
        let groups = group_comments(source, comments, &lines);
        assert_eq!(groups.len(), 3);
        assert!(groups[0].trailing);
        assert!(!groups[1].trailing);
        assert_eq!(groups[2].text(), "detached\n");
    }

    #[test]
    fn adjacent_lines_join_one_group() {
        let source = "// one\n// two\n/* three */\n\n// four\n";
        let lines = LineIndex::new(source);
        let comments = vec![
            comment(source, "// one"),
            comment(source, "// two"),
            comment(source, "/* three */"),
            comment(source, "// four"),
        ];
        let groups = group_comments(source, comments, &lines);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].comments.len(), 3);
        assert_eq!(groups[0].span, Span::new(0, 25));
    }

    #[test]
    fn directive_detection() {
        assert!(is_directive("go:noinline"));
        assert!(is_directive("export Foo"));
        assert!(!is_directive(" go:noinline"));
        assert!(!is_directive("Go:x"));
        assert!(!is_directive("go:"));
    }
}
