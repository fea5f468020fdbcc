//! The generic split operation shared by block and inline parsing
//!
//! A [`Construct`] finds occurrences of one syntax form inside a text span and
//! builds the node for each occurrence. [`split`] applies one construct to
//! every unsplit text node of a sequence; the parsers run a fixed pipeline of
//! constructs, one split per construct.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex_lite::{Captures, Regex};

use crate::error::{ExportError, Result};
use crate::node::Node;

/// One occurrence of a construct inside a text span
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// Byte range of the occurrence in the scanned text
    pub range: Range<usize>,
    pub node: Node,
}

/// A syntax form the splitter can extract
pub trait Construct: Sync {
    fn name(&self) -> &'static str;

    /// Leftmost occurrence starting at or after byte `from`
    fn next_match(&self, text: &str, from: usize) -> Result<Option<Match>>;
}

/// How literal spans between matches are emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanMode {
    /// Wrap each literal span in a paragraph after stripping leading and
    /// trailing blank lines; an empty line next to a match becomes a
    /// [`Node::BlankLine`].
    Block,
    /// Keep literal spans verbatim as text nodes; drop only empty spans.
    Inline,
}

/// A piece of a scanned text: either a literal span or a construct occurrence
#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    pub range: Range<usize>,
    pub node: Option<Node>,
}

/// Cut `text` into alternating literal spans and non-overlapping matches.
///
/// The ranges of the returned pieces tile `text` exactly.
pub fn scan(text: &str, construct: &dyn Construct) -> Result<Vec<Piece>> {
    let mut pieces = Vec::new();
    let mut cursor = 0;
    while cursor < text.len() {
        let Some(found) = construct.next_match(text, cursor)? else {
            break;
        };
        if found.range.end <= found.range.start {
            // An empty match would never advance; treat the rest as literal.
            break;
        }
        if found.range.start > cursor {
            pieces.push(Piece {
                range: cursor..found.range.start,
                node: None,
            });
        }
        cursor = found.range.end;
        pieces.push(Piece {
            range: found.range,
            node: Some(found.node),
        });
    }
    if cursor < text.len() {
        pieces.push(Piece {
            range: cursor..text.len(),
            node: None,
        });
    }
    Ok(pieces)
}

/// Apply one construct to every unsplit text node of `nodes`.
///
/// In block mode both bare `Text` and a `Paragraph` holding a single `Text`
/// are scanned; in inline mode only bare `Text`. Every other node passes
/// through unchanged.
pub fn split(nodes: Vec<Node>, construct: &dyn Construct, mode: SpanMode) -> Result<Vec<Node>> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        let splittable = match &node {
            Node::Text(_) => true,
            Node::Paragraph(_) => mode == SpanMode::Block && node.unsplit_text().is_some(),
            _ => false,
        };
        if !splittable {
            out.push(node);
            continue;
        }
        let text = node.unsplit_text().unwrap_or_default().to_string();
        for piece in scan(&text, construct)? {
            match piece.node {
                Some(node) => out.push(node),
                None => push_literal(&text[piece.range], mode, &mut out),
            }
        }
    }
    Ok(out)
}

fn push_literal(span: &str, mode: SpanMode, out: &mut Vec<Node>) {
    match mode {
        SpanMode::Block => {
            let Some(content) = content_lines(span) else {
                if has_blank_line(span) {
                    out.push(Node::BlankLine);
                }
                return;
            };
            if has_blank_line(&span[..content.start]) {
                out.push(Node::BlankLine);
            }
            let line = &span[content.clone()];
            out.push(Node::paragraph(line.strip_suffix('\r').unwrap_or(line)));
            if has_blank_line(&span[content.end..]) {
                out.push(Node::BlankLine);
            }
        }
        SpanMode::Inline => {
            if !span.is_empty() {
                out.push(Node::Text(span.to_string()));
            }
        }
    }
}

/// Drop whitespace-only lines at both ends of `span`.
///
/// The first and last lines with content are kept whole and nothing between
/// them changes.
pub fn trim_blank_lines(span: &str) -> &str {
    match content_lines(span) {
        Some(range) => {
            let line = &span[range];
            line.strip_suffix('\r').unwrap_or(line)
        }
        None => "",
    }
}

/// From the start of the first line with content to the end of the last one,
/// excluding its newline
fn content_lines(span: &str) -> Option<Range<usize>> {
    let first = span.find(|c: char| !c.is_whitespace())?;
    let start = span[..first].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let last = span
        .rfind(|c: char| !c.is_whitespace())
        .map(|i| i + span[i..].chars().next().map(char::len_utf8).unwrap_or(1))
        .unwrap_or(span.len());
    let end = span[last..]
        .find('\n')
        .map(|i| last + i)
        .unwrap_or(span.len());
    Some(start..end)
}

/// Whitespace that spans at least one empty line between two blocks
fn has_blank_line(whitespace: &str) -> bool {
    whitespace.matches('\n').nth(1).is_some()
}

/// Constructor invoked with the captures of a regex match
pub type Builder = fn(&Captures<'_>) -> Result<Node>;

/// A construct recognised by a single regular expression
pub struct RegexConstruct {
    name: &'static str,
    regex: &'static Lazy<Regex>,
    build: Builder,
}

impl RegexConstruct {
    pub const fn new(name: &'static str, regex: &'static Lazy<Regex>, build: Builder) -> Self {
        Self { name, regex, build }
    }
}

impl Construct for RegexConstruct {
    fn name(&self) -> &'static str {
        self.name
    }

    fn next_match(&self, text: &str, from: usize) -> Result<Option<Match>> {
        let Some(caps) = self.regex.captures_at(text, from) else {
            return Ok(None);
        };
        let Some(whole) = caps.get(0) else {
            return Err(ExportError::invariant(self.name, "match without a span"));
        };
        let node = (self.build)(&caps)?;
        Ok(Some(Match {
            range: whole.range(),
            node,
        }))
    }
}

/// Text of capture group `i`, if it participated in the match
pub fn group<'t>(caps: &Captures<'t>, i: usize) -> Option<&'t str> {
    caps.get(i).map(|m| m.as_str())
}

/// Like [`group`] but treats an empty or blank capture as absent
pub fn non_blank<'t>(caps: &Captures<'t>, i: usize) -> Option<&'t str> {
    group(caps, i).map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    static STAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*\n]+)\*").expect("valid regex"));

    fn star(caps: &Captures<'_>) -> Result<Node> {
        Ok(Node::Emphasis(vec![Node::Text(
            group(caps, 1).unwrap_or_default().to_string(),
        )]))
    }

    static STAR_CONSTRUCT: RegexConstruct = RegexConstruct::new("star", &STAR, star);

    #[test]
    fn test_trim_blank_lines() {
        assert_eq!(trim_blank_lines("\n\n  hello\n  world  \n \n"), "  hello\n  world  ");
        assert_eq!(trim_blank_lines("  \n\t\n"), "");
        assert_eq!(trim_blank_lines("a\n\n\nb"), "a\n\n\nb");
    }

    #[test]
    fn test_split_inline_keeps_whitespace_spans() {
        let nodes = vec![Node::Text("*a* *b*".to_string())];
        let out = split(nodes, &STAR_CONSTRUCT, SpanMode::Inline).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[1], Node::Text(" ".to_string()));
    }

    #[test]
    fn test_split_block_keeps_paragraph_breaks() {
        let nodes = vec![Node::paragraph("*a*\n\n*b*\nrest\n")];
        let out = split(nodes, &STAR_CONSTRUCT, SpanMode::Block).unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(out[1], Node::BlankLine);
        assert_eq!(out[3], Node::paragraph("rest"));

        let nodes = vec![Node::paragraph("before\n\n*a*\n \n\nafter")];
        let out = split(nodes, &STAR_CONSTRUCT, SpanMode::Block).unwrap();
        assert_eq!(
            out,
            vec![
                Node::paragraph("before"),
                Node::BlankLine,
                Node::Emphasis(vec![Node::Text("a".to_string())]),
                Node::BlankLine,
                Node::paragraph("after"),
            ]
        );
    }

    #[test]
    fn test_split_block_single_newline_is_not_a_break() {
        let nodes = vec![Node::paragraph("*a*\n*b*")];
        let out = split(nodes, &STAR_CONSTRUCT, SpanMode::Block).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_split_passes_other_nodes() {
        let nodes = vec![Node::BlankLine, Node::InlineCode("*x*".to_string())];
        let out = split(nodes.clone(), &STAR_CONSTRUCT, SpanMode::Inline).unwrap();
        assert_eq!(out, nodes);
    }

    proptest! {
        #[test]
        fn test_pieces_tile_the_input(text in "[a-z *\n]{0,60}") {
            let pieces = scan(&text, &STAR_CONSTRUCT).unwrap();
            let mut rebuilt = String::new();
            for piece in &pieces {
                rebuilt.push_str(&text[piece.range.clone()]);
            }
            prop_assert_eq!(rebuilt, text);
        }
    }
}
