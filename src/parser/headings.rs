//! Heading-tree builder
//!
//! Turns a flat block sequence into a tree where content is nested under the
//! heading that precedes it.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::split::trim_blank_lines;
use crate::node::{Header, Node};

static HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(#{1,6})[ \t]+(.*?)[ \t]*(?:\{#([^}]*)\})?[ \t]*$").expect("valid regex")
});

/// A heading line: level, title and optional `{#label}` tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingLine {
    pub level: usize,
    pub title: String,
    pub label: Option<String>,
}

/// Recognise a `# Title {#label}` line
pub fn heading_line(line: &str) -> Option<HeadingLine> {
    let caps = HEADING_RE.captures(line.trim_end_matches('\r'))?;
    let level = caps.get(1)?.as_str().len();
    let title = caps.get(2)?.as_str().trim().to_string();
    if title.is_empty() {
        return None;
    }
    let label = caps
        .get(3)
        .map(|m| m.as_str().trim().to_string())
        .filter(|l| !l.is_empty());
    Some(HeadingLine {
        level,
        title,
        label,
    })
}

/// An open section while building; the root frame has no header
struct Frame {
    header: Option<Header>,
    children: Vec<Node>,
}

impl Frame {
    fn level(&self) -> usize {
        self.header.as_ref().map_or(0, |h| h.level)
    }
}

struct TreeBuilder {
    stack: Vec<Frame>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            stack: vec![Frame {
                header: None,
                children: Vec::new(),
            }],
        }
    }

    fn push(&mut self, node: Node) {
        if let Some(top) = self.stack.last_mut() {
            top.children.push(node);
        }
    }

    /// Close every open section whose level is not below `level`, then open
    /// a new one nested under the nearest shallower section.
    fn open(&mut self, header: Header) {
        while self.stack.len() > 1 && self.stack.last().map_or(0, Frame::level) >= header.level {
            self.close_top();
        }
        self.stack.push(Frame {
            header: Some(header),
            children: Vec::new(),
        });
    }

    fn close_top(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        match frame.header {
            Some(mut header) => {
                header.children = frame.children;
                self.push(Node::Header(header));
            }
            // The root frame is never popped here; put it back untouched.
            None => self.stack.push(frame),
        }
    }

    fn finish(mut self) -> Vec<Node> {
        while self.stack.len() > 1 {
            self.close_top();
        }
        self.stack.pop().map(|root| root.children).unwrap_or_default()
    }

    /// Split a paragraph at its heading lines
    fn paragraph(&mut self, text: &str) {
        let mut buffer: Vec<&str> = Vec::new();
        for line in text.split('\n') {
            match heading_line(line) {
                Some(heading) => {
                    self.flush(&mut buffer);
                    let mut header = Header::new(heading.level, heading.title);
                    header.explicit_label = heading.label;
                    self.open(header);
                }
                None => buffer.push(line),
            }
        }
        self.flush(&mut buffer);
    }

    fn flush(&mut self, buffer: &mut Vec<&str>) {
        if buffer.is_empty() {
            return;
        }
        let joined = buffer.join("\n");
        buffer.clear();
        let text = trim_blank_lines(&joined);
        if !text.trim().is_empty() {
            self.push(Node::paragraph(text));
        }
    }
}

fn has_heading(text: &str) -> bool {
    text.split('\n').any(|line| heading_line(line).is_some())
}

/// Nest block nodes under the `#` headings found in their paragraphs.
///
/// A heading attaches to the nearest open heading with a strictly smaller
/// level; an equal or deeper open heading is closed first.
pub fn build_tree(nodes: Vec<Node>) -> Vec<Node> {
    let mut builder = TreeBuilder::new();
    for node in nodes {
        let text = match &node {
            Node::Paragraph(_) => node.unsplit_text().filter(|t| has_heading(t)),
            _ => None,
        };
        match text {
            Some(text) => {
                let text = text.to_string();
                builder.paragraph(&text);
            }
            None => builder.push(node),
        }
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::blocks::parse_blocks;
    use proptest::prelude::*;

    fn header_levels(nodes: &[Node], parent: usize, out: &mut Vec<usize>) -> bool {
        let mut ok = true;
        for node in nodes {
            if let Node::Header(h) = node {
                ok &= h.level > parent;
                out.push(h.level);
                ok &= header_levels(&h.children, h.level, out);
            }
        }
        ok
    }

    #[test]
    fn test_heading_line() {
        assert_eq!(
            heading_line("## Main result {#sec-main}"),
            Some(HeadingLine {
                level: 2,
                title: "Main result".to_string(),
                label: Some("sec-main".to_string()),
            })
        );
        assert!(heading_line("#tag").is_none());
        assert!(heading_line("# ").is_none());
    }

    #[test]
    fn test_nesting() {
        let nodes = build_tree(parse_blocks("# A\nintro\n## B\nbody\n# C").unwrap());
        assert_eq!(nodes.len(), 2);
        match &nodes[0] {
            Node::Header(a) => {
                assert_eq!(a.title_text(), "A");
                assert_eq!(a.children.len(), 2);
                assert_eq!(a.children[0], Node::paragraph("intro"));
                match &a.children[1] {
                    Node::Header(b) => assert_eq!(b.children, vec![Node::paragraph("body")]),
                    other => panic!("unexpected node {:?}", other),
                }
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_deeper_then_shallower() {
        // ### then ## : the ## closes the ### and both sit under the root
        let nodes = build_tree(parse_blocks("### deep\n## mid").unwrap());
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn test_leading_content_stays_at_root() {
        let nodes = build_tree(parse_blocks("preface\n\n# A\ntext").unwrap());
        assert_eq!(nodes[0], Node::paragraph("preface"));
        assert!(matches!(nodes.last(), Some(Node::Header(_))));
    }

    proptest! {
        #[test]
        fn test_levels_increase_and_order_is_kept(levels in proptest::collection::vec(1usize..=6, 0..20)) {
            let text: Vec<String> = levels
                .iter()
                .enumerate()
                .map(|(i, l)| format!("{} h{}\nbody {}", "#".repeat(*l), i, i))
                .collect();
            let nodes = build_tree(parse_blocks(&text.join("\n")).unwrap());
            let mut seen = Vec::new();
            prop_assert!(header_levels(&nodes, 0, &mut seen));
            prop_assert_eq!(seen, levels);
        }
    }
}
