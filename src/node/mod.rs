//! Document tree produced by the parser and rewritten by the unroll pass
//!
//! [`Node`] is a closed set of variants. Parsing builds the tree, the unroll
//! engine ([`crate::unroll`]) rewrites it and [`Node::render`] serializes it.

mod render;

pub use render::{escape_text, render_nodes, render_to_string, section_command};

use crate::unroll::HeaderEntry;

/// A node of the document tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text
    Text(String),
    /// Inline content. Holds a single `Text` right after block splitting.
    Paragraph(Vec<Node>),
    Header(Header),
    Environment(Environment),
    /// `![[address#header|display]]`, resolved during unroll
    EmbedLink(Link),
    /// `[[address#header|display]]`, resolved during unroll
    PlainLink(Link),
    /// `[@key]`
    Citation(String),
    /// `[@a; @b]`
    MultiCitation(Vec<String>),
    /// `[@key, locator]`
    PandocCitation { key: String, locator: String },
    DisplayMath(DisplayMath),
    InlineMath(InlineMath),
    DisplayCode {
        language: Option<String>,
        code: String,
    },
    InlineCode(String),
    /// `>` block quote, dropped from the output
    Quote(String),
    /// `%% ... %%` comment, dropped from the output
    Comment(String),
    NumberedList(Vec<Vec<Node>>),
    UnorderedList(Vec<Vec<Node>>),
    BlankLine,
    /// Cross reference to a derived label
    Reference {
        label: String,
        display: Option<String>,
    },
    Hyperlink {
        label: String,
        text: String,
    },
    /// `@kind-identifier`
    ExplicitRef(ExplicitRef),
    Emphasis(Vec<Node>),
    Strong(Vec<Node>),
    DoubleQuote(Vec<Node>),
    SingleQuote(Vec<Node>),
    /// Embedded image
    Figure {
        path: String,
        caption: Option<String>,
    },
    /// Visible placeholder for content that could not be resolved
    Warning(String),
}

/// A section heading and the content nested under it
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub level: usize,
    pub title: Vec<Node>,
    pub children: Vec<Node>,
    /// Raw `{#kind-label}` tag from the heading line
    pub explicit_label: Option<String>,
    /// Final label, set during unroll
    pub label: Option<String>,
    /// Ancestor header chain captured during unroll, including this header
    pub ancestors: Option<Vec<HeaderEntry>>,
}

impl Header {
    pub fn new(level: usize, title: impl Into<String>) -> Self {
        Self {
            level,
            title: vec![Node::Text(title.into())],
            children: Vec::new(),
            explicit_label: None,
            label: None,
            ancestors: None,
        }
    }

    /// Title as plain text, used for anchor matching
    pub fn title_text(&self) -> String {
        plain_text(&self.title).trim().to_string()
    }
}

/// A named LaTeX block such as `lemma` or `proof`
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub kind: String,
    pub children: Vec<Node>,
    pub explicit_label: Option<String>,
    pub label: Option<String>,
    /// For proofs: label of the statement being proved
    pub proof_of: Option<String>,
}

impl Environment {
    pub fn new(kind: impl Into<String>, children: Vec<Node>) -> Self {
        Self {
            kind: kind.into(),
            children,
            explicit_label: None,
            label: None,
            proof_of: None,
        }
    }

    pub fn is_proof(&self) -> bool {
        self.kind.eq_ignore_ascii_case(crate::labels::PROOF)
    }
}

/// An unresolved relation to another note
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Link {
    pub address: String,
    pub header: Option<String>,
    pub display: Option<String>,
    /// `lemma` in `lemma::![[B]]`
    pub attribute: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMath {
    pub content: String,
    /// Name from `$$\begin{align}...\end{align}$$`
    pub environment: Option<String>,
    /// Tag from `{#eq-label}`, without the `eq-` prefix
    pub label: Option<String>,
    pub resolved_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineMath {
    pub content: String,
    pub label: Option<String>,
    pub resolved_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplicitRef {
    pub kind: String,
    pub identifier: String,
    pub resolved_label: Option<String>,
}

impl Node {
    /// Paragraph wrapping a single text span
    pub fn paragraph(text: impl Into<String>) -> Self {
        Node::Paragraph(vec![Node::Text(text.into())])
    }

    /// The text of a paragraph that has not been inline-split yet
    pub fn unsplit_text(&self) -> Option<&str> {
        match self {
            Node::Text(text) => Some(text),
            Node::Paragraph(children) => match children.as_slice() {
                [Node::Text(text)] => Some(text),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Concatenated literal content of a node sequence
pub fn plain_text(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        push_plain_text(node, &mut out);
    }
    out
}

fn push_plain_text(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) | Node::InlineCode(text) => out.push_str(text),
        Node::InlineMath(math) => {
            out.push('$');
            out.push_str(&math.content);
            out.push('$');
        }
        Node::Paragraph(children)
        | Node::Emphasis(children)
        | Node::Strong(children)
        | Node::DoubleQuote(children)
        | Node::SingleQuote(children) => {
            for child in children {
                push_plain_text(child, out);
            }
        }
        Node::PlainLink(link) | Node::EmbedLink(link) => {
            out.push_str(link.display.as_deref().unwrap_or(link.address.as_str()))
        }
        Node::Reference { display, label } => {
            out.push_str(display.as_deref().unwrap_or(label.as_str()))
        }
        Node::Hyperlink { text, .. } => out.push_str(text),
        _ => {}
    }
}

/// Apply `f` to every header in the tree, outermost first
pub fn for_each_header_mut(nodes: &mut [Node], f: &mut dyn FnMut(&mut Header)) {
    for node in nodes {
        match node {
            Node::Header(header) => {
                f(header);
                for_each_header_mut(&mut header.children, f);
            }
            Node::Environment(env) => for_each_header_mut(&mut env.children, f),
            Node::NumberedList(items) | Node::UnorderedList(items) => {
                for item in items {
                    for_each_header_mut(item, f);
                }
            }
            _ => {}
        }
    }
}
