//! Inline splitting
//!
//! Runs the inline pipeline over paragraph text, header titles and, through
//! them, over list items and environment bodies. The pipeline order decides
//! the outcome on ambiguous input and must not be rearranged.

use once_cell::sync::Lazy;
use regex_lite::{Captures, Regex};

use super::blocks::link_from_captures;
use super::split::{group, non_blank, split, Construct, RegexConstruct, SpanMode};
use crate::error::{ExportError, Result};
use crate::node::{ExplicitRef, InlineMath, Node};

/// Characters allowed in a citation key
const KEY: &str = r"[^\]\[;, \t\n|#@]+";

static EXPLICIT_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"@(eq|lem|thm|def|cor|prop|sec|fig|tbl|rem|ex|conj|claim|obs|alg)-([A-Za-z0-9_:.\-]*[A-Za-z0-9_])",
    )
    .expect("valid regex")
});

static MULTI_CITATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\[(@{KEY}(?:[ \t]*;[ \t]*@{KEY})+)\]")).expect("valid regex")
});

static PANDOC_CITATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\[@({KEY}),[ \t]*([^\]\[\n]+)\]")).expect("valid regex")
});

static CITATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\[\[@({KEY})\]\]|\[@({KEY})\]")).expect("valid regex")
});

static WIKILINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:([A-Za-z][\w-]*)::)?\[\[([^\]\[#|]*)(?:#([^\]\[|]*))?(?:\|([^\]\[]*))?\]\]")
        .expect("valid regex")
});

static INLINE_MATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$([^$\n]+?)\$(?:\{([^}\n]*)\})?").expect("valid regex")
});

static DOUBLE_QUOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"“([^”]+?)”|"([^"\n]+?)""#).expect("valid regex"));

static SINGLE_QUOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"‘([^’\n]+?)’").expect("valid regex"));

static STRONG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*([^*\n]+?)\*\*|__([^_\n]+?)__").expect("valid regex"));

static EMPHASIS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^*\n]+?)\*").expect("valid regex"));

static INLINE_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([^`\n]+)`").expect("valid regex"));

fn build_explicit_ref(caps: &Captures<'_>) -> Result<Node> {
    Ok(Node::ExplicitRef(ExplicitRef {
        kind: group(caps, 1).unwrap_or_default().to_lowercase(),
        identifier: group(caps, 2).unwrap_or_default().to_string(),
        resolved_label: None,
    }))
}

fn build_multi_citation(caps: &Captures<'_>) -> Result<Node> {
    let keys = group(caps, 1)
        .unwrap_or_default()
        .split(';')
        .map(|key| key.trim().trim_start_matches('@').to_string())
        .filter(|key| !key.is_empty())
        .collect();
    Ok(Node::MultiCitation(keys))
}

fn build_pandoc_citation(caps: &Captures<'_>) -> Result<Node> {
    Ok(Node::PandocCitation {
        key: group(caps, 1).unwrap_or_default().to_string(),
        locator: group(caps, 2).unwrap_or_default().trim().to_string(),
    })
}

/// Exactly one of two alternative groups must have matched
fn either<'t>(caps: &Captures<'t>, construct: &'static str) -> Result<&'t str> {
    group(caps, 1).or_else(|| group(caps, 2)).ok_or_else(|| {
        ExportError::invariant(construct, "neither alternative group participated in the match")
    })
}

fn build_citation(caps: &Captures<'_>) -> Result<Node> {
    Ok(Node::Citation(either(caps, "citation")?.to_string()))
}

fn build_wikilink(caps: &Captures<'_>) -> Result<Node> {
    Ok(Node::PlainLink(link_from_captures(caps)))
}

fn build_inline_math(caps: &Captures<'_>) -> Result<Node> {
    let label = non_blank(caps, 2).map(|tag| {
        let tag = tag.trim_start_matches('#');
        tag.strip_prefix("eq-").unwrap_or(tag).to_string()
    });
    Ok(Node::InlineMath(InlineMath {
        content: group(caps, 1).unwrap_or_default().to_string(),
        label,
        resolved_label: None,
    }))
}

fn build_double_quote(caps: &Captures<'_>) -> Result<Node> {
    let inner = either(caps, "double quote")?;
    Ok(Node::DoubleQuote(nested(inner, DOUBLE_QUOTE.name())?))
}

fn build_single_quote(caps: &Captures<'_>) -> Result<Node> {
    let inner = group(caps, 1).unwrap_or_default();
    Ok(Node::SingleQuote(nested(inner, SINGLE_QUOTE.name())?))
}

fn build_strong(caps: &Captures<'_>) -> Result<Node> {
    let inner = either(caps, "strong")?;
    Ok(Node::Strong(nested(inner, STRONG.name())?))
}

fn build_emphasis(caps: &Captures<'_>) -> Result<Node> {
    let inner = group(caps, 1).unwrap_or_default();
    Ok(Node::Emphasis(nested(inner, EMPHASIS.name())?))
}

fn build_inline_code(caps: &Captures<'_>) -> Result<Node> {
    Ok(Node::InlineCode(group(caps, 1).unwrap_or_default().to_string()))
}

pub static EXPLICIT_REF: RegexConstruct =
    RegexConstruct::new("explicit reference", &EXPLICIT_REF_RE, build_explicit_ref);
pub static MULTI_CITATION: RegexConstruct =
    RegexConstruct::new("multi citation", &MULTI_CITATION_RE, build_multi_citation);
pub static PANDOC_CITATION: RegexConstruct =
    RegexConstruct::new("pandoc citation", &PANDOC_CITATION_RE, build_pandoc_citation);
pub static CITATION: RegexConstruct =
    RegexConstruct::new("citation", &CITATION_RE, build_citation);
pub static WIKILINK: RegexConstruct =
    RegexConstruct::new("wikilink", &WIKILINK_RE, build_wikilink);
pub static INLINE_MATH: RegexConstruct =
    RegexConstruct::new("inline math", &INLINE_MATH_RE, build_inline_math);
pub static DOUBLE_QUOTE: RegexConstruct =
    RegexConstruct::new("double quote", &DOUBLE_QUOTE_RE, build_double_quote);
pub static SINGLE_QUOTE: RegexConstruct =
    RegexConstruct::new("single quote", &SINGLE_QUOTE_RE, build_single_quote);
pub static STRONG: RegexConstruct = RegexConstruct::new("strong", &STRONG_RE, build_strong);
pub static EMPHASIS: RegexConstruct =
    RegexConstruct::new("emphasis", &EMPHASIS_RE, build_emphasis);
pub static INLINE_CODE: RegexConstruct =
    RegexConstruct::new("inline code", &INLINE_CODE_RE, build_inline_code);

/// Inline constructs in the order they are extracted
pub static INLINE_PIPELINE: [&dyn Construct; 11] = [
    &EXPLICIT_REF,
    &MULTI_CITATION,
    &PANDOC_CITATION,
    &CITATION,
    &WIKILINK,
    &INLINE_MATH,
    &DOUBLE_QUOTE,
    &SINGLE_QUOTE,
    &STRONG,
    &EMPHASIS,
    &INLINE_CODE,
];

fn run(nodes: Vec<Node>, stages: &[&dyn Construct]) -> Result<Vec<Node>> {
    let mut nodes = nodes;
    for construct in stages {
        nodes = split(nodes, *construct, SpanMode::Inline)?;
    }
    Ok(nodes)
}

/// Content of a markup span, split by the stages that follow `after`.
///
/// Earlier stages already ran over the enclosing text, so they cannot match
/// inside the span.
fn nested(text: &str, after: &str) -> Result<Vec<Node>> {
    let position = INLINE_PIPELINE
        .iter()
        .position(|c| c.name() == after)
        .ok_or_else(|| ExportError::invariant("inline pipeline", format!("unknown stage {}", after)))?;
    run(vec![Node::Text(text.to_string())], &INLINE_PIPELINE[position + 1..])
}

/// Display text of a link: math and markup only, nothing that resolves
pub fn split_display_text(text: &str) -> Result<Vec<Node>> {
    nested(text, WIKILINK.name())
}

/// Split a sequence of inline nodes with the whole pipeline
pub fn split_inline(nodes: Vec<Node>) -> Result<Vec<Node>> {
    run(nodes, &INLINE_PIPELINE)
}

/// Apply [`split_inline`] to every paragraph and header title in a tree
pub fn split_inline_tree(nodes: Vec<Node>) -> Result<Vec<Node>> {
    nodes.into_iter().map(split_inline_node).collect()
}

fn split_inline_node(node: Node) -> Result<Node> {
    Ok(match node {
        Node::Paragraph(children) => Node::Paragraph(split_inline(children)?),
        Node::Header(mut header) => {
            header.title = split_inline(header.title)?;
            header.children = split_inline_tree(header.children)?;
            Node::Header(header)
        }
        Node::Environment(mut env) => {
            env.children = split_inline_tree(env.children)?;
            Node::Environment(env)
        }
        Node::NumberedList(items) => Node::NumberedList(split_items(items)?),
        Node::UnorderedList(items) => Node::UnorderedList(split_items(items)?),
        other => other,
    })
}

fn split_items(items: Vec<Vec<Node>>) -> Result<Vec<Vec<Node>>> {
    items.into_iter().map(split_inline_tree).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Link;
    use proptest::prelude::*;

    fn inline(text: &str) -> Vec<Node> {
        split_inline(vec![Node::Text(text.to_string())]).unwrap()
    }

    fn text(s: &str) -> Node {
        Node::Text(s.to_string())
    }

    #[test]
    fn test_citations() {
        assert_eq!(
            inline("see [@knuth] and [@a; @b] or [@c, p. 4]"),
            vec![
                text("see "),
                Node::Citation("knuth".to_string()),
                text(" and "),
                Node::MultiCitation(vec!["a".to_string(), "b".to_string()]),
                text(" or "),
                Node::PandocCitation {
                    key: "c".to_string(),
                    locator: "p. 4".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_double_bracket_citation() {
        assert_eq!(inline("[[@knuth]]"), vec![Node::Citation("knuth".to_string())]);
    }

    #[test]
    fn test_explicit_ref() {
        assert_eq!(
            inline("by @lem-main."),
            vec![
                text("by "),
                Node::ExplicitRef(ExplicitRef {
                    kind: "lem".to_string(),
                    identifier: "main".to_string(),
                    resolved_label: None,
                }),
                text("."),
            ]
        );
    }

    #[test]
    fn test_wikilink_keeps_math_in_display() {
        assert_eq!(
            inline("[[B#Setup|the $x$ case]]"),
            vec![Node::PlainLink(Link {
                address: "B".to_string(),
                header: Some("Setup".to_string()),
                display: Some("the $x$ case".to_string()),
                attribute: None,
            })]
        );
    }

    #[test]
    fn test_inline_math_label() {
        assert_eq!(
            inline("$a+b${#eq-sum}"),
            vec![Node::InlineMath(InlineMath {
                content: "a+b".to_string(),
                label: Some("sum".to_string()),
                resolved_label: None,
            })]
        );
    }

    #[test]
    fn test_nested_markup() {
        assert_eq!(
            inline("__bold *it*__"),
            vec![Node::Strong(vec![
                text("bold "),
                Node::Emphasis(vec![text("it")]),
            ])]
        );
        assert_eq!(
            inline("\"quoted `code`\""),
            vec![Node::DoubleQuote(vec![
                text("quoted "),
                Node::InlineCode("code".to_string()),
            ])]
        );
    }

    #[test]
    fn test_tree_recursion() {
        let tree = crate::parser::parse_markdown("# A *b*\n- item *c*").unwrap();
        match &tree[..] {
            [Node::Header(header)] => {
                assert_eq!(
                    header.title,
                    vec![text("A "), Node::Emphasis(vec![text("b")])]
                );
                assert_eq!(
                    header.children,
                    vec![Node::UnorderedList(vec![vec![Node::Paragraph(vec![
                        text("item "),
                        Node::Emphasis(vec![text("c")]),
                    ])]])]
                );
            }
            other => panic!("unexpected nodes {:?}", other),
        }
    }

    proptest! {
        #[test]
        fn test_pipeline_is_idempotent(raw in r#"[a-z @*_$`"\[\];,|#-]{0,50}"#) {
            let once = inline(&raw);
            let twice = split_inline(once.clone()).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
