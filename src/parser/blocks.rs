//! Block-level splitting
//!
//! The block pipeline runs one construct at a time over the remaining text.
//! Order matters: code blocks and embeds are taken out before environments so
//! their contents are never mistaken for environment delimiters.

use once_cell::sync::Lazy;
use regex_lite::{Captures, Regex};

use super::headings::heading_line;
use super::lists::{starts_list_item, BULLET_LIST, NUMBERED_LIST};
use super::split::{
    group, non_blank, split, trim_blank_lines, Construct, Match, RegexConstruct, SpanMode,
};
use crate::error::Result;
use crate::node::{DisplayMath, Environment, Link, Node};

static DISPLAY_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[ \t]*\{?([A-Za-z0-9_+#.-]*)\}?[ \t]*\n(.*?)```").expect("valid regex")
});

static COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)%%(.*?)%%").expect("valid regex"));

static EMBED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:([A-Za-z][\w-]*)::)?!\[\[([^\]\[#|]*)(?:#([^\]\[|]*))?(?:\|([^\]\[]*))?\]\]")
        .expect("valid regex")
});

static ENVIRONMENT_OPEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*([A-Za-z][A-Za-z0-9_*]*)::[ \t]*(?:\{#([^}\n]*)\})?")
        .expect("valid regex")
});

static DISPLAY_MATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\$\$(.*?)\$\$(?:[ \t]*\{#([^}\n]*)\})?").expect("valid regex")
});

static QUOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^>[^\n]*(?:\n>[^\n]*)*").expect("valid regex"));

static BLANK_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)*").expect("valid regex"));

fn build_display_code(caps: &Captures<'_>) -> Result<Node> {
    Ok(Node::DisplayCode {
        language: non_blank(caps, 1).map(str::to_string),
        code: group(caps, 2).unwrap_or_default().to_string(),
    })
}

fn build_comment(caps: &Captures<'_>) -> Result<Node> {
    Ok(Node::Comment(group(caps, 1).unwrap_or_default().to_string()))
}

/// Shared by embeds and inline wikilinks: `attr::`, address, `#header`, `|display`
pub(crate) fn link_from_captures(caps: &Captures<'_>) -> Link {
    Link {
        attribute: non_blank(caps, 1).map(str::to_string),
        address: group(caps, 2).unwrap_or_default().trim().to_string(),
        header: non_blank(caps, 3).map(str::to_string),
        display: non_blank(caps, 4).map(str::to_string),
    }
}

fn build_embed(caps: &Captures<'_>) -> Result<Node> {
    Ok(Node::EmbedLink(link_from_captures(caps)))
}

fn build_display_math(caps: &Captures<'_>) -> Result<Node> {
    let raw = group(caps, 1).unwrap_or_default().trim();
    let (environment, content) = match split_math_environment(raw) {
        Some((name, inner)) => (Some(name.to_string()), inner.trim().to_string()),
        None => (None, raw.to_string()),
    };
    let label = non_blank(caps, 2).map(|tag| tag.strip_prefix("eq-").unwrap_or(tag).to_string());
    Ok(Node::DisplayMath(DisplayMath {
        content,
        environment,
        label,
        resolved_label: None,
    }))
}

/// `\begin{align}...\end{align}` -> (`align`, inner)
fn split_math_environment(raw: &str) -> Option<(&str, &str)> {
    let rest = raw.strip_prefix("\\begin{")?;
    let close = rest.find('}')?;
    let name = &rest[..close];
    let body = &rest[close + 1..];
    let inner = body.strip_suffix(&format!("\\end{{{}}}", name))?;
    Some((name, inner))
}

fn build_quote(caps: &Captures<'_>) -> Result<Node> {
    Ok(Node::Quote(group(caps, 0).unwrap_or_default().to_string()))
}

fn build_blank_line(_caps: &Captures<'_>) -> Result<Node> {
    Ok(Node::BlankLine)
}

pub static DISPLAY_CODE: RegexConstruct =
    RegexConstruct::new("display code", &DISPLAY_CODE_RE, build_display_code);
pub static COMMENT: RegexConstruct = RegexConstruct::new("comment", &COMMENT_RE, build_comment);
pub static EMBED: RegexConstruct = RegexConstruct::new("embed", &EMBED_RE, build_embed);
pub static DISPLAY_MATH: RegexConstruct =
    RegexConstruct::new("display math", &DISPLAY_MATH_RE, build_display_math);
pub static QUOTE: RegexConstruct = RegexConstruct::new("quote", &QUOTE_RE, build_quote);
pub static BLANK_LINE: RegexConstruct =
    RegexConstruct::new("blank line", &BLANK_LINE_RE, build_blank_line);
pub static ENVIRONMENT: EnvironmentConstruct = EnvironmentConstruct;

/// `type::[{#label}] ... ::type`
///
/// The closing tag must repeat the opening name, which a regular expression
/// without back references cannot express, so the closer is searched by hand.
pub struct EnvironmentConstruct;

impl Construct for EnvironmentConstruct {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn next_match(&self, text: &str, from: usize) -> Result<Option<Match>> {
        let mut search = from;
        while let Some(caps) = ENVIRONMENT_OPEN_RE.captures_at(text, search) {
            let (Some(opener), Some(kind)) = (caps.get(0), caps.get(1)) else {
                break;
            };
            search = opener.end();
            let Some(close) = find_closer(text, opener.end(), kind.as_str()) else {
                continue;
            };
            let body = &text[opener.end()..close];
            let mut env = Environment::new(kind.as_str(), super::parse_body(body)?);
            env.explicit_label = non_blank(&caps, 2).map(str::to_string);
            return Ok(Some(Match {
                range: opener.start()..close + 2 + kind.as_str().len(),
                node: Node::Environment(env),
            }));
        }
        Ok(None)
    }
}

/// Byte offset of the `::kind` that closes an environment opened before `from`
fn find_closer(text: &str, from: usize, kind: &str) -> Option<usize> {
    let needle = format!("::{}", kind);
    let mut at = from;
    while let Some(offset) = text[at..].find(&needle) {
        let start = at + offset;
        let end = start + needle.len();
        let boundary = text[end..]
            .chars()
            .next()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_' || c == '*'));
        if boundary {
            return Some(start);
        }
        at = end;
    }
    None
}

/// A construct that leaves occurrences inside list items alone.
///
/// The list scanner parses each item body again, so the occurrence is still
/// extracted there and the list stays in one piece.
pub struct OutsideLists(&'static RegexConstruct);

impl Construct for OutsideLists {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn next_match(&self, text: &str, from: usize) -> Result<Option<Match>> {
        let mut at = from;
        while let Some(found) = self.0.next_match(text, at)? {
            if !in_list_item(text, found.range.start) {
                return Ok(Some(found));
            }
            if found.range.end <= at {
                break;
            }
            at = found.range.end;
        }
        Ok(None)
    }
}

/// Whether byte `at` belongs to a list item: its line, or a line above it
/// with no blank line or heading in between, starts with a list marker
fn in_list_item(text: &str, at: usize) -> bool {
    let mut end = at;
    loop {
        let start = text[..end].rfind('\n').map_or(0, |i| i + 1);
        let line = &text[start..end];
        if starts_list_item(line) {
            return true;
        }
        let above = end != at;
        if start == 0 || (above && (line.trim().is_empty() || heading_line(line).is_some())) {
            return false;
        }
        end = start - 1;
    }
}

pub static EMBED_OUTSIDE_LISTS: OutsideLists = OutsideLists(&EMBED);
pub static DISPLAY_MATH_OUTSIDE_LISTS: OutsideLists = OutsideLists(&DISPLAY_MATH);

/// Block constructs in the order they are extracted
pub static BLOCK_PIPELINE: [&dyn Construct; 9] = [
    &DISPLAY_CODE,
    &COMMENT,
    &EMBED_OUTSIDE_LISTS,
    &ENVIRONMENT,
    &DISPLAY_MATH_OUTSIDE_LISTS,
    &QUOTE,
    &NUMBERED_LIST,
    &BULLET_LIST,
    &BLANK_LINE,
];

/// Split raw text into block nodes.
///
/// Every paragraph in the result holds exactly one unsplit `Text` child.
pub fn parse_blocks(text: &str) -> Result<Vec<Node>> {
    let trimmed = trim_blank_lines(text);
    if trimmed.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut nodes = vec![Node::paragraph(trimmed)];
    for construct in BLOCK_PIPELINE.iter() {
        nodes = split(nodes, *construct, SpanMode::Block)?;
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment() {
        let nodes = parse_blocks("lemma::\nI say things\n::lemma").unwrap();
        assert_eq!(
            nodes,
            vec![Node::Environment(Environment::new(
                "lemma",
                vec![Node::paragraph("I say things")]
            ))]
        );
    }

    #[test]
    fn test_environment_with_label() {
        let nodes = parse_blocks("theorem::{#thm-main}\nAll good.\n::theorem").unwrap();
        match &nodes[..] {
            [Node::Environment(env)] => {
                assert_eq!(env.kind, "theorem");
                assert_eq!(env.explicit_label.as_deref(), Some("thm-main"));
                assert_eq!(env.children, vec![Node::paragraph("All good.")]);
            }
            other => panic!("unexpected nodes {:?}", other),
        }
    }

    #[test]
    fn test_unclosed_environment_is_text() {
        let nodes = parse_blocks("lemma::\nno closer here").unwrap();
        assert_eq!(nodes, vec![Node::paragraph("lemma::\nno closer here")]);
    }

    #[test]
    fn test_display_math_label() {
        let nodes = parse_blocks("$$hi$$ {#eq-label}").unwrap();
        assert_eq!(
            nodes,
            vec![Node::DisplayMath(DisplayMath {
                content: "hi".to_string(),
                environment: None,
                label: Some("label".to_string()),
                resolved_label: None,
            })]
        );
    }

    #[test]
    fn test_display_math_environment() {
        let nodes = parse_blocks("$$\\begin{align}a &= b\\end{align}$$").unwrap();
        match &nodes[..] {
            [Node::DisplayMath(math)] => {
                assert_eq!(math.environment.as_deref(), Some("align"));
                assert_eq!(math.content, "a &= b");
            }
            other => panic!("unexpected nodes {:?}", other),
        }
    }

    #[test]
    fn test_embed_with_attribute() {
        let nodes = parse_blocks("lemma::![[B#Setup|shown]]").unwrap();
        assert_eq!(
            nodes,
            vec![Node::EmbedLink(Link {
                address: "B".to_string(),
                header: Some("Setup".to_string()),
                display: Some("shown".to_string()),
                attribute: Some("lemma".to_string()),
            })]
        );
    }

    #[test]
    fn test_code_block_is_inert() {
        let nodes = parse_blocks("```rust\nlemma::\n![[B]]\n::lemma\n```").unwrap();
        assert_eq!(
            nodes,
            vec![Node::DisplayCode {
                language: Some("rust".to_string()),
                code: "lemma::\n![[B]]\n::lemma\n".to_string(),
            }]
        );
    }

    #[test]
    fn test_paragraphs_quotes_and_comments() {
        let nodes = parse_blocks("first\n\n> quoted\n> more\n\nsecond %%hidden%% end").unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::paragraph("first"),
                Node::BlankLine,
                Node::Quote("> quoted\n> more".to_string()),
                Node::BlankLine,
                Node::paragraph("second "),
                Node::Comment("hidden".to_string()),
                Node::paragraph(" end"),
            ]
        );
    }

    #[test]
    fn test_inline_environment() {
        let nodes = parse_blocks("lemma::Every x is fine::lemma").unwrap();
        assert_eq!(
            nodes,
            vec![Node::Environment(Environment::new(
                "lemma",
                vec![Node::paragraph("Every x is fine")]
            ))]
        );
    }

    #[test]
    fn test_closer_at_end_of_text_line() {
        let nodes = parse_blocks("lemma::{#lem-a}\nEvery x is fine\nreally::lemma").unwrap();
        match &nodes[..] {
            [Node::Environment(env)] => {
                assert_eq!(env.explicit_label.as_deref(), Some("lem-a"));
                assert_eq!(env.children, vec![Node::paragraph("Every x is fine\nreally")]);
            }
            other => panic!("unexpected nodes {:?}", other),
        }
    }

    #[test]
    fn test_closer_needs_a_name_boundary() {
        let nodes = parse_blocks("lemma::\nsee ::lemmas here\n::lemma").unwrap();
        match &nodes[..] {
            [Node::Environment(env)] => {
                assert_eq!(env.children, vec![Node::paragraph("see ::lemmas here")]);
            }
            other => panic!("unexpected nodes {:?}", other),
        }
    }

    #[test]
    fn test_blank_lines_around_embed() {
        let nodes = parse_blocks("one\n\n![[B]]\ntwo").unwrap();
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[1], Node::BlankLine);
        assert_eq!(nodes[3], Node::paragraph("two"));
    }

    #[test]
    fn test_blank_lines_between_paragraphs() {
        let nodes = parse_blocks("one\n\n\ntwo").unwrap();
        assert_eq!(
            nodes,
            vec![Node::paragraph("one"), Node::BlankLine, Node::paragraph("two")]
        );
    }
}
