//! Line-oriented list scanner
//!
//! A list starts at an unindented marker line and runs until a blank line, a
//! heading, or an unindented marker of the other list kind. Indented lines
//! belong to the current item; after dedenting they are parsed again as
//! blocks, which is how nested lists come out. There is no limit on the
//! number of items.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::blocks::parse_blocks;
use super::headings::heading_line;
use super::split::{Construct, Match};
use crate::error::Result;
use crate::node::Node;

static NUMBERED_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+[.)][ \t]+").expect("valid regex"));

static BULLET_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-+*][ \t]+").expect("valid regex"));

/// Whether `line` opens a list item of either kind
pub(crate) fn starts_list_item(line: &str) -> bool {
    NUMBERED_MARKER_RE.is_match(line) || BULLET_MARKER_RE.is_match(line)
}

pub static NUMBERED_LIST: ListConstruct = ListConstruct { numbered: true };
pub static BULLET_LIST: ListConstruct = ListConstruct { numbered: false };

/// Extracts numbered (`1.`) or bulleted (`-`, `+`, `*`) lists
pub struct ListConstruct {
    numbered: bool,
}

impl ListConstruct {
    fn marker_len(&self, line: &str) -> Option<usize> {
        let re = if self.numbered {
            &NUMBERED_MARKER_RE
        } else {
            &BULLET_MARKER_RE
        };
        re.find(line).map(|m| m.end())
    }

    fn other_marker(&self, line: &str) -> bool {
        let re = if self.numbered {
            &BULLET_MARKER_RE
        } else {
            &NUMBERED_MARKER_RE
        };
        re.is_match(line)
    }
}

/// Lines of `text` as (start, end) byte offsets, end excluding the newline
fn lines_from(text: &str, from: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
    let first = if from == 0 || text[..from].ends_with('\n') {
        from
    } else {
        text[from..]
            .find('\n')
            .map(|i| from + i + 1)
            .unwrap_or(text.len())
    };
    let mut at = first;
    std::iter::from_fn(move || {
        if at >= text.len() {
            return None;
        }
        let end = text[at..].find('\n').map(|i| at + i).unwrap_or(text.len());
        let line = (at, end);
        at = end + 1;
        Some(line)
    })
}

impl Construct for ListConstruct {
    fn name(&self) -> &'static str {
        if self.numbered {
            "numbered list"
        } else {
            "bullet list"
        }
    }

    fn next_match(&self, text: &str, from: usize) -> Result<Option<Match>> {
        let mut lines = lines_from(text, from);
        let start = loop {
            let Some((start, end)) = lines.next() else {
                return Ok(None);
            };
            if self.marker_len(&text[start..end]).is_some() {
                break start;
            }
        };

        // (first line, continuation lines) per item
        let mut items: Vec<(String, Vec<&str>)> = Vec::new();
        let mut list_end = start;
        for (line_start, line_end) in lines_from(text, start) {
            let line = &text[line_start..line_end];
            if line.trim().is_empty() {
                break;
            }
            let indented = line.starts_with(' ') || line.starts_with('\t');
            if let Some(len) = self.marker_len(line) {
                items.push((line[len..].to_string(), Vec::new()));
            } else if !indented && (heading_line(line).is_some() || self.other_marker(line)) {
                break;
            } else if let Some((_, rest)) = items.last_mut() {
                rest.push(line);
            }
            list_end = line_end;
        }

        let mut nodes = Vec::with_capacity(items.len());
        for (first, rest) in items {
            nodes.push(parse_blocks(&item_text(&first, &rest))?);
        }
        let node = if self.numbered {
            Node::NumberedList(nodes)
        } else {
            Node::UnorderedList(nodes)
        };
        Ok(Some(Match {
            range: start..list_end,
            node,
        }))
    }
}

/// Join an item's first line with its continuation lines, removing the
/// indentation the continuation lines share.
fn item_text(first: &str, rest: &[&str]) -> String {
    let indent = rest
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    let mut text = first.to_string();
    for line in rest {
        text.push('\n');
        let cut = indent.min(line.len() - line.trim_start().len());
        text.push_str(&line[cut..]);
    }
    text
}
