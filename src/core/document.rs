//! Parsed notes: YAML front matter plus the document tree of the body

use std::collections::BTreeMap;

use serde_json::Value;

use super::storage::NoteId;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::Result;
use crate::node::Node;
use crate::parser::parse_markdown;

/// A note, parsed once per export run and shared through the note cache
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: NoteId,
    /// Front matter fields; empty when the note has none or it is malformed
    pub front_matter: BTreeMap<String, Value>,
    pub body: Vec<Node>,
}

impl Document {
    /// Parse raw note content.
    ///
    /// Malformed front matter is reported and treated as absent; only an
    /// internal parser failure is an error.
    pub fn parse(id: NoteId, content: &str, diagnostics: &dyn Diagnostics) -> Result<Self> {
        let (yaml, body) = split_front_matter(content);
        let front_matter = match yaml.map(parse_front_matter) {
            Some(Ok(fields)) => fields,
            Some(Err(message)) => {
                diagnostics.report(Diagnostic::InvalidFrontMatter {
                    note: id.to_string(),
                    message,
                });
                BTreeMap::new()
            }
            None => BTreeMap::new(),
        };
        let body = parse_markdown(body)?;
        Ok(Self {
            id,
            front_matter,
            body,
        })
    }

    /// Front matter string field
    pub fn field(&self, key: &str) -> Option<&str> {
        self.front_matter
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Document title (front matter title or file name without extension)
    pub fn title(&self) -> String {
        self.field("title")
            .map(str::to_string)
            .unwrap_or_else(|| self.id.stem().to_string())
    }

    /// Authors joined with `\and`; a list or a single string are accepted
    pub fn author(&self) -> Option<String> {
        match self.front_matter.get("author")? {
            Value::String(name) => Some(name.trim().to_string()).filter(|s| !s.is_empty()),
            Value::Array(names) => {
                let names: Vec<&str> = names.iter().filter_map(Value::as_str).collect();
                (!names.is_empty()).then(|| names.join(" \\and "))
            }
            _ => None,
        }
    }

    pub fn bibliography(&self) -> Option<&str> {
        self.field("bibliography")
    }
}

/// Split `---` delimited front matter off the start of `content`.
///
/// Returns the YAML text, if any, and the remaining body.
pub fn split_front_matter(content: &str) -> (Option<&str>, &str) {
    let content = content.trim_start_matches('\u{feff}');
    let Some(first_end) = content.find('\n') else {
        return (None, content);
    };
    if content[..first_end].trim_end() != "---" {
        return (None, content);
    }

    let yaml_start = first_end + 1;
    let mut at = yaml_start;
    while at <= content.len() {
        let line_end = content[at..].find('\n').map(|i| at + i).unwrap_or(content.len());
        let line = content[at..line_end].trim_end();
        if line == "---" || line == "..." {
            let body_start = (line_end + 1).min(content.len());
            return (Some(&content[yaml_start..at]), &content[body_start..]);
        }
        if line_end == content.len() {
            break;
        }
        at = line_end + 1;
    }
    (None, content)
}

/// Parse YAML front matter into JSON values
pub fn parse_front_matter(yaml: &str) -> std::result::Result<BTreeMap<String, Value>, String> {
    if yaml.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let yaml_value: serde_yaml::Value = serde_yaml::from_str(yaml).map_err(|e| e.to_string())?;
    let json_value: Value = serde_json::to_value(yaml_value).map_err(|e| e.to_string())?;

    match json_value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        Value::Null => Ok(BTreeMap::new()),
        _ => Err("front matter is not a mapping".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnostics;

    #[test]
    fn test_parse_front_matter() {
        let content = r#"---
title: "Test Document"
author: [Ada, Grace]
tags: [rust, markdown]
---

# Content here
"#;
        let sink = CollectingDiagnostics::new();
        let doc = Document::parse(NoteId::new("notes/Test.md"), content, &sink).unwrap();
        assert_eq!(doc.title(), "Test Document");
        assert_eq!(doc.author().as_deref(), Some("Ada \\and Grace"));
        assert!(matches!(&doc.body[..], [Node::Header(h)] if h.title_text() == "Content here"));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_title_falls_back_to_stem() {
        let sink = CollectingDiagnostics::new();
        let doc = Document::parse(NoteId::new("My Paper.md"), "body", &sink).unwrap();
        assert_eq!(doc.title(), "My Paper");
        assert!(doc.front_matter.is_empty());
    }

    #[test]
    fn test_invalid_front_matter_is_reported() {
        let sink = CollectingDiagnostics::new();
        let doc = Document::parse(NoteId::new("A.md"), "---\n: [oops\n---\ntext", &sink).unwrap();
        assert!(doc.front_matter.is_empty());
        assert_eq!(doc.body, vec![Node::Paragraph(vec![Node::Text("text".to_string())])]);
        assert!(matches!(
            &sink.diagnostics()[..],
            [Diagnostic::InvalidFrontMatter { .. }]
        ));
    }

    #[test]
    fn test_split_front_matter() {
        assert_eq!(
            split_front_matter("---\na: 1\n---\nbody"),
            (Some("a: 1\n"), "body")
        );
        assert_eq!(split_front_matter("---\nunclosed"), (None, "---\nunclosed"));
        assert_eq!(split_front_matter("no front matter"), (None, "no front matter"));
        assert_eq!(split_front_matter("\u{feff}---\n---\n"), (Some(""), ""));
    }
}
