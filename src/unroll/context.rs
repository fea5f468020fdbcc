//! Per-branch unroll state
//!
//! An [`UnrollContext`] is cloned whenever the unroll pass descends into a
//! header or an embedded note, so sibling branches never observe each other's
//! header stacks.

use crate::labels::{header_path, label_from_location};

/// One open header on the ancestor chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEntry {
    /// Level after the heading offset was applied
    pub level: usize,
    pub title: String,
    /// Address of the note the header comes from; empty for the root note
    pub origin: String,
}

#[derive(Debug, Clone, Default)]
pub struct UnrollContext {
    /// Number of embeds on the current path
    pub depth: usize,
    /// Labels of the embeds on the current path
    pub guard: Vec<String>,
    /// Added to the level of every header unrolled in this branch
    pub heading_offset: isize,
    /// Inside a theorem-like environment headers turn into run-in titles
    pub in_environment: bool,
    /// Name of the exported note
    pub root: String,
    /// Address of the note being unrolled; empty for the root note
    pub current: String,
    pub header_stack: Vec<HeaderEntry>,
    /// Ancestor titles of an embedded section inside its own note
    pub path_prefix: Vec<String>,
}

impl UnrollContext {
    /// Fresh context for a section of the root note
    pub fn for_root(root: &str) -> Self {
        Self {
            guard: vec![label_from_location("", "")],
            root: root.to_string(),
            ..Self::default()
        }
    }

    /// Level of the innermost open header, 0 at top level
    pub fn insertion_level(&self) -> usize {
        self.header_stack.last().map_or(0, |entry| entry.level)
    }

    /// Close every header at `level` or deeper, then open a new one.
    ///
    /// Returns the resulting ancestor chain.
    pub fn push_header(&mut self, level: usize, title: String) -> Vec<HeaderEntry> {
        if let Some(cut) = self.header_stack.iter().position(|e| e.level >= level) {
            self.header_stack.truncate(cut);
        }
        self.header_stack.push(HeaderEntry {
            level,
            title,
            origin: self.current.clone(),
        });
        self.header_stack.clone()
    }

    /// Dotted path of the open headers that belong to the current note
    pub fn header_path(&self) -> String {
        let titles: Vec<&str> = self
            .path_prefix
            .iter()
            .map(String::as_str)
            .chain(
                self.header_stack
                    .iter()
                    .filter(|e| e.origin == self.current)
                    .map(|e| e.title.as_str()),
            )
            .collect();
        header_path(&titles)
    }

    /// Label of the current position
    pub fn location_label(&self) -> String {
        label_from_location(&self.current, &self.header_path())
    }

    /// Context for content embedded from another note
    pub fn enter_note(&self, address: &str, label: String, prefix: Vec<String>) -> Self {
        let mut guard = self.guard.clone();
        guard.push(label);
        Self {
            depth: self.depth + 1,
            guard,
            heading_offset: self.heading_offset,
            in_environment: self.in_environment,
            root: self.root.clone(),
            current: address.to_string(),
            header_stack: self.header_stack.clone(),
            path_prefix: prefix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sibling_truncates_stack() {
        let mut ctx = UnrollContext::for_root("Paper");
        ctx.push_header(1, "H1".to_string());
        ctx.push_header(2, "Sub".to_string());
        let snapshot = ctx.push_header(1, "H2".to_string());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].title, "H2");
    }

    #[test]
    fn test_header_path_filters_foreign_headers() {
        let mut ctx = UnrollContext::for_root("Paper");
        ctx.push_header(1, "Intro".to_string());
        let mut inner = ctx.enter_note("B", "res:b.statement".to_string(), vec!["Part".to_string()]);
        inner.push_header(2, "Setup".to_string());
        assert_eq!(inner.header_path(), "part.setup");
        assert_eq!(inner.location_label(), "res:b.part.setup");
        assert_eq!(ctx.location_label(), "sec:intro");
        assert_eq!(inner.insertion_level(), 2);
        assert_eq!(inner.depth, 1);
    }
}
