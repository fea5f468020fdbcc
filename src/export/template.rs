//! Final document assembly: default boilerplate or `$key$` templates

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex_lite::{Captures, Regex};

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)\$").expect("valid regex"));

/// Environments LaTeX or amsthm already define
const BUILTIN_ENVIRONMENTS: [&str; 12] = [
    "proof", "equation", "align", "gather", "multline", "itemize", "enumerate", "figure",
    "quote", "center", "table", "tabular",
];

/// Rendered sections of the exported note
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sections {
    pub abstract_text: String,
    pub body: String,
    pub appendix: String,
}

/// Everything the boilerplate needs besides the sections
#[derive(Debug, Clone, Default)]
pub struct DocumentMeta {
    pub title: String,
    pub author: Option<String>,
    pub document_class: String,
    pub preamble: Option<String>,
    /// Bibliography database, set only when citations were used
    pub bibliography: Option<String>,
    /// Environment types used in the sections
    pub environments: BTreeSet<String>,
}

/// `\bibliographystyle` and `\bibliography` lines
pub fn bibliography_directive(database: &str) -> String {
    let database = database.trim().trim_end_matches(".bib");
    format!("\\bibliographystyle{{plain}}\n\\bibliography{{{}}}\n", database)
}

/// `\newtheorem` for every environment type LaTeX does not know
pub fn theorem_declarations(environments: &BTreeSet<String>) -> String {
    let mut out = String::new();
    for kind in environments {
        if BUILTIN_ENVIRONMENTS.contains(&kind.to_lowercase().as_str()) {
            continue;
        }
        let mut chars = kind.chars();
        let name: String = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => continue,
        };
        out.push_str(&format!("\\newtheorem{{{}}}{{{}}}\n", kind, name));
    }
    out
}

/// Complete document with the default boilerplate
pub fn default_document(meta: &DocumentMeta, sections: &Sections) -> String {
    let mut out = String::new();
    out.push_str(&format!("\\documentclass{{{}}}\n", meta.document_class));
    out.push_str("\\usepackage{amsmath,amssymb,amsthm}\n");
    out.push_str("\\usepackage{graphicx}\n");
    out.push_str("\\usepackage{listings}\n");
    out.push_str("\\usepackage{hyperref}\n");
    out.push_str(&theorem_declarations(&meta.environments));
    if let Some(preamble) = &meta.preamble {
        out.push_str(&format!("\\input{{{}}}\n", preamble));
    }
    out.push('\n');
    out.push_str(&format!("\\title{{{}}}\n", meta.title));
    if let Some(author) = &meta.author {
        out.push_str(&format!("\\author{{{}}}\n", author));
    }
    out.push_str("\n\\begin{document}\n\\maketitle\n\n");
    if !sections.abstract_text.trim().is_empty() {
        out.push_str("\\begin{abstract}\n");
        out.push_str(sections.abstract_text.trim_end());
        out.push_str("\n\\end{abstract}\n\n");
    }
    out.push_str(&sections.body);
    if !sections.appendix.trim().is_empty() {
        out.push_str("\n\\appendix\n");
        out.push_str(&sections.appendix);
    }
    if let Some(database) = &meta.bibliography {
        out.push('\n');
        out.push_str(&bibliography_directive(database));
    }
    out.push_str("\n\\end{document}\n");
    out
}

/// Placeholder values offered to templates
pub fn template_values(meta: &DocumentMeta, sections: &Sections) -> BTreeMap<&'static str, String> {
    let mut values = BTreeMap::new();
    values.insert("title", meta.title.clone());
    values.insert("author", meta.author.clone().unwrap_or_default());
    values.insert("documentclass", meta.document_class.clone());
    values.insert(
        "preamble",
        meta.preamble
            .as_ref()
            .map(|p| format!("\\input{{{}}}", p))
            .unwrap_or_default(),
    );
    values.insert("theorems", theorem_declarations(&meta.environments));
    values.insert("abstract", sections.abstract_text.clone());
    values.insert("body", sections.body.clone());
    values.insert("appendix", sections.appendix.clone());
    values.insert(
        "bibliography",
        meta.bibliography
            .as_deref()
            .map(bibliography_directive)
            .unwrap_or_default(),
    );
    values
}

/// Replace `$key$` tokens verbatim; unknown keys are left untouched
pub fn substitute(template: &str, values: &BTreeMap<&str, String>) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures<'_>| {
            let key = caps.get(1).map_or("", |m| m.as_str());
            match values.get(key) {
                Some(value) => value.clone(),
                None => caps.get(0).map_or(String::new(), |m| m.as_str().to_string()),
            }
        })
        .into_owned()
}
