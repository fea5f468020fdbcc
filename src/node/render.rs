//! LaTeX serialization of the document tree
//!
//! Rendering is a single depth-first pass appending to one `String`.

use super::{DisplayMath, Environment, ExplicitRef, Header, InlineMath, Link, Node};
use crate::labels::{canonicalize, explicit_label};

/// Render a node sequence into a fresh string
pub fn render_to_string(nodes: &[Node]) -> String {
    let mut out = String::new();
    render_nodes(nodes, &mut out);
    out
}

pub fn render_nodes(nodes: &[Node], out: &mut String) {
    for node in nodes {
        node.render(out);
    }
}

impl Node {
    /// Append the LaTeX form of this node to `out`
    pub fn render(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(&escape_text(text)),
            Node::Paragraph(children) => {
                render_nodes(children, out);
                out.push('\n');
            }
            Node::Header(header) => render_header(header, out),
            Node::Environment(env) => render_environment(env, out),
            Node::EmbedLink(link) | Node::PlainLink(link) => render_unresolved_link(link, out),
            Node::Citation(key) => {
                out.push_str("\\cite{");
                out.push_str(key);
                out.push('}');
            }
            Node::MultiCitation(keys) => {
                out.push_str("\\cite{");
                out.push_str(&keys.join(","));
                out.push('}');
            }
            Node::PandocCitation { key, locator } => {
                out.push_str(&format!("\\cite[{}]{{{}}}", locator, key));
            }
            Node::DisplayMath(math) => render_display_math(math, out),
            Node::InlineMath(math) => render_inline_math(math, out),
            Node::DisplayCode { language, code } => {
                out.push_str("\\begin{lstlisting}");
                if let Some(language) = language {
                    out.push_str(&format!("[language={}]", language));
                }
                out.push('\n');
                out.push_str(code);
                if !code.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str("\\end{lstlisting}\n");
            }
            Node::InlineCode(code) => {
                out.push_str("\\texttt{");
                out.push_str(&escape_verbatim(code));
                out.push('}');
            }
            Node::Quote(_) | Node::Comment(_) => {}
            Node::NumberedList(items) => render_list("enumerate", items, out),
            Node::UnorderedList(items) => render_list("itemize", items, out),
            Node::BlankLine => out.push('\n'),
            Node::Reference { label, display } => match display {
                Some(display) => {
                    out.push_str(&format!("\\hyperref[{}]{{{}}}", label, escape_text(display)))
                }
                None => out.push_str(&format!("\\autoref{{{}}}", label)),
            },
            Node::Hyperlink { label, text } => {
                out.push_str(&format!("\\hyperlink{{{}}}{{{}}}", label, escape_text(text)));
            }
            Node::ExplicitRef(reference) => render_explicit_ref(reference, out),
            Node::Emphasis(children) => wrap("\\emph{", children, "}", out),
            Node::Strong(children) => wrap("\\textbf{", children, "}", out),
            Node::DoubleQuote(children) => wrap("``", children, "''", out),
            Node::SingleQuote(children) => wrap("`", children, "'", out),
            Node::Figure { path, caption } => {
                out.push_str("\\begin{figure}[h]\n\\centering\n");
                out.push_str(&format!("\\includegraphics[width=0.8\\textwidth]{{{}}}\n", path));
                if let Some(caption) = caption {
                    out.push_str(&format!("\\caption{{{}}}\n", escape_text(caption)));
                }
                out.push_str("\\end{figure}\n");
            }
            Node::Warning(message) => {
                out.push_str(&format!("\\textbf{{[{}]}}\n", escape_text(message)));
            }
        }
    }
}

fn wrap(open: &str, children: &[Node], close: &str, out: &mut String) {
    out.push_str(open);
    render_nodes(children, out);
    out.push_str(close);
}

/// Sectioning command for a header level
pub fn section_command(level: usize) -> &'static str {
    match level {
        0 | 1 => "section",
        2 => "subsection",
        3 => "subsubsection",
        4 => "paragraph",
        _ => "subparagraph",
    }
}

fn render_header(header: &Header, out: &mut String) {
    out.push('\\');
    out.push_str(section_command(header.level));
    out.push('{');
    render_nodes(&header.title, out);
    out.push('}');
    if let Some(label) = &header.label {
        out.push_str(&format!("\\label{{{}}}", label));
    }
    out.push('\n');
    render_nodes(&header.children, out);
}

fn render_environment(env: &Environment, out: &mut String) {
    out.push_str(&format!("\\begin{{{}}}", env.kind));
    if env.is_proof() {
        if let Some(statement) = &env.proof_of {
            out.push_str(&format!("[Proof of \\autoref{{{}}}]", statement));
        }
        if let Some(label) = &env.label {
            out.push_str(&format!("\\hypertarget{{{}}}{{}}", label));
        }
        out.push('\n');
    } else {
        out.push('\n');
        if let Some(label) = &env.label {
            out.push_str(&format!("\\label{{{}}}\n", label));
        }
    }
    render_nodes(&env.children, out);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&format!("\\end{{{}}}\n", env.kind));
}

fn render_display_math(math: &DisplayMath, out: &mut String) {
    let label = math
        .resolved_label
        .clone()
        .or_else(|| math.label.as_ref().map(|l| format!("eq:{}", canonicalize(l))));
    let environment = match (&math.environment, &label) {
        (Some(name), _) => name.as_str(),
        (None, Some(_)) => "equation",
        (None, None) => "equation*",
    };
    out.push_str(&format!("\\begin{{{}}}", environment));
    if let Some(label) = label {
        out.push_str(&format!("\\label{{{}}}", label));
    }
    out.push('\n');
    out.push_str(math.content.trim());
    out.push_str(&format!("\n\\end{{{}}}\n", environment));
}

fn render_inline_math(math: &InlineMath, out: &mut String) {
    let label = math
        .resolved_label
        .clone()
        .or_else(|| math.label.as_ref().map(|l| format!("eq:{}", canonicalize(l))));
    match label {
        // A label needs an equation counter, so labelled inline math is set on its own line.
        Some(label) => out.push_str(&format!(
            "\n\\begin{{equation}}\\label{{{}}}\n{}\n\\end{{equation}}\n",
            label,
            math.content.trim()
        )),
        None => {
            out.push('$');
            out.push_str(&math.content);
            out.push('$');
        }
    }
}

fn render_list(environment: &str, items: &[Vec<Node>], out: &mut String) {
    out.push_str(&format!("\\begin{{{}}}\n", environment));
    for item in items {
        out.push_str("\\item ");
        render_nodes(item, out);
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }
    out.push_str(&format!("\\end{{{}}}\n", environment));
}

fn render_explicit_ref(reference: &ExplicitRef, out: &mut String) {
    let label = reference.resolved_label.clone().unwrap_or_else(|| {
        explicit_label(
            &format!("{}-{}", reference.kind, reference.identifier),
            "",
            "",
        )
    });
    if reference.kind.eq_ignore_ascii_case("eq") {
        out.push_str(&format!("\\eqref{{{}}}", label));
    } else {
        out.push_str(&format!("\\autoref{{{}}}", label));
    }
}

fn render_unresolved_link(link: &Link, out: &mut String) {
    let text = link.display.as_deref().unwrap_or(link.address.as_str());
    out.push_str(&escape_text(text));
}

/// Escape characters that LaTeX treats specially in running text.
///
/// Characters already preceded by a backslash are left alone so inline LaTeX
/// written by the user passes through.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous = None;
    for c in text.chars() {
        if matches!(c, '&' | '%' | '#' | '_') && previous != Some('\\') {
            out.push('\\');
        }
        out.push(c);
        previous = Some(c);
    }
    out
}

/// Escape every special character, for code set in `\texttt`
pub fn escape_verbatim(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '{' | '}' | '&' | '%' | '#' | '_' | '$' => {
                out.push('\\');
                out.push(c);
            }
            '^' => out.push_str("\\textasciicircum{}"),
            '~' => out.push_str("\\textasciitilde{}"),
            _ => out.push(c),
        }
    }
    out
}
