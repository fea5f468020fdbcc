//! Document assembler and export entry point

pub mod template;

use std::collections::BTreeSet;

use crate::core::config::ExportConfig;
use crate::core::storage::{NoteId, Storage};
use crate::diagnostics::Diagnostics;
use crate::error::{ExportError, Result};
use crate::node::{for_each_header_mut, render_to_string, Node};
use crate::unroll::{UnrollContext, Unroller};

pub use template::{DocumentMeta, Sections};

/// What to produce from the exported note
#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    /// Address of the note, resolved through [`Storage::find`]
    pub address: String,
    /// Template text with `$key$` placeholders
    pub template: Option<String>,
    /// Return only the rendered body
    pub fragment: bool,
}

/// Result of one export run
#[derive(Debug, Clone)]
pub struct Export {
    pub source: NoteId,
    pub sections: Sections,
    /// Assembled document, or the body alone in fragment mode
    pub latex: String,
    pub citations: Vec<String>,
    pub media: Vec<NoteId>,
}

impl Export {
    /// Where the `.tex` file goes inside the storage
    pub fn output_id(&self, config: &ExportConfig) -> NoteId {
        let folder = config.output_folder.trim_matches('/');
        if folder.is_empty() {
            NoteId::new(format!("{}.tex", self.source.stem()))
        } else {
            NoteId::new(format!("{}/{}.tex", folder, self.source.stem()))
        }
    }
}

/// Top-level sections of the exported note
#[derive(Debug, Default, PartialEq)]
struct SplitSections {
    abstract_nodes: Vec<Node>,
    body: Vec<Node>,
    appendix: Vec<Node>,
}

/// Header titles compared without case or whitespace
fn section_key(title: &str) -> String {
    title
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// Pull the first top-level "abstract", "body" and "appendix" headers out.
///
/// The content of a "body" header takes its place, one level shallower.
fn split_sections(nodes: Vec<Node>) -> SplitSections {
    let mut sections = SplitSections::default();
    let (mut seen_abstract, mut seen_body, mut seen_appendix) = (false, false, false);
    for node in nodes {
        let key = match &node {
            Node::Header(header) => section_key(&header.title_text()),
            _ => String::new(),
        };
        match (node, key.as_str()) {
            (Node::Header(header), "abstract") if !seen_abstract => {
                seen_abstract = true;
                sections.abstract_nodes = header.children;
            }
            (Node::Header(header), "appendix") if !seen_appendix => {
                seen_appendix = true;
                sections.appendix = header.children;
            }
            (Node::Header(header), "body") if !seen_body => {
                seen_body = true;
                let mut children = header.children;
                for_each_header_mut(&mut children, &mut |h| {
                    h.level = h.level.saturating_sub(1).max(1);
                });
                sections.body.extend(children);
            }
            (node, _) => sections.body.push(node),
        }
    }
    sections
}

fn collect_environments(nodes: &[Node], kinds: &mut BTreeSet<String>) {
    for node in nodes {
        match node {
            Node::Environment(env) => {
                kinds.insert(env.kind.clone());
                collect_environments(&env.children, kinds);
            }
            Node::Header(header) => collect_environments(&header.children, kinds),
            Node::NumberedList(items) | Node::UnorderedList(items) => {
                for item in items {
                    collect_environments(item, kinds);
                }
            }
            _ => {}
        }
    }
}

/// Export one note and everything it embeds.
///
/// Content problems are reported to `diagnostics` and never fail the export;
/// a missing root note, storage failures and internal invariant violations
/// do.
pub async fn export_note(
    storage: &dyn Storage,
    diagnostics: &dyn Diagnostics,
    config: &ExportConfig,
    request: &ExportRequest,
) -> Result<Export> {
    let id = storage
        .find(&request.address, diagnostics)
        .ok_or_else(|| ExportError::NotFound(request.address.clone()))?;
    tracing::info!("Exporting {}", id);

    let unroller = Unroller::new(storage, diagnostics, config);
    let doc = unroller.load(&id).await?;
    let root = id.stem().to_string();
    let parts = split_sections(doc.body.clone());

    let mut environments = BTreeSet::new();
    let mut rendered = Vec::with_capacity(3);
    for nodes in [parts.abstract_nodes, parts.body, parts.appendix] {
        let mut ctx = UnrollContext::for_root(&root);
        let nodes = unroller.unroll(nodes, &mut ctx).await?;
        collect_environments(&nodes, &mut environments);
        rendered.push(render_to_string(&nodes));
    }
    let mut rendered = rendered.into_iter();
    let sections = Sections {
        abstract_text: rendered.next().unwrap_or_default(),
        body: rendered.next().unwrap_or_default(),
        appendix: rendered.next().unwrap_or_default(),
    };

    let citations = unroller.citations();
    let bibliography = if citations.is_empty() {
        None
    } else {
        doc.bibliography()
            .map(str::to_string)
            .or_else(|| config.bibliography_file.clone())
    };
    if !citations.is_empty() && bibliography.is_none() {
        tracing::warn!("{} citation keys used but no bibliography configured", citations.len());
    }

    let meta = DocumentMeta {
        title: doc.title(),
        author: doc.author(),
        document_class: config.document_class.clone(),
        preamble: config.preamble_file.clone(),
        bibliography,
        environments,
    };
    let latex = if request.fragment {
        sections.body.clone()
    } else if let Some(text) = &request.template {
        template::substitute(text, &template::template_values(&meta, &sections))
    } else {
        template::default_document(&meta, &sections)
    };

    tracing::info!(
        "Exported {} ({} notes, {} citations)",
        id,
        unroller.cached_notes(),
        citations.len()
    );
    Ok(Export {
        source: id,
        sections,
        latex,
        citations,
        media: unroller.media(),
    })
}

/// Write an export into the storage's output folder
pub async fn write_export(
    storage: &dyn Storage,
    config: &ExportConfig,
    export: &Export,
) -> Result<NoteId> {
    let target = export.output_id(config);
    storage.write(&target, &export.latex).await?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::MemoryStorage;
    use crate::diagnostics::CollectingDiagnostics;
    use crate::node::Header;

    const PAPER: &str = "---\ntitle: On Things\nauthor: Ada\nbibliography: refs.bib\n---\n\
# Abstract\nWe prove things.\n\
# Body\n## Introduction\nSee [@knuth].\n\nlemma::![[B]]\n\
# Appendix\n## Extra\nMore.\n";

    fn storage() -> MemoryStorage {
        MemoryStorage::new()
            .with_note("Paper.md", PAPER)
            .with_note("notes/B.md", "Content of B")
    }

    fn request(fragment: bool) -> ExportRequest {
        ExportRequest {
            address: "Paper".to_string(),
            template: None,
            fragment,
        }
    }

    #[test]
    fn test_split_sections() {
        let mut body = Header::new(1, "Body");
        body.children.push(Node::Header(Header::new(2, "Intro")));
        let nodes = vec![
            Node::Header(Header::new(1, "Abstract")),
            Node::Header(body),
            Node::Header(Header::new(1, "Appendix")),
        ];
        let sections = split_sections(nodes);
        assert!(sections.abstract_nodes.is_empty());
        assert!(sections.appendix.is_empty());
        assert!(matches!(&sections.body[..], [Node::Header(h)] if h.level == 1));
    }

    #[tokio::test]
    async fn test_export_document() {
        let storage = storage();
        let sink = CollectingDiagnostics::new();
        let config = ExportConfig::default();
        let export = export_note(&storage, &sink, &config, &request(false))
            .await
            .unwrap();

        assert!(sink.is_empty());
        assert_eq!(export.source, NoteId::new("Paper.md"));
        assert!(export.sections.abstract_text.contains("We prove things."));
        assert!(export
            .sections
            .body
            .starts_with("\\section{Introduction}\\label{sec:introduction}\n"));
        assert!(export
            .sections
            .body
            .contains("\\begin{lemma}\n\\label{res:b.statement}\nContent of B\n\\end{lemma}\n"));
        assert!(export
            .sections
            .appendix
            .starts_with("\\subsection{Extra}\\label{sec:extra}"));
        assert!(export.latex.contains("\\title{On Things}"));
        assert!(export.latex.contains("\\newtheorem{lemma}{Lemma}"));
        assert!(export.latex.contains("\\bibliography{refs}"));
        assert_eq!(export.citations, vec!["knuth"]);

        let target = write_export(&storage, &config, &export).await.unwrap();
        assert_eq!(target, NoteId::new("output/Paper.tex"));
        assert_eq!(storage.get("output/Paper.tex"), Some(export.latex.clone()));
    }

    #[tokio::test]
    async fn test_fragment_and_template() {
        let storage = storage();
        let sink = CollectingDiagnostics::new();
        let config = ExportConfig::default();

        let fragment = export_note(&storage, &sink, &config, &request(true))
            .await
            .unwrap();
        assert_eq!(fragment.latex, fragment.sections.body);

        let templated = ExportRequest {
            template: Some("% $title$\n$abstract$".to_string()),
            ..request(false)
        };
        let export = export_note(&storage, &sink, &config, &templated).await.unwrap();
        assert_eq!(export.latex, "% On Things\nWe prove things.\n");
    }

    #[tokio::test]
    async fn test_paragraph_breaks_survive_block_constructs() {
        let storage = MemoryStorage::new()
            .with_note(
                "Paper.md",
                "First para.\n\n![[B]]\n\nSecond para.\n\n> quote\n\nThird para.",
            )
            .with_note("B.md", "Content of B");
        let sink = CollectingDiagnostics::new();
        let export = export_note(&storage, &sink, &ExportConfig::default(), &request(true))
            .await
            .unwrap();
        assert!(export
            .latex
            .starts_with("First para.\n\nContent of B\n\nSecond para.\n\n"));
        assert!(export.latex.ends_with("\n\nThird para.\n"));
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let storage = MemoryStorage::new();
        let sink = CollectingDiagnostics::new();
        let result = export_note(
            &storage,
            &sink,
            &ExportConfig::default(),
            &ExportRequest {
                address: "Nope".to_string(),
                ..ExportRequest::default()
            },
        )
        .await;
        assert!(matches!(result, Err(ExportError::NotFound(_))));
    }
}
