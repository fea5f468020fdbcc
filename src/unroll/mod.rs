//! Cross-note expansion
//!
//! The unroll pass rewrites a parsed tree into its final form: embeds are
//! replaced by the content they point at, links become references and
//! citations, headers are renumbered and every labelled node gets its final
//! label. Notes are fetched from [`Storage`] one at a time and parsed at most
//! once per run.
//!
//! Problems in note content never fail the pass. They are reported to the
//! [`Diagnostics`] sink and leave a [`Node::Warning`] in the tree.

mod context;

pub use context::{HeaderEntry, UnrollContext};

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use crate::core::config::ExportConfig;
use crate::core::document::Document;
use crate::core::storage::{is_image_address, NoteId, Storage};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::Result;
use crate::labels::{
    anchor_path, canonicalize, explicit_label, label_from_location, note_address, same_note, PROOF,
};
use crate::node::{Environment, Header, Link, Node};
use crate::parser::inline::split_display_text;

type UnrollFuture<'f> = Pin<Box<dyn Future<Output = Result<Vec<Node>>> + Send + 'f>>;

/// Side channels filled while unrolling
#[derive(Debug, Default)]
struct RunState {
    citations: BTreeSet<String>,
    media: BTreeSet<NoteId>,
    anonymous: usize,
}

/// Run-scoped unroll engine: storage access, note cache and side channels
pub struct Unroller<'a> {
    storage: &'a dyn Storage,
    diagnostics: &'a dyn Diagnostics,
    media_folder: String,
    max_depth: usize,
    cache: Mutex<HashMap<NoteId, Arc<Document>>>,
    state: Mutex<RunState>,
}

impl<'a> Unroller<'a> {
    pub fn new(
        storage: &'a dyn Storage,
        diagnostics: &'a dyn Diagnostics,
        config: &ExportConfig,
    ) -> Self {
        Self {
            storage,
            diagnostics,
            media_folder: config.media_folder.trim_end_matches('/').to_string(),
            max_depth: config.max_embed_depth,
            cache: Mutex::new(HashMap::new()),
            state: Mutex::new(RunState::default()),
        }
    }

    pub fn diagnostics(&self) -> &'a dyn Diagnostics {
        self.diagnostics
    }

    /// Parsed note, read and parsed on first use
    pub async fn load(&self, id: &NoteId) -> Result<Arc<Document>> {
        if let Some(doc) = self.cached(id) {
            return Ok(doc);
        }
        tracing::debug!("Loading note {}", id);
        let content = self.storage.read(id).await?;
        let doc = Arc::new(Document::parse(id.clone(), &content, self.diagnostics)?);
        if let Ok(mut cache) = self.cache.lock() {
            cache.entry(id.clone()).or_insert_with(|| doc.clone());
        }
        Ok(doc)
    }

    fn cached(&self, id: &NoteId) -> Option<Arc<Document>> {
        self.cache.lock().ok()?.get(id).cloned()
    }

    /// Number of distinct notes parsed so far
    pub fn cached_notes(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    /// Citation keys used so far, sorted
    pub fn citations(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|state| state.citations.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Media files referenced so far, sorted
    pub fn media(&self) -> Vec<NoteId> {
        self.state
            .lock()
            .map(|state| state.media.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn cite<'k>(&self, keys: impl IntoIterator<Item = &'k String>) {
        if let Ok(mut state) = self.state.lock() {
            state.citations.extend(keys.into_iter().cloned());
        }
    }

    fn next_anonymous(&self) -> usize {
        self.state
            .lock()
            .map(|mut state| {
                state.anonymous += 1;
                state.anonymous
            })
            .unwrap_or(0)
    }

    fn warn(&self, diagnostic: Diagnostic) -> Vec<Node> {
        let message = diagnostic.to_string();
        self.diagnostics.report(diagnostic);
        vec![Node::Warning(message)]
    }

    /// Unroll a node sequence in order; siblings share `ctx`
    pub fn unroll<'f>(&'f self, nodes: Vec<Node>, ctx: &'f mut UnrollContext) -> UnrollFuture<'f> {
        Box::pin(async move {
            let mut out = Vec::with_capacity(nodes.len());
            for node in nodes {
                out.extend(self.unroll_node(node, &mut *ctx).await?);
            }
            Ok(out)
        })
    }

    fn unroll_node<'f>(&'f self, node: Node, ctx: &'f mut UnrollContext) -> UnrollFuture<'f> {
        Box::pin(async move {
            let node = match node {
                Node::Paragraph(children) => Node::Paragraph(self.unroll(children, ctx).await?),
                Node::Emphasis(children) => Node::Emphasis(self.unroll(children, ctx).await?),
                Node::Strong(children) => Node::Strong(self.unroll(children, ctx).await?),
                Node::DoubleQuote(children) => Node::DoubleQuote(self.unroll(children, ctx).await?),
                Node::SingleQuote(children) => Node::SingleQuote(self.unroll(children, ctx).await?),
                Node::NumberedList(items) => Node::NumberedList(self.unroll_items(items, ctx).await?),
                Node::UnorderedList(items) => {
                    Node::UnorderedList(self.unroll_items(items, ctx).await?)
                }
                Node::Header(header) => return self.unroll_header(header, ctx).await,
                Node::Environment(env) => Node::Environment(self.unroll_environment(env, ctx).await?),
                Node::EmbedLink(link) => return self.unroll_embed(link, ctx).await,
                Node::PlainLink(link) => self.resolve_link(link, ctx),
                Node::Citation(key) => {
                    self.cite([&key]);
                    Node::Citation(key)
                }
                Node::MultiCitation(keys) => {
                    self.cite(&keys);
                    Node::MultiCitation(keys)
                }
                Node::PandocCitation { key, locator } => {
                    self.cite([&key]);
                    Node::PandocCitation { key, locator }
                }
                Node::DisplayMath(mut math) => {
                    math.resolved_label = math.label.as_ref().map(|label| {
                        explicit_label(&format!("eq-{}", label), &ctx.current, &ctx.root)
                    });
                    Node::DisplayMath(math)
                }
                Node::InlineMath(mut math) => {
                    math.resolved_label = math.label.as_ref().map(|label| {
                        explicit_label(&format!("eq-{}", label), &ctx.current, &ctx.root)
                    });
                    Node::InlineMath(math)
                }
                Node::ExplicitRef(mut reference) => {
                    reference.resolved_label = Some(explicit_label(
                        &format!("{}-{}", reference.kind, reference.identifier),
                        &ctx.current,
                        &ctx.root,
                    ));
                    Node::ExplicitRef(reference)
                }
                other => other,
            };
            Ok(vec![node])
        })
    }

    async fn unroll_items(
        &self,
        items: Vec<Vec<Node>>,
        ctx: &mut UnrollContext,
    ) -> Result<Vec<Vec<Node>>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let mut item_ctx = ctx.clone();
            out.push(self.unroll(item, &mut item_ctx).await?);
        }
        Ok(out)
    }

    async fn unroll_header(&self, mut header: Header, ctx: &mut UnrollContext) -> Result<Vec<Node>> {
        if ctx.in_environment {
            // Run-in title instead of a numbered section
            let mut child = ctx.clone();
            let title = self.unroll(header.title, &mut child).await?;
            let mut out = vec![Node::Paragraph(vec![Node::Emphasis(title)])];
            out.extend(self.unroll(header.children, &mut child).await?);
            return Ok(out);
        }

        let level = (header.level as isize + ctx.heading_offset).max(1) as usize;
        header.level = level;
        header.ancestors = Some(ctx.push_header(level, header.title_text()));
        header.label = Some(match &header.explicit_label {
            Some(label) => explicit_label(label, &ctx.current, &ctx.root),
            None => ctx.location_label(),
        });

        let mut child = ctx.clone();
        header.title = self.unroll(header.title, &mut child).await?;
        header.children = self.unroll(header.children, &mut child).await?;
        Ok(vec![Node::Header(header)])
    }

    async fn unroll_environment(
        &self,
        mut env: Environment,
        ctx: &mut UnrollContext,
    ) -> Result<Environment> {
        if env.is_proof() {
            env.label = Some(match &env.explicit_label {
                Some(label) => explicit_label(label, &ctx.current, &ctx.root),
                None => label_from_location(&ctx.current, PROOF),
            });
            env.proof_of = Some(label_from_location(&ctx.current, ""));
        } else {
            env.label = Some(match &env.explicit_label {
                Some(label) => explicit_label(label, &ctx.current, &ctx.root),
                None => format!(
                    "{}.{}{}",
                    ctx.location_label(),
                    canonicalize(&env.kind),
                    self.next_anonymous()
                ),
            });
        }
        let mut child = ctx.clone();
        child.in_environment = true;
        env.children = self.unroll(env.children, &mut child).await?;
        Ok(env)
    }

    /// Address used in labels: empty for the root note
    fn label_address(&self, address: &str, ctx: &UnrollContext) -> String {
        let address = note_address(address);
        if address.is_empty() || same_note(address, &ctx.root) {
            String::new()
        } else {
            address.to_string()
        }
    }

    /// Links resolve locally, without reading the target
    fn resolve_link(&self, link: Link, ctx: &UnrollContext) -> Node {
        let target = link.address.trim();
        if let Some(key) = target.strip_prefix('@') {
            let key = key.trim().to_string();
            self.cite([&key]);
            return Node::Citation(key);
        }
        let address = if target.is_empty() {
            ctx.current.clone()
        } else {
            self.label_address(target, ctx)
        };
        let anchor = link.header.as_deref().unwrap_or("");
        let last = anchor.rsplit('#').next().unwrap_or("").trim();
        if last.eq_ignore_ascii_case(PROOF) {
            return Node::Hyperlink {
                label: label_from_location(&address, PROOF),
                text: link.display.unwrap_or_else(|| PROOF.to_string()),
            };
        }
        Node::Reference {
            label: label_from_location(&address, &anchor_path(anchor)),
            display: link.display,
        }
    }

    async fn unroll_embed(&self, link: Link, ctx: &mut UnrollContext) -> Result<Vec<Node>> {
        if let Some(display) = link.display {
            return Ok(vec![Node::Paragraph(split_display_text(&display)?)]);
        }
        if is_image_address(&link.address) {
            return Ok(self.embed_image(&link));
        }

        // `![[#Section]]` embeds from the note being unrolled
        let target = match link.address.trim() {
            "" if ctx.current.is_empty() => ctx.root.clone(),
            "" => ctx.current.clone(),
            address => address.to_string(),
        };
        let Some(id) = self.storage.find(&target, self.diagnostics) else {
            return Ok(self.warn(Diagnostic::MissingNote { address: target }));
        };
        if ctx.depth >= self.max_depth {
            return Ok(self.warn(Diagnostic::DepthExceeded {
                address: target,
                depth: self.max_depth,
            }));
        }

        let doc = self.load(&id).await?;
        let address = self.label_address(id.stem(), ctx);
        let anchor = link.header.as_deref().map(str::trim).filter(|a| !a.is_empty());

        let (nodes, prefix, top_level) = match anchor {
            Some(anchor) => match find_section(&doc.body, anchor) {
                Some((header, ancestors)) => {
                    let level = header.level;
                    (vec![Node::Header(header)], ancestors, level)
                }
                None => {
                    return Ok(self.warn(Diagnostic::MissingHeader {
                        address: target,
                        header: anchor.to_string(),
                    }))
                }
            },
            None => (doc.body.clone(), Vec::new(), top_header_level(&doc.body)),
        };

        let label = label_from_location(&address, &anchor.map(anchor_path).unwrap_or_default());
        if ctx.guard.contains(&label) {
            return Ok(self.warn(Diagnostic::EmbedCycle { label }));
        }

        let mut child = ctx.enter_note(&address, label.clone(), prefix);
        child.heading_offset = ctx.insertion_level() as isize + 1 - top_level as isize;
        if link.attribute.is_some() {
            child.in_environment = true;
        }
        let children = self.unroll(nodes, &mut child).await?;

        Ok(match link.attribute {
            Some(kind) => {
                let mut env = Environment::new(kind, children);
                if env.is_proof() {
                    env.label = Some(label_from_location(&address, PROOF));
                    env.proof_of = Some(label_from_location(&address, ""));
                } else {
                    env.label = Some(label);
                }
                vec![Node::Environment(env)]
            }
            None => children,
        })
    }

    fn embed_image(&self, link: &Link) -> Vec<Node> {
        let Some(id) = self.storage.find(&link.address, self.diagnostics) else {
            return self.warn(Diagnostic::MissingNote {
                address: link.address.clone(),
            });
        };
        let path = if self.media_folder.is_empty() {
            id.file_name().to_string()
        } else {
            format!("{}/{}", self.media_folder, id.file_name())
        };
        if let Ok(mut state) = self.state.lock() {
            state.media.insert(id);
        }
        vec![Node::Figure {
            path,
            caption: None,
        }]
    }
}

/// Level of the shallowest top-level header, 1 when there is none
fn top_header_level(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .filter_map(|node| match node {
            Node::Header(header) => Some(header.level),
            _ => None,
        })
        .min()
        .unwrap_or(1)
}

/// First header in pre-order matching a `#`-separated anchor.
///
/// The last segment must equal the header title; earlier segments must be
/// titles of its ancestors. Returns the header and its ancestor titles.
fn find_section(nodes: &[Node], anchor: &str) -> Option<(Header, Vec<String>)> {
    let segments: Vec<String> = anchor
        .split('#')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    let (last, required) = segments.split_last()?;
    let mut ancestors = Vec::new();
    search_headers(nodes, last, required, &mut ancestors)
}

fn search_headers(
    nodes: &[Node],
    title: &str,
    required: &[String],
    ancestors: &mut Vec<String>,
) -> Option<(Header, Vec<String>)> {
    for node in nodes {
        let (header, children) = match node {
            Node::Header(header) => (Some(header), &header.children),
            Node::Environment(env) => (None, &env.children),
            _ => continue,
        };
        if let Some(header) = header {
            let text = header.title_text();
            if text.to_lowercase() == title && in_order(required, ancestors) {
                return Some((header.clone(), ancestors.clone()));
            }
            ancestors.push(text);
            let found = search_headers(children, title, required, ancestors);
            ancestors.pop();
            if found.is_some() {
                return found;
            }
        } else if let Some(found) = search_headers(children, title, required, ancestors) {
            return Some(found);
        }
    }
    None
}

/// Whether `required` appears in `ancestors` in the same order, gaps allowed
fn in_order(required: &[String], ancestors: &[String]) -> bool {
    let mut ancestors = ancestors.iter().map(|a| a.to_lowercase());
    required
        .iter()
        .all(|segment| ancestors.any(|a| a == *segment))
}
