//! Markdown dialect parser
//!
//! Raw text goes through the block pipeline, the heading-tree builder and
//! finally the inline pipeline.

pub mod blocks;
pub mod headings;
pub mod inline;
pub mod lists;
pub mod split;

use crate::error::Result;
use crate::node::Node;

/// Block structure of `text`, nested under its headings; inline content is
/// left unsplit.
pub fn parse_body(text: &str) -> Result<Vec<Node>> {
    Ok(headings::build_tree(blocks::parse_blocks(text)?))
}

/// Fully parsed tree of a note body
pub fn parse_markdown(text: &str) -> Result<Vec<Node>> {
    inline::split_inline_tree(parse_body(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Environment;

    #[test]
    fn test_environment_body_is_parsed() {
        let nodes = parse_markdown("proof::\nBy *induction*.\n::proof").unwrap();
        assert_eq!(
            nodes,
            vec![Node::Environment(Environment::new(
                "proof",
                vec![Node::Paragraph(vec![
                    Node::Text("By ".to_string()),
                    Node::Emphasis(vec![Node::Text("induction".to_string())]),
                    Node::Text(".".to_string()),
                ])]
            ))]
        );
    }

    #[test]
    fn test_headings_inside_environment() {
        let nodes = parse_markdown("theorem::\n## Claim\ntext\n::theorem").unwrap();
        match &nodes[..] {
            [Node::Environment(env)] => {
                assert!(matches!(&env.children[..], [Node::Header(h)] if h.level == 2));
            }
            other => panic!("unexpected nodes {:?}", other),
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_markdown("").unwrap().is_empty());
        assert!(parse_markdown("\n \n").unwrap().is_empty());
    }
}
