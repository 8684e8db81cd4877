// crates/store/src/aiml.rs
//! AIML document loading.
//!
//! Documents parse with the same lenient reader templates use, so
//! comments, CDATA, stray whitespace, and mild malformation are all
//! tolerated. Both topic forms are accepted: an inner `<topic>` element
//! inside a category, and the `<topic name="…">` wrapper block. A file
//! that yields no categories at all is a `LoadError`.

use std::path::Path;

use parlance_core::{parse_template, Category, KnowledgeBase, Node};
use tracing::warn;

use crate::error::LoadError;

/// Load an AIML document from a file into the knowledge base. Returns
/// the number of categories added.
pub fn load_aiml_file(kb: &mut KnowledgeBase, path: &Path) -> Result<usize, LoadError> {
    let source = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    load_aiml_str(kb, &source).ok_or(LoadError::NoCategories {
        path: path.to_path_buf(),
    })
}

/// Load an AIML document from a string. Returns `None` when no category
/// could be extracted (the caller decides whether that is an error).
pub fn load_aiml_str(kb: &mut KnowledgeBase, source: &str) -> Option<usize> {
    let nodes = parse_template(source);
    let body = nodes
        .iter()
        .find(|n| n.name() == Some("aiml"))
        .map(Node::children)
        .unwrap_or(&nodes);

    let mut added = 0;
    collect_categories(kb, body, "", &mut added);
    (added > 0).then_some(added)
}

fn collect_categories(kb: &mut KnowledgeBase, nodes: &[Node], topic: &str, added: &mut usize) {
    for node in nodes {
        match node.name() {
            Some("category") => {
                if let Some(category) = category_from_nodes(node.children(), topic) {
                    kb.add_category(category);
                    *added += 1;
                }
            }
            // `<topic name="…">` wrapper block scopes its categories.
            Some("topic") => {
                let name = node.attr("name").unwrap_or("");
                collect_categories(kb, node.children(), name, added);
            }
            _ => {}
        }
    }
}

fn category_from_nodes(children: &[Node], default_topic: &str) -> Option<Category> {
    let mut pattern = None;
    let mut that = String::new();
    let mut topic = default_topic.to_string();
    let mut template = Vec::new();

    for child in children {
        match child.name() {
            Some("pattern") => pattern = Some(element_text(child.children())),
            Some("that") => that = element_text(child.children()),
            Some("topic") => topic = element_text(child.children()),
            Some("template") => template = child.children().to_vec(),
            _ => {}
        }
    }

    let pattern = pattern?;
    match Category::new(&pattern, &that, &topic, template) {
        Ok(category) => Some(category),
        Err(err) => {
            warn!(%err, "skipping category");
            None
        }
    }
}

/// Flatten a pattern-side element to text, keeping nested markup (such
/// as `<set>` references) verbatim.
fn element_text(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            other => out.push_str(&other.to_markup()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_load_simple_document() {
        let mut kb = KnowledgeBase::new();
        let added = load_aiml_str(
            &mut kb,
            r#"<aiml version="2.0">
                 <category><pattern>HELLO</pattern><template>Hi there!</template></category>
                 <category><pattern>BYE</pattern><template>See you.</template></category>
               </aiml>"#,
        );
        assert_eq!(added, Some(2));
        assert!(kb.lookup_exact("HELLO|||1").is_some());
    }

    #[test]
    fn test_inner_topic_element() {
        let mut kb = KnowledgeBase::new();
        load_aiml_str(
            &mut kb,
            "<aiml><category><pattern>GO</pattern><topic>GAMES</topic>\
             <template>ok</template></category></aiml>",
        );
        assert_eq!(kb.categories()[0].topic, "GAMES");
    }

    #[test]
    fn test_topic_wrapper_block() {
        let mut kb = KnowledgeBase::new();
        load_aiml_str(
            &mut kb,
            "<aiml><topic name=\"sports\">\
             <category><pattern>SCORE</pattern><template>2-0</template></category>\
             </topic></aiml>",
        );
        assert_eq!(kb.categories()[0].topic, "SPORTS");
    }

    #[test]
    fn test_that_element_and_set_reference_survive() {
        let mut kb = KnowledgeBase::new();
        load_aiml_str(
            &mut kb,
            "<aiml><category><pattern>I LIKE <set>colors</set></pattern>\
             <that>WHAT DO YOU LIKE</that><template>Nice.</template></category></aiml>",
        );
        let cat = &kb.categories()[0];
        assert_eq!(cat.pattern, "I LIKE <set>COLORS</set>");
        assert_eq!(cat.that, "WHAT DO YOU LIKE");
    }

    #[test]
    fn test_comments_and_cdata_tolerated() {
        let mut kb = KnowledgeBase::new();
        let added = load_aiml_str(
            &mut kb,
            "<aiml><!-- greeting --><category><pattern>HI</pattern>\
             <template><![CDATA[2 < 3]]></template></category></aiml>",
        );
        assert_eq!(added, Some(1));
    }

    #[test]
    fn test_no_categories_is_none() {
        let mut kb = KnowledgeBase::new();
        assert_eq!(load_aiml_str(&mut kb, "just some text"), None);
        assert_eq!(load_aiml_str(&mut kb, "<aiml></aiml>"), None);
    }

    #[test]
    fn test_empty_pattern_category_skipped() {
        let mut kb = KnowledgeBase::new();
        let added = load_aiml_str(
            &mut kb,
            "<aiml><category><pattern></pattern><template>x</template></category>\
             <category><pattern>OK</pattern><template>y</template></category></aiml>",
        );
        assert_eq!(added, Some(1));
    }

    #[test]
    fn test_duplicate_last_write_wins() {
        let mut kb = KnowledgeBase::new();
        load_aiml_str(
            &mut kb,
            "<aiml><category><pattern>HI</pattern><template>one</template></category>\
             <category><pattern>HI</pattern><template>two</template></category></aiml>",
        );
        assert_eq!(kb.len(), 1);
        let cat = kb.lookup_exact("HI|||1").unwrap();
        assert_eq!(parlance_core::nodes_inner_text(&cat.template), "two");
    }

    #[test]
    fn test_missing_file_classified() {
        let mut kb = KnowledgeBase::new();
        let err = load_aiml_file(&mut kb, Path::new("/definitely/not/here.aiml")).unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
    }
}
