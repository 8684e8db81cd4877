// crates/engine/src/learn.rs
//! The learning manager: turn `<learn>`/`<learnf>` fragments into live
//! categories.
//!
//! Fragment children are not evaluated; only `<eval>` subtrees are
//! resolved at learn time. Invalid categories (empty pattern, missing
//! pattern element) are skipped with a warning; the tag itself always
//! evaluates to the empty string.

use parlance_core::{nodes_to_markup, Category, Node};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The persisted shape of one learned category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedCategory {
    pub pattern: String,
    #[serde(default)]
    pub that: String,
    #[serde(default)]
    pub topic: String,
    pub template: String,
}

/// Where `<learnf>` categories go. Implementations append records
/// durably and replay them at startup.
pub trait LearnedSink: Send + Sync {
    fn append(&self, record: &LearnedCategory) -> std::io::Result<()>;
}

/// A category extracted from a learn fragment, paired with its
/// persistable record.
pub(crate) struct ParsedLearn {
    pub category: Category,
    pub record: LearnedCategory,
}

/// Walk a learn fragment and build every valid `<category>` it contains.
/// `eval` resolves `<eval>` subtrees in the enclosing evaluation scope.
pub(crate) fn extract_categories<F>(nodes: &[Node], eval: &mut F) -> Vec<ParsedLearn>
where
    F: FnMut(&[Node]) -> String,
{
    let mut out = Vec::new();
    for node in nodes {
        if let Node::Tag { name, children, .. } = node {
            if name == "category" {
                if let Some(parsed) = parse_category(children, eval) {
                    out.push(parsed);
                }
            }
        }
    }
    out
}

fn parse_category<F>(children: &[Node], eval: &mut F) -> Option<ParsedLearn>
where
    F: FnMut(&[Node]) -> String,
{
    let mut pattern = None;
    let mut that = String::new();
    let mut topic = String::new();
    let mut template = Vec::new();

    for child in children {
        if let Node::Tag { name, children, .. } = child {
            match name.as_str() {
                "pattern" => pattern = Some(fragment_text(children, eval)),
                "that" => that = fragment_text(children, eval),
                "topic" => topic = fragment_text(children, eval),
                "template" => template = resolve_evals(children, eval),
                _ => {}
            }
        }
    }

    let pattern = match pattern {
        Some(p) => p,
        None => {
            warn!("learn category without a pattern; skipping");
            return None;
        }
    };
    let template_markup = nodes_to_markup(&template);
    match Category::new(&pattern, &that, &topic, template) {
        Ok(category) => {
            let record = LearnedCategory {
                pattern: category.pattern.clone(),
                that: category.that.clone(),
                topic: category.topic.clone(),
                template: template_markup,
            };
            Some(ParsedLearn { category, record })
        }
        Err(err) => {
            warn!(%err, "skipping invalid learned category");
            None
        }
    }
}

/// Flatten fragment content to text: literal text stays, `<eval>` runs in
/// the enclosing scope, any other markup is kept verbatim (so pattern-side
/// `<set>` references survive).
fn fragment_text<F>(nodes: &[Node], eval: &mut F) -> String
where
    F: FnMut(&[Node]) -> String,
{
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Tag { name, children, .. } if name == "eval" => out.push_str(&eval(children)),
            other => out.push_str(&other.to_markup()),
        }
    }
    out
}

/// Replace `<eval>` subtrees with their evaluated text; everything else
/// is carried over structurally unchanged.
fn resolve_evals<F>(nodes: &[Node], eval: &mut F) -> Vec<Node>
where
    F: FnMut(&[Node]) -> String,
{
    nodes
        .iter()
        .map(|node| match node {
            Node::Tag { name, children, .. } if name == "eval" => Node::Text(eval(children)),
            Node::Tag {
                name,
                attributes,
                children,
            } => Node::Tag {
                name: name.clone(),
                attributes: attributes.clone(),
                children: resolve_evals(children, eval),
            },
            other => other.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlance_core::parse_template;
    use pretty_assertions::assert_eq;

    fn no_eval(nodes: &[Node]) -> String {
        nodes_to_markup(nodes)
    }

    #[test]
    fn test_extract_simple_category() {
        let nodes = parse_template(
            "<category><pattern>I KNOW *</pattern>\
             <template>Yes, I know about <star/>.</template></category>",
        );
        let parsed = extract_categories(&nodes, &mut no_eval);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].category.pattern, "I KNOW *");
        assert_eq!(parsed[0].record.template, "Yes, I know about <star/>.");
    }

    #[test]
    fn test_extract_with_that_and_topic() {
        let nodes = parse_template(
            "<category><pattern>YES</pattern><that>ARE YOU SURE</that>\
             <topic>QUIZ</topic><template>Good.</template></category>",
        );
        let parsed = extract_categories(&nodes, &mut no_eval);
        assert_eq!(parsed[0].category.that, "ARE YOU SURE");
        assert_eq!(parsed[0].category.topic, "QUIZ");
    }

    #[test]
    fn test_eval_resolved_in_pattern_and_template() {
        let nodes = parse_template(
            "<category><pattern>WHO IS <eval>x</eval></pattern>\
             <template><eval>y</eval></template></category>",
        );
        let mut eval = |_: &[Node]| "RESOLVED".to_string();
        let parsed = extract_categories(&nodes, &mut eval);
        assert_eq!(parsed[0].category.pattern, "WHO IS RESOLVED");
        assert_eq!(parsed[0].record.template, "RESOLVED");
    }

    #[test]
    fn test_empty_pattern_skipped() {
        let nodes = parse_template(
            "<category><pattern></pattern><template>x</template></category>\
             <category><pattern>OK</pattern><template>y</template></category>",
        );
        let parsed = extract_categories(&nodes, &mut no_eval);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].category.pattern, "OK");
    }

    #[test]
    fn test_missing_pattern_skipped() {
        let nodes = parse_template("<category><template>x</template></category>");
        assert!(extract_categories(&nodes, &mut no_eval).is_empty());
    }
}
