// crates/engine/src/eval/learning.rs
//! `<learn>` and `<learnf>` glue: extract categories from the tag body
//! (resolving `<eval>` in the current scope) and hand them to the
//! interpreter.

use parlance_core::Node;
use tracing::info;

use super::{Evaluator, Scope};
use crate::learn::{extract_categories, ParsedLearn};

pub(crate) fn learn_tag(
    ev: &Evaluator<'_>,
    node: &Node,
    scope: &mut Scope<'_>,
    persist: bool,
) -> String {
    let parsed = {
        let mut eval = |nodes: &[Node]| ev.eval_nodes(nodes, scope);
        extract_categories(node.children(), &mut eval)
    };
    for ParsedLearn { category, record } in parsed {
        info!(pattern = %category.pattern, persist, "category learned");
        ev.interp
            .insert_learned(category, persist.then_some(&record));
    }
    String::new()
}
