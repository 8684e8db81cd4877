// crates/engine/src/eval/flow.rs
//! Control-flow tags: `<condition>` and `<random>`.
//!
//! Branch bodies are evaluated only after selection so an untaken branch
//! never runs its side effects.

use parlance_core::Node;
use rand::Rng;

use super::{Evaluator, Scope};

/// `<condition>`: single-branch form with `name` + `value`, or
/// multi-branch form with `<li>` children. Comparison is case-sensitive;
/// an `<li>` without a `value` is the default branch.
pub(crate) fn condition(ev: &Evaluator<'_>, node: &Node, scope: &mut Scope<'_>) -> String {
    let cond_name = node.attr("name").or_else(|| node.attr("var"));
    let cond_value = node.attr("value");

    if let (Some(name), Some(value)) = (cond_name, cond_value) {
        if ev.var_lookup(scope, name) == value {
            return ev.eval_nodes(node.children(), scope);
        }
        return String::new();
    }

    let mut default_branch: Option<&Node> = None;
    for child in node.children() {
        if child.name() != Some("li") {
            continue;
        }
        match child.attr("value") {
            Some(value) => {
                let li_name = child.attr("name").or(cond_name);
                if let Some(li_name) = li_name {
                    if ev.var_lookup(scope, li_name) == value {
                        return ev.eval_nodes(child.children(), scope);
                    }
                }
            }
            None => {
                if default_branch.is_none() {
                    default_branch = Some(child);
                }
            }
        }
    }
    match default_branch {
        Some(li) => ev.eval_nodes(li.children(), scope),
        None => String::new(),
    }
}

/// `<random>`: uniform choice among `<li>` children; only the chosen
/// branch is evaluated.
pub(crate) fn random(ev: &Evaluator<'_>, node: &Node, scope: &mut Scope<'_>) -> String {
    let branches: Vec<&Node> = node
        .children()
        .iter()
        .filter(|c| c.name() == Some("li"))
        .collect();
    if branches.is_empty() {
        return String::new();
    }
    let pick = rand::rng().random_range(0..branches.len());
    ev.eval_nodes(branches[pick].children(), scope)
}
