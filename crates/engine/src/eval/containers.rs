// crates/engine/src/eval/containers.rs
//! Collection tags: `<list>`, `<array>`, `<map>`, and the set-operation
//! form of `<set>`. Content and the `key`/`index` attributes are
//! evaluated before the operation runs.

use parlance_core::Node;
use tracing::debug;

use super::{Evaluator, Scope};

/// `<list name="…" [operation] [index]>content</list>`
pub(crate) fn list_tag(ev: &Evaluator<'_>, node: &Node, scope: &mut Scope<'_>) -> String {
    let Some(name) = node.attr("name").map(str::to_string) else {
        debug!("list tag without a name");
        return String::new();
    };
    let content = ev.eval_nodes(node.children(), scope).trim().to_string();
    let index = parse_index(ev, node, scope);

    match node.attr("operation") {
        Some("add") => {
            scope.session.collections.list_add(&name, &content);
            String::new()
        }
        Some("insert") => {
            match index {
                Some(i) => scope.session.collections.list_insert(&name, i, &content),
                None => scope.session.collections.list_add(&name, &content),
            }
            String::new()
        }
        Some("remove") => {
            if !content.is_empty() {
                scope.session.collections.list_remove_value(&name, &content);
            } else if let Some(i) = index {
                scope.session.collections.list_remove_at(&name, i);
            }
            String::new()
        }
        Some("clear") => {
            scope.session.collections.list_clear(&name);
            String::new()
        }
        Some("size") => scope.session.collections.list_len(&name).to_string(),
        Some(other) => {
            debug!(operation = other, "unsupported list operation");
            String::new()
        }
        None => match index {
            Some(i) => scope
                .session
                .collections
                .list_get(&name, i)
                .unwrap_or("")
                .to_string(),
            None => scope.session.collections.list_join(&name),
        },
    }
}

/// `<array name="…" [operation] [index]>content</array>`
pub(crate) fn array_tag(ev: &Evaluator<'_>, node: &Node, scope: &mut Scope<'_>) -> String {
    let Some(name) = node.attr("name").map(str::to_string) else {
        debug!("array tag without a name");
        return String::new();
    };
    let content = ev.eval_nodes(node.children(), scope).trim().to_string();
    let index = parse_index(ev, node, scope);

    match node.attr("operation") {
        Some("set") => {
            match index {
                Some(i) => scope.session.collections.array_set(&name, i, &content),
                None => scope.session.collections.array_push(&name, &content),
            }
            String::new()
        }
        Some("clear") => {
            scope.session.collections.array_clear(&name);
            String::new()
        }
        Some("size") => scope.session.collections.array_len(&name).to_string(),
        Some(other) => {
            debug!(operation = other, "unsupported array operation");
            String::new()
        }
        None => match index {
            Some(i) => scope
                .session
                .collections
                .array_get(&name, i)
                .unwrap_or("")
                .to_string(),
            None => scope.session.collections.array_join(&name),
        },
    }
}

/// `<map name="…" [operation] [key]>content</map>`
///
/// Lookup order for the no-operation read: session map, then
/// knowledge-base map, then the key itself (legacy behaviour).
pub(crate) fn map_tag(ev: &Evaluator<'_>, node: &Node, scope: &mut Scope<'_>) -> String {
    let Some(name) = node.attr("name").map(str::to_string) else {
        debug!("map tag without a name");
        return String::new();
    };
    let content = ev.eval_nodes(node.children(), scope).trim().to_string();
    let key = ev.attr_eval(node, "key", scope);

    match (node.attr("operation"), key) {
        (Some("set"), Some(key)) => {
            scope.session.collections.map_set(&name, &key, &content);
            String::new()
        }
        (Some("remove"), Some(key)) => {
            scope.session.collections.map_remove(&name, &key);
            String::new()
        }
        (Some("contains"), Some(key)) => scope
            .session
            .collections
            .map_contains(&name, &key)
            .to_string(),
        (Some("keys"), _) => scope.session.collections.map_keys(&name),
        (Some("values"), _) => scope.session.collections.map_values(&name),
        (Some("list"), _) => scope.session.collections.map_pairs(&name),
        (Some("clear"), _) => {
            scope.session.collections.map_clear(&name);
            String::new()
        }
        (Some("size"), _) => scope.session.collections.map_len(&name).to_string(),
        (Some(other), _) => {
            debug!(operation = other, "unsupported map operation");
            String::new()
        }
        (None, Some(key)) => map_lookup(ev, scope, &name, &key),
        // Legacy form: `<map name="M">KEY</map>` is a lookup on KEY.
        (None, None) if !content.is_empty() => map_lookup(ev, scope, &name, &content),
        (None, None) => String::new(),
    }
}

fn map_lookup(ev: &Evaluator<'_>, scope: &Scope<'_>, name: &str, key: &str) -> String {
    if let Some(value) = scope.session.collections.map_get(name, key) {
        return value.to_string();
    }
    let from_kb = ev
        .interp
        .with_kb(|kb| kb.map(name).and_then(|m| m.get(key).cloned()));
    // Absent keys come back verbatim.
    from_kb.unwrap_or_else(|| key.to_string())
}

/// `<set name="…" operation="…">content</set>` — the collection half of
/// the `<set>` tag (assignment is handled by the evaluator).
pub(crate) fn set_collection_tag(
    ev: &Evaluator<'_>,
    node: &Node,
    scope: &mut Scope<'_>,
    operation: &str,
) -> String {
    let Some(name) = node.attr("name").map(str::to_string) else {
        debug!("set tag without a name");
        return String::new();
    };
    let content = ev.eval_nodes(node.children(), scope).trim().to_string();
    let collections = &mut scope.session.collections;

    match operation {
        "add" => {
            collections.set_mut(&name).add(&content);
            String::new()
        }
        "remove" | "delete" => {
            collections.set_mut(&name).remove(&content);
            String::new()
        }
        "contains" | "has" => collections
            .set_ref(&name)
            .is_some_and(|s| s.contains(&content))
            .to_string(),
        "size" | "length" => collections
            .set_ref(&name)
            .map(|s| s.len())
            .unwrap_or(0)
            .to_string(),
        "clear" => {
            collections.set_mut(&name).clear();
            String::new()
        }
        "get" | "list" => collections.set_join(&name),
        other => {
            debug!(operation = other, "unsupported set operation");
            String::new()
        }
    }
}

fn parse_index(ev: &Evaluator<'_>, node: &Node, scope: &mut Scope<'_>) -> Option<usize> {
    ev.attr_eval(node, "index", scope)
        .and_then(|s| s.trim().parse().ok())
}
