// crates/engine/src/eval/mod.rs
//! The tree evaluator: depth-first interpretation of a template AST.
//!
//! Children evaluate first; their concatenation is the tag's inner text,
//! then the tag's semantic applies. Anything that goes wrong inside a tag
//! degrades to the empty string so the rest of the template still
//! assembles a reply.

mod containers;
mod flow;
mod history;
mod learning;
mod person;
mod text;

use std::collections::HashMap;

use chrono::Local;
use parlance_core::normalize::normalize_for_matching;
use parlance_core::Node;
use tracing::{debug, warn};

use crate::dispatch::Interpreter;
use crate::session::{HistoryKind, Session};
use crate::sraix::ServiceRequest;

/// Hard cap on `<srai>`/`<sr/>` re-entry.
pub const MAX_RECURSION_DEPTH: u32 = 100;

/// One evaluation pass over a matched template.
pub struct Evaluator<'a> {
    pub(crate) interp: &'a Interpreter,
}

/// Per-invocation evaluation state. `local_vars` is fresh for every
/// template evaluation; the session persists across them.
pub(crate) struct Scope<'s> {
    pub bindings: &'s HashMap<String, String>,
    pub local_vars: HashMap<String, String>,
    pub session: &'s mut Session,
    pub raw_input: &'s str,
    pub depth: u32,
}

impl<'a> Evaluator<'a> {
    pub fn new(interp: &'a Interpreter) -> Self {
        Self { interp }
    }

    /// Evaluate a template with the given wildcard bindings against a
    /// session. Returns the concatenated output; trailing-whitespace
    /// trimming happens once at the dispatch level.
    pub fn evaluate(
        &self,
        nodes: &[Node],
        bindings: &HashMap<String, String>,
        session: &mut Session,
        raw_input: &str,
        depth: u32,
    ) -> String {
        let mut scope = Scope {
            bindings,
            local_vars: HashMap::new(),
            session,
            raw_input,
            depth,
        };
        self.eval_nodes(nodes, &mut scope)
    }

    pub(crate) fn eval_nodes(&self, nodes: &[Node], scope: &mut Scope) -> String {
        let mut out = String::new();
        for node in nodes {
            out.push_str(&self.eval_node(node, scope));
        }
        out
    }

    fn eval_node(&self, node: &Node, scope: &mut Scope) -> String {
        match node {
            Node::Text(t) => t.clone(),
            Node::Tag { name, .. } | Node::SelfClosing { name, .. } => {
                self.eval_tag(name, node, scope)
            }
        }
    }

    fn eval_tag(&self, name: &str, node: &Node, scope: &mut Scope) -> String {
        match name {
            // ── Wildcards & recursion ──────────────────────────────────
            "star" => wildcard_binding(node, scope, &["star", "underscore"]),
            "thatstar" => wildcard_binding(node, scope, &["that_star"]),
            "sr" => {
                // `<sr/>` ≡ `<srai><star/></srai>`.
                let text = scope
                    .bindings
                    .get("star1")
                    .or_else(|| scope.bindings.get("underscore1"))
                    .cloned()
                    .unwrap_or_default();
                self.srai(&text, scope)
            }
            "srai" => {
                let inner = self.eval_nodes(node.children(), scope);
                self.srai(&inner, scope)
            }
            "sraix" => self.sraix(node, scope),

            // ── Variables ──────────────────────────────────────────────
            "set" => self.eval_set(node, scope),
            "get" => self.eval_get(node, scope),
            "bot" => self.interp.with_kb(|kb| {
                kb.property(node.attr("name").unwrap_or(""))
                    .unwrap_or("")
                    .to_string()
            }),

            // ── Control flow ───────────────────────────────────────────
            "think" => {
                self.eval_nodes(node.children(), scope);
                String::new()
            }
            "condition" => flow::condition(self, node, scope),
            "random" => flow::random(self, node, scope),
            "loop" => String::new(),
            "eval" => self.eval_nodes(node.children(), scope),

            // ── History & introspection ────────────────────────────────
            "that" => history::read_history(node, scope, HistoryKind::That),
            "request" => history::read_history(node, scope, HistoryKind::Request),
            "response" => history::read_history(node, scope, HistoryKind::Response),
            "input" => scope.raw_input.to_string(),
            "date" => clock_tag(node, "%B %d, %Y"),
            "time" => clock_tag(node, "%H:%M:%S"),
            "id" => scope.session.id.clone(),
            "size" => self.interp.category_count().to_string(),

            // ── Collections ────────────────────────────────────────────
            "list" => containers::list_tag(self, node, scope),
            "array" => containers::array_tag(self, node, scope),
            "map" => containers::map_tag(self, node, scope),

            // ── Learning ───────────────────────────────────────────────
            "learn" => learning::learn_tag(self, node, scope, false),
            "learnf" => learning::learn_tag(self, node, scope, true),

            // ── Substitution tags ──────────────────────────────────────
            "person" | "gender" | "person2" => {
                let inner = self.eval_nodes(node.children(), scope);
                self.interp.with_kb(|kb| person::swap_tag(name, &inner, kb))
            }
            "normalize" => {
                let inner = self.eval_nodes(node.children(), scope);
                normalize_for_matching(&inner)
            }
            "denormalize" => {
                let inner = self.eval_nodes(node.children(), scope);
                self.interp.with_kb(|kb| person::denormalize(&inner, kb))
            }

            // ── Text formatting, else passthrough ──────────────────────
            _ => {
                let inner = self.eval_nodes(node.children(), scope);
                match text::apply(name, node, &inner) {
                    Some(result) => result,
                    None => {
                        debug!(tag = name, "unknown tag; passing inner text through");
                        inner
                    }
                }
            }
        }
    }

    /// Re-enter the matcher with a derived input (`<srai>`, `<sr/>`).
    fn srai(&self, text: &str, scope: &mut Scope) -> String {
        let text = text.trim();
        if text.is_empty() {
            return String::new();
        }
        if scope.depth >= MAX_RECURSION_DEPTH {
            warn!(depth = scope.depth, input = text, "srai recursion limit reached");
            return String::new();
        }
        self.interp.respond(text, scope.session, scope.depth + 1)
    }

    fn sraix(&self, node: &Node, scope: &mut Scope) -> String {
        let body = self.eval_nodes(node.children(), scope);
        let service = node.attr("service").unwrap_or("").to_string();
        let attributes = node.attributes().cloned().unwrap_or_default();
        match self.interp.services().get(&service) {
            Some(adapter) => {
                let request = ServiceRequest {
                    service: service.clone(),
                    attributes,
                    body,
                };
                match adapter.call(&request) {
                    Ok(response) => response.body,
                    Err(err) => {
                        warn!(service = %service, %err, "sraix call failed");
                        String::new()
                    }
                }
            }
            None => {
                warn!(service = %service, "no sraix adapter registered");
                String::new()
            }
        }
    }

    /// `<set>`: collection operation when `operation` names one,
    /// otherwise variable assignment. Always evaluates to "".
    fn eval_set(&self, node: &Node, scope: &mut Scope) -> String {
        match node.attr("operation") {
            Some(op) if !op.eq_ignore_ascii_case("assign") => {
                return containers::set_collection_tag(self, node, scope, op);
            }
            _ => {}
        }
        let value = match self.attr_eval(node, "value", scope) {
            Some(v) => v,
            None => self.eval_nodes(node.children(), scope).trim().to_string(),
        };
        if let Some(var) = node.attr("var") {
            scope.local_vars.insert(var.to_string(), value);
            return String::new();
        }
        if let Some(name) = node.attr("name") {
            if scope.local_vars.contains_key(name) {
                scope.local_vars.insert(name.to_string(), value);
            } else {
                scope.session.set_variable(name, &value);
            }
        }
        String::new()
    }

    /// `<get>`: local vars, then session vars, then bot properties, then
    /// property defaults.
    fn eval_get(&self, node: &Node, scope: &mut Scope) -> String {
        if let Some(var) = node.attr("var") {
            return scope.local_vars.get(var).cloned().unwrap_or_default();
        }
        match node.attr("name") {
            Some(name) => self.var_lookup(scope, name),
            None => String::new(),
        }
    }

    /// Read an attribute, evaluating any markup inside it (`key="<star/>"`
    /// binds the capture, not the literal text).
    pub(crate) fn attr_eval(&self, node: &Node, name: &str, scope: &mut Scope) -> Option<String> {
        let raw = node.attr(name)?;
        if raw.contains('<') {
            let nodes = parlance_core::parse_template(raw);
            Some(self.eval_nodes(&nodes, scope))
        } else {
            Some(raw.to_string())
        }
    }

    pub(crate) fn var_lookup(&self, scope: &Scope, name: &str) -> String {
        if let Some(v) = scope.local_vars.get(name) {
            return v.clone();
        }
        if let Some(v) = scope.session.get_variable(name) {
            return v.to_string();
        }
        self.interp.with_kb(|kb| {
            kb.property(name)
                .or_else(|| kb.pdefault(name))
                .unwrap_or("")
                .to_string()
        })
    }
}

/// Read a wildcard binding by 1-based index, trying each binding family
/// in order (`<star/>` answers for both `*` and `_` captures).
fn wildcard_binding(node: &Node, scope: &Scope, families: &[&str]) -> String {
    let index = node
        .attr("index")
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(1);
    families
        .iter()
        .find_map(|family| scope.bindings.get(&format!("{family}{index}")))
        .cloned()
        .unwrap_or_default()
}

/// `<date/>` / `<time/>`: format the current local time. Unparseable
/// format strings fall back to the tag default.
fn clock_tag(node: &Node, default_format: &str) -> String {
    let format = node.attr("format").unwrap_or(default_format);
    let format = if format_is_valid(format) {
        format
    } else {
        default_format
    };
    Local::now().format(format).to_string()
}

fn format_is_valid(format: &str) -> bool {
    use chrono::format::{Item, StrftimeItems};
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}
