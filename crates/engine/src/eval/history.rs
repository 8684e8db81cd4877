// crates/engine/src/eval/history.rs
//! History tags: `<that>`, `<request>`, `<response>`.

use parlance_core::Node;

use super::Scope;
use crate::session::HistoryKind;

/// Read the nth-latest entry (1-based, default 1) from one of the three
/// histories. Reads count as usage for context weighting; a missing
/// entry is the empty string.
pub(crate) fn read_history(node: &Node, scope: &mut Scope<'_>, kind: HistoryKind) -> String {
    let index = node
        .attr("index")
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(1);
    let history = match kind {
        HistoryKind::That => scope.session.that_history(),
        HistoryKind::Request => scope.session.request_history(),
        HistoryKind::Response => scope.session.response_history(),
    };
    match history.get(index) {
        Some(entry) => {
            let content = entry.content.clone();
            scope.session.record_usage(&content);
            content
        }
        None => String::new(),
    }
}
