// crates/engine/src/session.rs
//! Per-conversation state: variables, topic, the three bounded context
//! histories (requests, responses, that-echoes) with weighting, decay,
//! pruning, and compression, plus the session registry.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::collections::Collections;

/// Tunables for history bounds and context bookkeeping.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Cap per individual history.
    pub max_history_depth: usize,
    /// Cap on items across all three histories; overflow prunes the
    /// lowest-weight item.
    pub max_total_context: usize,
    /// Positional decay applied to every stored weight when a new item
    /// arrives.
    pub decay: f64,
    /// Usage bonus per recorded access when ranking for pruning.
    pub usage_bonus: f64,
    /// Items longer than this are stored compressed.
    pub compress_over: usize,
    /// Head/tail kept by compression.
    pub compress_head: usize,
    pub compress_tail: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history_depth: 20,
            max_total_context: 100,
            decay: 0.95,
            usage_bonus: 0.1,
            compress_over: 256,
            compress_head: 120,
            compress_tail: 60,
        }
    }
}

/// Which history a context item lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    Request,
    Response,
    That,
}

/// One stored context item.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: u64,
    pub content: String,
    pub compressed: bool,
    pub added_at: DateTime<Utc>,
}

/// A bounded history; index 1 is the most recent item.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
}

impl History {
    /// 1-based lookup, newest first.
    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        if index == 0 {
            return None;
        }
        self.entries.get(index - 1)
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}

/// A search hit from the context histories.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextHit {
    pub kind: HistoryKind,
    pub content: String,
}

/// Per-conversation state. Owned by at most one active dispatch at a
/// time; the registry hands out `Arc<Mutex<Session>>`.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub variables: HashMap<String, String>,
    /// Empty string iff no topic has been set.
    pub topic: String,
    pub collections: Collections,
    request_history: History,
    response_history: History,
    that_history: History,
    context_weights: HashMap<u64, f64>,
    context_usage: HashMap<String, u32>,
    context_tags: HashMap<String, HashSet<String>>,
    context_metadata: HashMap<String, HashMap<String, String>>,
    next_context_id: u64,
    config: SessionConfig,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_config(id, SessionConfig::default())
    }

    pub fn with_config(id: impl Into<String>, config: SessionConfig) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            last_activity: now,
            variables: HashMap::new(),
            topic: String::new(),
            collections: Collections::default(),
            request_history: History::default(),
            response_history: History::default(),
            that_history: History::default(),
            context_weights: HashMap::new(),
            context_usage: HashMap::new(),
            context_tags: HashMap::new(),
            context_metadata: HashMap::new(),
            next_context_id: 0,
            config,
        }
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    // ── Histories ──────────────────────────────────────────────────────

    pub fn add_request(&mut self, content: &str) {
        self.push_history(HistoryKind::Request, content);
    }

    pub fn add_response(&mut self, content: &str) {
        self.push_history(HistoryKind::Response, content);
    }

    pub fn add_that(&mut self, content: &str) {
        self.push_history(HistoryKind::That, content);
    }

    pub fn request_history(&self) -> &History {
        &self.request_history
    }

    pub fn response_history(&self) -> &History {
        &self.response_history
    }

    pub fn that_history(&self) -> &History {
        &self.that_history
    }

    /// The most recent bot utterance, or "" before the bot has spoken.
    pub fn latest_that(&self) -> &str {
        self.that_history
            .latest()
            .map(|e| e.content.as_str())
            .unwrap_or("")
    }

    fn push_history(&mut self, kind: HistoryKind, content: &str) {
        // Positional decay: every existing item ages one step.
        for weight in self.context_weights.values_mut() {
            *weight *= self.config.decay;
        }

        let id = self.next_context_id;
        self.next_context_id += 1;
        let (content, compressed) = self.compress_if_needed(content);
        self.context_weights.insert(id, 1.0);

        let max_depth = self.config.max_history_depth;
        let mut dropped = Vec::new();
        let history = self.history_mut(kind);
        history.entries.push_front(HistoryEntry {
            id,
            content,
            compressed,
            added_at: Utc::now(),
        });
        // Per-history bound: oldest falls off.
        while history.entries.len() > max_depth {
            if let Some(old) = history.entries.pop_back() {
                dropped.push(old.id);
            }
        }
        for id in dropped {
            self.context_weights.remove(&id);
        }

        self.prune_to_total_cap();
        self.touch();
    }

    fn history_mut(&mut self, kind: HistoryKind) -> &mut History {
        match kind {
            HistoryKind::Request => &mut self.request_history,
            HistoryKind::Response => &mut self.response_history,
            HistoryKind::That => &mut self.that_history,
        }
    }

    fn compress_if_needed(&self, content: &str) -> (String, bool) {
        if content.chars().count() <= self.config.compress_over {
            return (content.to_string(), false);
        }
        let head: String = content.chars().take(self.config.compress_head).collect();
        let tail_count = content.chars().count();
        let tail: String = content
            .chars()
            .skip(tail_count.saturating_sub(self.config.compress_tail))
            .collect();
        debug!(session = %self.id, len = tail_count, "compressing long context item");
        (format!("{head} ... {tail}"), true)
    }

    /// Evict the globally lowest-weight items until the total count fits.
    /// Pruning is monotone: evicted items are gone for good.
    fn prune_to_total_cap(&mut self) {
        while self.total_context_items() > self.config.max_total_context {
            let candidates: Vec<(HistoryKind, u64, f64)> = [
                HistoryKind::Request,
                HistoryKind::Response,
                HistoryKind::That,
            ]
            .into_iter()
            .flat_map(|kind| {
                let history = match kind {
                    HistoryKind::Request => &self.request_history,
                    HistoryKind::Response => &self.response_history,
                    HistoryKind::That => &self.that_history,
                };
                history
                    .entries
                    .iter()
                    .map(|e| (kind, e.id, e))
                    .collect::<Vec<_>>()
            })
            .map(|(kind, id, e)| (kind, id, self.effective_weight(e)))
            .collect();

            let victim = candidates
                .into_iter()
                .min_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(kind, id, _)| (kind, id));

            match victim {
                Some((kind, id)) => {
                    let history = self.history_mut(kind);
                    history.entries.retain(|e| e.id != id);
                    self.context_weights.remove(&id);
                }
                None => break,
            }
        }
    }

    fn total_context_items(&self) -> usize {
        self.request_history.len() + self.response_history.len() + self.that_history.len()
    }

    /// Stored weight adjusted by recorded usage; ties favor heavier use.
    fn effective_weight(&self, entry: &HistoryEntry) -> f64 {
        let weight = self.context_weights.get(&entry.id).copied().unwrap_or(0.0);
        let usage = self
            .context_usage
            .get(&entry.content)
            .copied()
            .unwrap_or(0) as f64;
        weight * (1.0 + self.config.usage_bonus * usage)
    }

    pub fn weight_of(&self, id: u64) -> Option<f64> {
        self.context_weights.get(&id).copied()
    }

    // ── Usage, tags, metadata ──────────────────────────────────────────

    /// Record that a history item's content was read back into a reply.
    pub fn record_usage(&mut self, content: &str) {
        *self.context_usage.entry(content.to_string()).or_insert(0) += 1;
    }

    pub fn usage_of(&self, content: &str) -> u32 {
        self.context_usage.get(content).copied().unwrap_or(0)
    }

    pub fn tag_context(&mut self, content: &str, tag: &str) {
        self.context_tags
            .entry(content.to_string())
            .or_default()
            .insert(tag.to_string());
    }

    pub fn context_tags(&self, content: &str) -> Option<&HashSet<String>> {
        self.context_tags.get(content)
    }

    pub fn set_context_metadata(&mut self, content: &str, key: &str, value: &str) {
        self.context_metadata
            .entry(content.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    pub fn context_metadata(&self, content: &str) -> Option<&HashMap<String, String>> {
        self.context_metadata.get(content)
    }

    /// Case-insensitive substring search across all three histories,
    /// newest items first within each history.
    pub fn search_context(&self, query: &str) -> Vec<ContextHit> {
        let needle = query.to_lowercase();
        let mut hits = Vec::new();
        for (kind, history) in [
            (HistoryKind::Request, &self.request_history),
            (HistoryKind::Response, &self.response_history),
            (HistoryKind::That, &self.that_history),
        ] {
            for entry in history.iter() {
                if entry.content.to_lowercase().contains(&needle) {
                    hits.push(ContextHit {
                        kind,
                        content: entry.content.clone(),
                    });
                }
            }
        }
        hits
    }

    // ── Variables and topic ────────────────────────────────────────────

    pub fn get_variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub fn set_variable(&mut self, name: &str, value: &str) {
        if name.eq_ignore_ascii_case("topic") {
            self.topic = value.to_string();
        }
        self.variables.insert(name.to_string(), value.to_string());
        self.touch();
    }
}

/// Concurrent session registry keyed by session id.
#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or return the existing) session for `id`.
    pub fn create(&self, id: &str) -> Arc<Mutex<Session>> {
        self.create_with_config(id, SessionConfig::default())
    }

    pub fn create_with_config(&self, id: &str, config: SessionConfig) -> Arc<Mutex<Session>> {
        let mut sessions = self.inner.write().unwrap();
        sessions
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::with_config(id, config))))
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Mutex<Session>>> {
        self.inner.read().unwrap().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> bool {
        self.inner.write().unwrap().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_history_is_newest_first() {
        let mut s = Session::new("t");
        s.add_request("one");
        s.add_request("two");
        assert_eq!(s.request_history().get(1).unwrap().content, "two");
        assert_eq!(s.request_history().get(2).unwrap().content, "one");
        assert!(s.request_history().get(3).is_none());
        assert!(s.request_history().get(0).is_none());
    }

    #[test]
    fn test_per_history_cap() {
        let mut s = Session::with_config(
            "t",
            SessionConfig {
                max_history_depth: 3,
                ..Default::default()
            },
        );
        for i in 0..10 {
            s.add_request(&format!("req {i}"));
        }
        assert_eq!(s.request_history().len(), 3);
        assert_eq!(s.request_history().get(1).unwrap().content, "req 9");
    }

    #[test]
    fn test_total_cap_prunes_lowest_weight() {
        let mut s = Session::with_config(
            "t",
            SessionConfig {
                max_history_depth: 10,
                max_total_context: 12,
                ..Default::default()
            },
        );
        for i in 0..10 {
            s.add_request(&format!("req {i}"));
        }
        for i in 0..10 {
            s.add_response(&format!("resp {i}"));
        }
        assert!(s.total_context_items() <= 12);
        // The oldest (most decayed) requests were evicted first.
        assert!(s
            .request_history()
            .iter()
            .all(|e| e.content != "req 0"));
    }

    #[test]
    fn test_newer_outweighs_older_at_equal_usage() {
        let mut s = Session::new("t");
        s.add_request("old");
        let old_id = s.request_history().get(1).unwrap().id;
        s.add_request("new");
        let new_id = s.request_history().get(1).unwrap().id;
        assert!(s.weight_of(new_id).unwrap() > s.weight_of(old_id).unwrap());
    }

    #[test]
    fn test_compression_keeps_head_and_tail() {
        let mut s = Session::with_config(
            "t",
            SessionConfig {
                compress_over: 10,
                compress_head: 4,
                compress_tail: 3,
                ..Default::default()
            },
        );
        s.add_request("abcdefghijklmnopqrstuvwxyz");
        let entry = s.request_history().get(1).unwrap();
        assert!(entry.compressed);
        assert_eq!(entry.content, "abcd ... xyz");
    }

    #[test]
    fn test_short_items_not_compressed() {
        let mut s = Session::new("t");
        s.add_request("short");
        assert!(!s.request_history().get(1).unwrap().compressed);
    }

    #[test]
    fn test_usage_tags_metadata() {
        let mut s = Session::new("t");
        s.add_response("the answer");
        s.record_usage("the answer");
        s.record_usage("the answer");
        assert_eq!(s.usage_of("the answer"), 2);
        s.tag_context("the answer", "important");
        assert!(s.context_tags("the answer").unwrap().contains("important"));
        s.set_context_metadata("the answer", "source", "kb");
        assert_eq!(
            s.context_metadata("the answer").unwrap().get("source"),
            Some(&"kb".to_string())
        );
    }

    #[test]
    fn test_search_context() {
        let mut s = Session::new("t");
        s.add_request("tell me about pizza");
        s.add_response("Pizza is great");
        s.add_that("Pizza is great");
        let hits = s.search_context("pizza");
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].kind, HistoryKind::Request);
    }

    #[test]
    fn test_topic_tracks_variable() {
        let mut s = Session::new("t");
        assert_eq!(s.topic, "");
        s.set_variable("topic", "WEATHER");
        assert_eq!(s.topic, "WEATHER");
        assert_eq!(s.get_variable("topic"), Some("WEATHER"));
    }

    #[test]
    fn test_registry_create_and_reuse() {
        let registry = SessionRegistry::new();
        let a = registry.create("s1");
        let b = registry.create("s1");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
        assert!(registry.remove("s1"));
        assert!(registry.is_empty());
    }
}
