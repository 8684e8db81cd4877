// crates/match/src/cache.rs
//! The matching cache: four disjoint bounded sub-caches (pattern
//! priorities, wildcard match outcomes, set alternation regexes,
//! exact-match keys) with LRU eviction, TTL-on-read expiry, and
//! knowledge-base / set invalidation.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use parlance_core::PatternPriority;
use tracing::debug;

/// Bounds shared by every sub-cache.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Max entries per sub-cache before LRU eviction.
    pub max_entries: usize,
    /// Entry lifetime; expired entries are dropped on read and count as
    /// misses.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 2000,
            ttl: Duration::from_secs(600),
        }
    }
}

/// Result of running one pattern regex against one input, cached so a
/// repeated `(input, pattern)` pair skips regex execution entirely.
#[derive(Debug, Clone)]
pub struct WildcardOutcome {
    pub matched: bool,
    /// Binding name/value pairs captured on a successful match.
    pub bindings: Vec<(String, String)>,
    /// The compiled regex text (kept for diagnostics).
    pub regex: String,
}

/// Snapshot of cache health for the stats surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub priority_entries: usize,
    pub wildcard_entries: usize,
    pub set_regex_entries: usize,
    pub exact_key_entries: usize,
}

struct Entry<V> {
    value: V,
    last_access: Instant,
    /// Monotonic access stamp; the minimum stamp is the LRU victim.
    stamp: u64,
}

/// One bounded store: LRU on insert overflow, TTL checked on read.
struct Shard<V> {
    entries: HashMap<String, Entry<V>>,
    config: CacheConfig,
    counter: u64,
    hits: u64,
    misses: u64,
}

impl<V: Clone> Shard<V> {
    fn new(config: CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            config,
            counter: 0,
            hits: 0,
            misses: 0,
        }
    }

    fn get(&mut self, key: &str) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.last_access.elapsed() > self.config.ttl,
            None => {
                self.misses += 1;
                return None;
            }
        };
        if expired {
            self.entries.remove(key);
            self.misses += 1;
            return None;
        }
        self.counter += 1;
        let entry = self.entries.get_mut(key).expect("entry checked above");
        entry.last_access = Instant::now();
        entry.stamp = self.counter;
        self.hits += 1;
        Some(entry.value.clone())
    }

    fn insert(&mut self, key: String, value: V) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.config.max_entries {
            self.evict_lru();
        }
        self.counter += 1;
        self.entries.insert(
            key,
            Entry {
                value,
                last_access: Instant::now(),
                stamp: self.counter,
            },
        );
    }

    fn evict_lru(&mut self) {
        if let Some(victim) = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.stamp)
            .map(|(k, _)| k.clone())
        {
            self.entries.remove(&victim);
        }
    }

    fn retain<F: FnMut(&str) -> bool>(&mut self, mut keep: F) {
        self.entries.retain(|k, _| keep(k));
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

struct Inner {
    priorities: Shard<PatternPriority>,
    wildcards: Shard<WildcardOutcome>,
    set_regexes: Shard<String>,
    exact_keys: Shard<String>,
    kb_hash: String,
}

/// The shared matching cache. Interior mutex: writes (insert, evict,
/// invalidate) need exclusive access and reads update recency, so every
/// operation takes the lock briefly; nothing is held across other work.
pub struct MatchCache {
    inner: Mutex<Inner>,
}

impl Default for MatchCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl MatchCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                priorities: Shard::new(config),
                wildcards: Shard::new(config),
                set_regexes: Shard::new(config),
                exact_keys: Shard::new(config),
                kb_hash: String::new(),
            }),
        }
    }

    // ── Pattern priorities ─────────────────────────────────────────────

    pub fn priority(&self, pattern: &str) -> Option<PatternPriority> {
        self.inner.lock().unwrap().priorities.get(pattern)
    }

    pub fn store_priority(&self, pattern: &str, priority: PatternPriority) {
        self.inner
            .lock()
            .unwrap()
            .priorities
            .insert(pattern.to_string(), priority);
    }

    // ── Wildcard outcomes ──────────────────────────────────────────────

    pub fn wildcard_outcome(&self, input: &str, pattern: &str) -> Option<WildcardOutcome> {
        self.inner
            .lock()
            .unwrap()
            .wildcards
            .get(&wildcard_key(input, pattern))
    }

    pub fn store_wildcard_outcome(&self, input: &str, pattern: &str, outcome: WildcardOutcome) {
        self.inner
            .lock()
            .unwrap()
            .wildcards
            .insert(wildcard_key(input, pattern), outcome);
    }

    // ── Set regexes ────────────────────────────────────────────────────

    pub fn set_regex(&self, set_name: &str, content_hash: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .set_regexes
            .get(&set_regex_key(set_name, content_hash))
    }

    pub fn store_set_regex(&self, set_name: &str, content_hash: &str, regex: String) {
        self.inner
            .lock()
            .unwrap()
            .set_regexes
            .insert(set_regex_key(set_name, content_hash), regex);
    }

    // ── Exact-match keys ───────────────────────────────────────────────

    pub fn exact_key(
        &self,
        input: &str,
        topic: &str,
        that: &str,
        that_index: usize,
    ) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .exact_keys
            .get(&exact_lookup_key(input, topic, that, that_index))
    }

    pub fn store_exact_key(
        &self,
        input: &str,
        topic: &str,
        that: &str,
        that_index: usize,
        key: String,
    ) {
        self.inner
            .lock()
            .unwrap()
            .exact_keys
            .insert(exact_lookup_key(input, topic, that, that_index), key);
    }

    // ── Invalidation ───────────────────────────────────────────────────

    /// Clear everything when the knowledge-base content hash moved.
    pub fn invalidate_knowledge_base(&self, new_hash: &str) {
        let mut inner = self.inner.lock().unwrap();
        if inner.kb_hash == new_hash {
            return;
        }
        debug!(new_hash, "knowledge base changed; clearing match cache");
        inner.priorities.clear();
        inner.wildcards.clear();
        inner.set_regexes.clear();
        inner.exact_keys.clear();
        inner.kb_hash = new_hash.to_string();
    }

    /// Drop every set regex for `name` and every wildcard outcome whose
    /// pattern mentions `<set>NAME</set>`.
    pub fn invalidate_set(&self, name: &str) {
        let folded = name.trim().to_uppercase();
        let prefix = format!("{folded}|");
        let mention = format!("<set>{folded}</set>");
        let mut inner = self.inner.lock().unwrap();
        inner.set_regexes.retain(|k| !k.starts_with(&prefix));
        inner.wildcards.retain(|k| !k.contains(&mention));
    }

    pub fn stats(&self) -> MatchCacheStats {
        let inner = self.inner.lock().unwrap();
        let shards = [
            (&inner.priorities.hits, &inner.priorities.misses),
            (&inner.wildcards.hits, &inner.wildcards.misses),
            (&inner.set_regexes.hits, &inner.set_regexes.misses),
            (&inner.exact_keys.hits, &inner.exact_keys.misses),
        ];
        let hits: u64 = shards.iter().map(|(h, _)| **h).sum();
        let misses: u64 = shards.iter().map(|(_, m)| **m).sum();
        let total = hits + misses;
        MatchCacheStats {
            hits,
            misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
            priority_entries: inner.priorities.len(),
            wildcard_entries: inner.wildcards.len(),
            set_regex_entries: inner.set_regexes.len(),
            exact_key_entries: inner.exact_keys.len(),
        }
    }
}

fn wildcard_key(input: &str, pattern: &str) -> String {
    format!("{input}|{pattern}")
}

fn set_regex_key(set_name: &str, content_hash: &str) -> String {
    format!("{}|{content_hash}", set_name.trim().to_uppercase())
}

fn exact_lookup_key(input: &str, topic: &str, that: &str, that_index: usize) -> String {
    format!("{input}|{topic}|{that}|{that_index}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlance_core::compute_priority;

    fn tiny_cache(max_entries: usize, ttl: Duration) -> MatchCache {
        MatchCache::new(CacheConfig { max_entries, ttl })
    }

    #[test]
    fn test_priority_round_trip() {
        let cache = MatchCache::default();
        assert!(cache.priority("HELLO *").is_none());
        cache.store_priority("HELLO *", compute_priority("HELLO *"));
        assert_eq!(cache.priority("HELLO *"), Some(compute_priority("HELLO *")));
    }

    #[test]
    fn test_ttl_expiry_on_read() {
        let cache = tiny_cache(16, Duration::from_millis(20));
        cache.store_priority("P", compute_priority("P"));
        assert!(cache.priority("P").is_some());
        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.priority("P").is_none());
        // Re-set makes it visible again.
        cache.store_priority("P", compute_priority("P"));
        assert!(cache.priority("P").is_some());
    }

    #[test]
    fn test_lru_eviction_drops_least_recent() {
        let cache = tiny_cache(2, Duration::from_secs(60));
        cache.store_priority("A", compute_priority("A"));
        cache.store_priority("B", compute_priority("B"));
        // Touch A so B becomes the LRU victim.
        assert!(cache.priority("A").is_some());
        cache.store_priority("C", compute_priority("C"));
        assert!(cache.priority("A").is_some());
        assert!(cache.priority("B").is_none());
        assert!(cache.priority("C").is_some());
    }

    #[test]
    fn test_knowledge_base_invalidation_clears_everything() {
        let cache = MatchCache::default();
        cache.invalidate_knowledge_base("h1");
        cache.store_priority("P", compute_priority("P"));
        cache.store_set_regex("COLORS", "h1", "(RED|BLUE)".to_string());
        cache.store_exact_key("HI", "", "", 1, "HI|||1".to_string());
        cache.invalidate_knowledge_base("h2");
        let stats = cache.stats();
        assert_eq!(stats.priority_entries, 0);
        assert_eq!(stats.set_regex_entries, 0);
        assert_eq!(stats.exact_key_entries, 0);
    }

    #[test]
    fn test_same_hash_does_not_clear() {
        let cache = MatchCache::default();
        cache.invalidate_knowledge_base("h1");
        cache.store_priority("P", compute_priority("P"));
        cache.invalidate_knowledge_base("h1");
        assert_eq!(cache.stats().priority_entries, 1);
    }

    #[test]
    fn test_set_invalidation_is_targeted() {
        let cache = MatchCache::default();
        cache.store_set_regex("COLORS", "h1", "(RED)".to_string());
        cache.store_set_regex("ANIMALS", "h1", "(CAT)".to_string());
        let outcome = WildcardOutcome {
            matched: true,
            bindings: vec![],
            regex: String::new(),
        };
        cache.store_wildcard_outcome("I LIKE RED", "I LIKE <set>COLORS</set>", outcome.clone());
        cache.store_wildcard_outcome("I LIKE CATS", "I LIKE *", outcome);

        cache.invalidate_set("colors");

        assert!(cache.set_regex("COLORS", "h1").is_none());
        assert!(cache.set_regex("ANIMALS", "h1").is_some());
        assert!(cache
            .wildcard_outcome("I LIKE RED", "I LIKE <set>COLORS</set>")
            .is_none());
        assert!(cache.wildcard_outcome("I LIKE CATS", "I LIKE *").is_some());
    }

    #[test]
    fn test_stats_track_hits_and_misses() {
        let cache = MatchCache::default();
        cache.store_priority("P", compute_priority("P"));
        let _ = cache.priority("P"); // hit
        let _ = cache.priority("Q"); // miss
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }
}
