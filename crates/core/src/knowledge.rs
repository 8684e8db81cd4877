// crates/core/src/knowledge.rs
//! The knowledge base: categories plus their exact-match index, named word
//! sets and topics, maps, bot properties, property defaults, and
//! substitution tables.
//!
//! Mostly read-only after load. The learning manager appends categories
//! through `add_category`; every mutation that can affect matching bumps
//! the content hash so the match cache can detect staleness.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::ast::Node;
use crate::error::CategoryError;
use crate::normalize::{normalize_for_matching, normalize_pattern, SubstitutionTable};
use crate::pattern::{compute_priority, PatternPriority};

/// One pattern/template rule.
#[derive(Debug, Clone)]
pub struct Category {
    /// Normalized pattern text.
    pub pattern: String,
    /// Normalized that-context pattern; empty matches anything.
    pub that: String,
    /// Normalized topic pattern; empty matches anything.
    pub topic: String,
    /// Parsed template, read-only after construction.
    pub template: Vec<Node>,
    /// Derived match priority.
    pub priority: PatternPriority,
}

impl Category {
    /// Build a category, normalizing the three patterns and deriving the
    /// priority. Rejects patterns that normalize to nothing.
    pub fn new(
        pattern: &str,
        that: &str,
        topic: &str,
        template: Vec<Node>,
    ) -> Result<Self, CategoryError> {
        let pattern = normalize_pattern(pattern);
        if pattern.is_empty() {
            return Err(CategoryError::EmptyPattern);
        }
        let priority = compute_priority(&pattern);
        Ok(Self {
            pattern,
            that: normalize_pattern(that),
            topic: normalize_pattern(topic),
            template,
            priority,
        })
    }

    /// The index key for this category (that-index 1).
    pub fn key(&self) -> String {
        exact_key(&self.pattern, &self.topic, &self.that, 1)
    }
}

/// Normalized exact-match index key.
pub fn exact_key(pattern: &str, topic: &str, that: &str, that_index: usize) -> String {
    format!("{pattern}|{topic}|{that}|{that_index}")
}

/// An ordered set of normalized uppercase entries. Iteration follows
/// insertion order; membership is case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct WordSet {
    words: Vec<String>,
    members: HashSet<String>,
}

impl WordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a word (normalized). Duplicates are ignored; returns whether
    /// the set changed.
    pub fn add(&mut self, word: &str) -> bool {
        let folded = normalize_for_matching(word);
        if folded.is_empty() || self.members.contains(&folded) {
            return false;
        }
        self.members.insert(folded.clone());
        self.words.push(folded);
        true
    }

    pub fn contains(&self, word: &str) -> bool {
        self.members.contains(&normalize_for_matching(word))
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl FromIterator<String> for WordSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut set = WordSet::new();
        for word in iter {
            set.add(&word);
        }
        set
    }
}

/// The aggregate ruleset: categories + index + auxiliary data.
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    categories: Vec<Category>,
    index: HashMap<String, usize>,
    sets: HashMap<String, WordSet>,
    topics: HashMap<String, WordSet>,
    maps: HashMap<String, BTreeMap<String, String>>,
    properties: HashMap<String, String>,
    pdefaults: HashMap<String, String>,
    substitutions: HashMap<String, SubstitutionTable>,
    content_hash: String,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        let mut kb = Self::default();
        kb.content_hash = blake3::hash(b"parlance/empty").to_hex().to_string();
        kb
    }

    /// Insert a category. A duplicate `(pattern, that, topic)` triple
    /// overwrites the previous entry in place (last-write-wins, original
    /// position retained so first-insertion tie-breaking is stable).
    pub fn add_category(&mut self, category: Category) {
        let key = category.key();
        match self.index.get(&key) {
            Some(&pos) => {
                tracing::debug!(%key, "replacing duplicate category");
                self.categories[pos] = category;
            }
            None => {
                self.index.insert(key.clone(), self.categories.len());
                self.categories.push(category);
            }
        }
        self.bump_hash(&key);
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Exact-index lookup by precomputed key.
    pub fn lookup_exact(&self, key: &str) -> Option<&Category> {
        self.index.get(key).map(|&pos| &self.categories[pos])
    }

    /// Position of the category stored under `key`, if any.
    pub fn lookup_exact_index(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn category(&self, index: usize) -> Option<&Category> {
        self.categories.get(index)
    }

    // ── Sets and topics ────────────────────────────────────────────────

    pub fn set(&self, name: &str) -> Option<&WordSet> {
        self.sets.get(&fold_name(name))
    }

    pub fn set_names(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    pub fn add_set_word(&mut self, set_name: &str, word: &str) {
        let name = fold_name(set_name);
        if self.sets.entry(name.clone()).or_default().add(word) {
            self.bump_hash(&format!("set:{name}"));
        }
    }

    pub fn insert_set(&mut self, set_name: &str, set: WordSet) {
        let name = fold_name(set_name);
        self.sets.insert(name.clone(), set);
        self.bump_hash(&format!("set:{name}"));
    }

    pub fn topic_list(&self, name: &str) -> Option<&WordSet> {
        self.topics.get(&fold_name(name))
    }

    pub fn insert_topic_list(&mut self, topic_name: &str, set: WordSet) {
        let name = fold_name(topic_name);
        self.topics.insert(name.clone(), set);
        self.bump_hash(&format!("topic:{name}"));
    }

    // ── Maps, properties, substitutions ────────────────────────────────

    pub fn map(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.maps.get(&fold_name(name))
    }

    pub fn insert_map_entry(&mut self, map_name: &str, key: &str, value: &str) {
        self.maps
            .entry(fold_name(map_name))
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn set_property(&mut self, name: &str, value: &str) {
        self.properties.insert(name.to_string(), value.to_string());
    }

    pub fn pdefault(&self, name: &str) -> Option<&str> {
        self.pdefaults.get(name).map(String::as_str)
    }

    pub fn set_pdefault(&mut self, name: &str, value: &str) {
        self.pdefaults.insert(name.to_string(), value.to_string());
    }

    pub fn substitution(&self, name: &str) -> Option<&SubstitutionTable> {
        self.substitutions.get(&name.to_ascii_lowercase())
    }

    pub fn insert_substitution(&mut self, table: SubstitutionTable) {
        self.substitutions
            .insert(table.name().to_ascii_lowercase(), table);
    }

    // ── Staleness ──────────────────────────────────────────────────────

    /// Hash summarizing match-relevant content. Any category, set, or
    /// topic mutation produces a new value; the match cache compares it to
    /// decide whole-cache invalidation.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    fn bump_hash(&mut self, change: &str) {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.content_hash.as_bytes());
        hasher.update(change.as_bytes());
        self.content_hash = hasher.finalize().to_hex().to_string();
    }
}

fn fold_name(name: &str) -> String {
    name.trim().to_uppercase()
}
