// crates/match/src/matcher.rs
//! The matcher: find the best category for `(input, topic, that)`.
//!
//! Exact-index fast path first, then a priority-ordered scan over the
//! categories whose topic/that context applies. No match is an `Option`,
//! never an error; the dispatcher decides the fallback.

use std::cmp::Reverse;
use std::collections::HashMap;

use parlance_core::normalize::{collapse_whitespace, normalize_utterance};
use parlance_core::{compute_priority, exact_key, tokenize_pattern, KnowledgeBase, PatternPriority};
use tracing::{debug, trace};

use crate::cache::{MatchCache, WildcardOutcome};
use crate::compile::{compile_pattern, CaptureKind};

/// A successful match: which category won and the wildcard bindings
/// captured along the way (`star1…`, `underscore1…`, `that_star1…`).
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub category_index: usize,
    pub bindings: HashMap<String, String>,
}

/// Priority lookup through the cache, computing and storing on miss.
pub fn cached_priority(cache: &MatchCache, pattern: &str) -> PatternPriority {
    match cache.priority(pattern) {
        Some(p) => p,
        None => {
            let p = compute_priority(pattern);
            cache.store_priority(pattern, p.clone());
            p
        }
    }
}

/// Find the highest-priority category matching the normalized input under
/// the given topic and that context.
pub fn find_match(
    kb: &KnowledgeBase,
    cache: &MatchCache,
    input: &str,
    topic: &str,
    that: &str,
    that_index: usize,
) -> Option<MatchResult> {
    cache.invalidate_knowledge_base(kb.content_hash());

    // Case-preserved folds: patterns match case-insensitively and wildcard
    // captures keep the utterance's original casing.
    let input_norm = fold_input(kb, input);
    let topic_norm = normalize_utterance(topic);
    let that_norm = normalize_utterance(that);
    if input_norm.is_empty() {
        return None;
    }

    // Exact fast path over the uppercased fold.
    let input_up = input_norm.to_uppercase();
    let topic_up = topic_norm.to_uppercase();
    let that_up = that_norm.to_uppercase();
    let key = match cache.exact_key(&input_up, &topic_up, &that_up, that_index) {
        Some(key) => key,
        None => {
            let key = exact_key(&input_up, &topic_up, &that_up, that_index);
            cache.store_exact_key(&input_up, &topic_up, &that_up, that_index, key.clone());
            key
        }
    };
    if let Some(index) = kb.lookup_exact_index(&key) {
        trace!(%key, "exact-index match");
        return Some(MatchResult {
            category_index: index,
            bindings: HashMap::new(),
        });
    }

    // Context-filtered, priority-ordered scan.
    let mut candidates: Vec<usize> = (0..kb.len())
        .filter(|&i| {
            let cat = &kb.categories()[i];
            context_applies(&cat.topic, &topic_norm, kb, cache)
                && context_applies(&cat.that, &that_norm, kb, cache)
        })
        .collect();
    // Equal pattern priorities: a category pinned to the current that or
    // topic context outranks an unconstrained one; then insertion order.
    candidates.sort_by_key(|&i| {
        let cat = &kb.categories()[i];
        let specificity = (!cat.that.is_empty()) as u8 + (!cat.topic.is_empty()) as u8;
        (
            Reverse(cached_priority(cache, &cat.pattern)),
            Reverse(specificity),
            i,
        )
    });

    for index in candidates {
        let cat = &kb.categories()[index];
        if let Some(captured) = run_pattern(&input_norm, &cat.pattern, kb, cache) {
            let mut bindings: HashMap<String, String> = captured.into_iter().collect();
            if !cat.that.is_empty() {
                if let Some(that_captures) = run_pattern(&that_norm, &cat.that, kb, cache) {
                    for (n, (_, value)) in that_captures.into_iter().enumerate() {
                        bindings.insert(format!("that_star{}", n + 1), value);
                    }
                }
            }
            debug!(pattern = %cat.pattern, "wildcard match");
            return Some(MatchResult {
                category_index: index,
                bindings,
            });
        }
    }
    None
}

/// Fold raw input and run it through the knowledge base's `normal`
/// substitution table when one is loaded.
fn fold_input(kb: &KnowledgeBase, input: &str) -> String {
    let norm = normalize_utterance(input);
    match kb.substitution("normal") {
        Some(table) => collapse_whitespace(&table.apply(&norm)),
        None => norm,
    }
}

/// An empty context pattern applies to anything; otherwise the context
/// value must match the pattern.
fn context_applies(pattern: &str, value: &str, kb: &KnowledgeBase, cache: &MatchCache) -> bool {
    pattern.is_empty() || run_pattern(value, pattern, kb, cache).is_some()
}

/// Run one pattern against one normalized input, via the wildcard cache.
/// Returns the ordered capture bindings on success.
fn run_pattern(
    input: &str,
    pattern: &str,
    kb: &KnowledgeBase,
    cache: &MatchCache,
) -> Option<Vec<(String, String)>> {
    if let Some(outcome) = cache.wildcard_outcome(input, pattern) {
        return outcome.matched.then_some(outcome.bindings);
    }

    let compiled = compile_pattern(&tokenize_pattern(pattern), kb, cache);
    let outcome = match compiled.build().and_then(|re| {
        re.captures(input)
            .map(|caps| extract_bindings(&compiled.captures, &caps))
    }) {
        Some(bindings) => WildcardOutcome {
            matched: true,
            bindings,
            regex: compiled.regex_text,
        },
        None => WildcardOutcome {
            matched: false,
            bindings: Vec::new(),
            regex: compiled.regex_text,
        },
    };
    cache.store_wildcard_outcome(input, pattern, outcome.clone());
    outcome.matched.then_some(outcome.bindings)
}

fn extract_bindings(
    kinds: &[CaptureKind],
    caps: &regex_lite::Captures<'_>,
) -> Vec<(String, String)> {
    let mut stars = 0usize;
    let mut underscores = 0usize;
    let mut bindings = Vec::with_capacity(kinds.len());
    for (i, kind) in kinds.iter().enumerate() {
        let value = caps
            .get(i + 1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        let name = match kind {
            CaptureKind::Star => {
                stars += 1;
                format!("star{stars}")
            }
            CaptureKind::Underscore => {
                underscores += 1;
                format!("underscore{underscores}")
            }
        };
        bindings.push((name, value));
    }
    bindings
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlance_core::{parse_template, Category};
    use pretty_assertions::assert_eq;

    fn kb_with(categories: &[(&str, &str, &str, &str)]) -> KnowledgeBase {
        let mut kb = KnowledgeBase::new();
        for (pattern, that, topic, template) in categories {
            kb.add_category(
                Category::new(pattern, that, topic, parse_template(template)).unwrap(),
            );
        }
        kb
    }

    fn template_of(kb: &KnowledgeBase, result: &MatchResult) -> String {
        parlance_core::nodes_inner_text(&kb.categories()[result.category_index].template)
    }

    #[test]
    fn test_exact_match() {
        let kb = kb_with(&[("HELLO", "", "", "Hi there!")]);
        let cache = MatchCache::default();
        let result = find_match(&kb, &cache, "hello", "", "", 1).unwrap();
        assert_eq!(template_of(&kb, &result), "Hi there!");
        assert!(result.bindings.is_empty());
    }

    #[test]
    fn test_wildcard_binding() {
        let kb = kb_with(&[("I LIKE *", "", "", "Glad you like it.")]);
        let cache = MatchCache::default();
        let result = find_match(&kb, &cache, "I like pizza", "", "", 1).unwrap();
        assert_eq!(result.bindings.get("star1").map(String::as_str), Some("pizza"));
    }

    #[test]
    fn test_exact_beats_wildcard() {
        let kb = kb_with(&[
            ("HELLO *", "", "", "wildcard"),
            ("HELLO THERE", "", "", "exact"),
        ]);
        let cache = MatchCache::default();
        let result = find_match(&kb, &cache, "hello there", "", "", 1).unwrap();
        assert_eq!(template_of(&kb, &result), "exact");
    }

    #[test]
    fn test_priority_prefers_more_literals() {
        let kb = kb_with(&[
            ("I LIKE *", "", "", "general"),
            ("I LIKE CATS *", "", "", "specific"),
        ]);
        let cache = MatchCache::default();
        let result = find_match(&kb, &cache, "i like cats a lot", "", "", 1).unwrap();
        assert_eq!(template_of(&kb, &result), "specific");
    }

    #[test]
    fn test_dollar_wildcard_outranks_star() {
        let kb = kb_with(&[("HELLO *", "", "", "star"), ("HELLO _", "", "", "dollar")]);
        let cache = MatchCache::default();
        let result = find_match(&kb, &cache, "hello friend", "", "", 1).unwrap();
        assert_eq!(template_of(&kb, &result), "dollar");
        assert_eq!(
            result.bindings.get("underscore1").map(String::as_str),
            Some("friend")
        );
    }

    #[test]
    fn test_tie_breaks_on_pattern_text() {
        let kb = kb_with(&[("HI *", "", "", "star"), ("HI ^", "", "", "caret")]);
        let cache = MatchCache::default();
        // Same literal count, same wildcard family and position; the
        // lexicographic text component decides ('^' sorts above '*').
        let result = find_match(&kb, &cache, "hi there", "", "", 1).unwrap();
        assert_eq!(template_of(&kb, &result), "caret");
    }

    #[test]
    fn test_topic_scoping() {
        let kb = kb_with(&[
            ("GO ON", "", "WEATHER", "More weather talk."),
            ("GO ON", "", "", "Generic continuation."),
        ]);
        let cache = MatchCache::default();
        let result = find_match(&kb, &cache, "go on", "weather", "", 1).unwrap();
        assert_eq!(template_of(&kb, &result), "More weather talk.");
        let result = find_match(&kb, &cache, "go on", "cooking", "", 1).unwrap();
        assert_eq!(template_of(&kb, &result), "Generic continuation.");
    }

    #[test]
    fn test_that_scoping_and_that_star() {
        let kb = kb_with(&[
            ("YES", "DO YOU LIKE *", "", "Good, a fan."),
            ("YES", "", "", "Yes to what?"),
        ]);
        let cache = MatchCache::default();
        let result = find_match(&kb, &cache, "yes", "", "Do you like pizza", 1).unwrap();
        assert_eq!(template_of(&kb, &result), "Good, a fan.");
        assert_eq!(
            result.bindings.get("that_star1").map(String::as_str),
            Some("pizza")
        );
        let result = find_match(&kb, &cache, "yes", "", "Anything else", 1).unwrap();
        assert_eq!(template_of(&kb, &result), "Yes to what?");
    }

    #[test]
    fn test_set_reference_matching() {
        let mut kb = kb_with(&[("I LIKE <set>COLORS</set>", "", "", "A fine color.")]);
        kb.add_set_word("colors", "red");
        kb.add_set_word("colors", "blue");
        let cache = MatchCache::default();
        let result = find_match(&kb, &cache, "I like blue", "", "", 1).unwrap();
        assert_eq!(template_of(&kb, &result), "A fine color.");
        assert_eq!(result.bindings.get("star1").map(String::as_str), Some("blue"));
        assert!(find_match(&kb, &cache, "I like turnips", "", "", 1).is_none());
    }

    #[test]
    fn test_no_match_is_none() {
        let kb = kb_with(&[("HELLO", "", "", "hi")]);
        let cache = MatchCache::default();
        assert!(find_match(&kb, &cache, "goodbye", "", "", 1).is_none());
        assert!(find_match(&kb, &cache, "", "", "", 1).is_none());
    }

    #[test]
    fn test_multiple_wildcards_number_left_to_right() {
        let kb = kb_with(&[("* LIKES *", "", "", "noted")]);
        let cache = MatchCache::default();
        let result = find_match(&kb, &cache, "alice likes bob", "", "", 1).unwrap();
        assert_eq!(result.bindings.get("star1").map(String::as_str), Some("alice"));
        assert_eq!(result.bindings.get("star2").map(String::as_str), Some("bob"));
    }

    #[test]
    fn test_repeated_input_hits_wildcard_cache() {
        let kb = kb_with(&[("I LIKE *", "", "", "ok")]);
        let cache = MatchCache::default();
        find_match(&kb, &cache, "I like pizza", "", "", 1).unwrap();
        let before = cache.stats().hits;
        find_match(&kb, &cache, "I like pizza", "", "", 1).unwrap();
        assert!(cache.stats().hits > before);
    }

    #[test]
    fn test_cached_priority_round_trip() {
        let cache = MatchCache::default();
        let p = cached_priority(&cache, "HELLO *");
        assert_eq!(cache.priority("HELLO *"), Some(p));
    }

    #[test]
    fn test_scan_populates_priority_cache() {
        let kb = kb_with(&[("I LIKE *", "", "", "ok"), ("I LIKE CATS *", "", "", "ok")]);
        let cache = MatchCache::default();
        find_match(&kb, &cache, "I like pizza", "", "", 1).unwrap();
        assert_eq!(cache.stats().priority_entries, 2);
        // The second scan ranks from the cache.
        let before = cache.stats().hits;
        find_match(&kb, &cache, "I like tea", "", "", 1).unwrap();
        assert!(cache.stats().hits > before);
    }
}
