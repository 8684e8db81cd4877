// crates/match/src/compile.rs
//! Compile a tokenized pattern into an anchored, case-insensitive regex
//! plus a capture plan describing which binding family each capture group
//! feeds (`starN` vs `underscoreN`).
//!
//! `*` and `_` match one or more tokens lazily; `^` and `#` match zero or
//! more. `<set>NAME</set>` / `<topic>NAME</topic>` expand to alternations
//! over the knowledge-base word lists; the alternation text is cached per
//! `(name, content-hash)`.

use parlance_core::{KnowledgeBase, PatternToken, WordSet};
use regex_lite::Regex;
use tracing::warn;

use crate::cache::MatchCache;

/// Which binding family a capture group feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    /// `*`, `^`, and set/topic references → `star1`, `star2`, …
    Star,
    /// `_` and `#` → `underscore1`, `underscore2`, …
    Underscore,
}

/// A compiled pattern: regex text and the capture plan, in group order.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub regex_text: String,
    pub captures: Vec<CaptureKind>,
}

impl CompiledPattern {
    /// Compile the regex text. Construction failures mean an
    /// unrepresentable alternation slipped through; the pattern then
    /// matches nothing.
    pub fn build(&self) -> Option<Regex> {
        match Regex::new(&self.regex_text) {
            Ok(re) => Some(re),
            Err(err) => {
                warn!(regex = %self.regex_text, %err, "pattern regex failed to compile");
                None
            }
        }
    }
}

/// Alternation that can never match, with one capture group so the
/// capture plan stays aligned.
const NEVER_MATCH: &str = "([^\\s\\S])";

/// Compile pattern tokens against the knowledge base's sets and topics.
pub fn compile_pattern(
    tokens: &[PatternToken],
    kb: &KnowledgeBase,
    cache: &MatchCache,
) -> CompiledPattern {
    let mut body = String::new();
    let mut captures = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            let zero_width = tokens[i - 1].matches_empty() || token.matches_empty();
            body.push_str(if zero_width { "\\s*" } else { " " });
        }
        match token {
            PatternToken::Word(word) => body.push_str(&escape_literal(word)),
            PatternToken::Star => {
                body.push_str("(.+?)");
                captures.push(CaptureKind::Star);
            }
            PatternToken::Underscore => {
                body.push_str("(.+?)");
                captures.push(CaptureKind::Underscore);
            }
            PatternToken::Caret => {
                body.push_str("(.*?)");
                captures.push(CaptureKind::Star);
            }
            PatternToken::Pound => {
                body.push_str("(.*?)");
                captures.push(CaptureKind::Underscore);
            }
            PatternToken::SetRef(name) => {
                body.push_str(&set_alternation(name, kb.set(name), kb, cache));
                captures.push(CaptureKind::Star);
            }
            PatternToken::TopicRef(name) => {
                body.push_str(&set_alternation(name, kb.topic_list(name), kb, cache));
                captures.push(CaptureKind::Star);
            }
        }
    }

    CompiledPattern {
        regex_text: format!("(?i)^{body}$"),
        captures,
    }
}

/// Build (or fetch) the capturing alternation for a named word list.
fn set_alternation(
    name: &str,
    words: Option<&WordSet>,
    kb: &KnowledgeBase,
    cache: &MatchCache,
) -> String {
    if let Some(cached) = cache.set_regex(name, kb.content_hash()) {
        return cached;
    }
    let alternation = match words {
        Some(set) if !set.is_empty() => {
            let alts: Vec<String> = set.words().iter().map(|w| escape_literal(w)).collect();
            format!("({})", alts.join("|"))
        }
        _ => {
            warn!(set = name, "pattern references a missing or empty set");
            NEVER_MATCH.to_string()
        }
    };
    cache.store_set_regex(name, kb.content_hash(), alternation.clone());
    alternation
}

/// Escape regex metacharacters in a literal. Normalized words are
/// alphanumeric, so this is defensive only for ASCII punctuation;
/// non-ASCII characters pass through unescaped (escaping them is a regex
/// error).
fn escape_literal(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    for c in word.chars() {
        if c.is_ascii() && !c.is_ascii_alphanumeric() && !c.is_ascii_whitespace() {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlance_core::tokenize_pattern;
    use pretty_assertions::assert_eq;

    fn compile(pattern: &str, kb: &KnowledgeBase) -> CompiledPattern {
        let cache = MatchCache::default();
        compile_pattern(&tokenize_pattern(pattern), kb, &cache)
    }

    #[test]
    fn test_literal_pattern() {
        let kb = KnowledgeBase::new();
        let compiled = compile("HELLO THERE", &kb);
        assert_eq!(compiled.regex_text, "(?i)^HELLO THERE$");
        assert!(compiled.captures.is_empty());
    }

    #[test]
    fn test_star_compiles_lazy_one_or_more() {
        let kb = KnowledgeBase::new();
        let compiled = compile("I LIKE *", &kb);
        assert_eq!(compiled.regex_text, "(?i)^I LIKE (.+?)$");
        assert_eq!(compiled.captures, vec![CaptureKind::Star]);

        let re = compiled.build().unwrap();
        let caps = re.captures("I LIKE PIZZA").unwrap();
        assert_eq!(&caps[1], "PIZZA");
        assert!(re.captures("I LIKE").is_none());
    }

    #[test]
    fn test_caret_matches_zero_tokens() {
        let kb = KnowledgeBase::new();
        let compiled = compile("HELLO ^", &kb);
        assert_eq!(compiled.regex_text, "(?i)^HELLO\\s*(.*?)$");
        let re = compiled.build().unwrap();
        assert!(re.is_match("HELLO"));
        let caps = re.captures("HELLO BIG WORLD").unwrap();
        assert_eq!(caps[1].trim(), "BIG WORLD");
    }

    #[test]
    fn test_interior_caret() {
        let kb = KnowledgeBase::new();
        let compiled = compile("A ^ B", &kb);
        let re = compiled.build().unwrap();
        assert!(re.is_match("A B"));
        let caps = re.captures("A X Y B").unwrap();
        assert_eq!(caps[1].trim(), "X Y");
    }

    #[test]
    fn test_underscore_feeds_underscore_family() {
        let kb = KnowledgeBase::new();
        let compiled = compile("_ IS #", &kb);
        assert_eq!(
            compiled.captures,
            vec![CaptureKind::Underscore, CaptureKind::Underscore]
        );
    }

    #[test]
    fn test_set_alternation() {
        let mut kb = KnowledgeBase::new();
        kb.add_set_word("colors", "red");
        kb.add_set_word("colors", "navy blue");
        let compiled = compile("I LIKE <set>COLORS</set>", &kb);
        assert_eq!(compiled.regex_text, "(?i)^I LIKE (RED|NAVY BLUE)$");
        let re = compiled.build().unwrap();
        let caps = re.captures("I LIKE NAVY BLUE").unwrap();
        assert_eq!(&caps[1], "NAVY BLUE");
    }

    #[test]
    fn test_missing_set_never_matches() {
        let kb = KnowledgeBase::new();
        let compiled = compile("I LIKE <set>NOPE</set>", &kb);
        let re = compiled.build().unwrap();
        assert!(!re.is_match("I LIKE ANYTHING"));
        assert_eq!(compiled.captures.len(), 1);
    }

    #[test]
    fn test_set_regex_cached_per_hash() {
        let mut kb = KnowledgeBase::new();
        kb.add_set_word("colors", "red");
        let cache = MatchCache::default();
        let tokens = tokenize_pattern("<set>COLORS</set>");
        compile_pattern(&tokens, &kb, &cache);
        assert_eq!(cache.stats().set_regex_entries, 1);
        assert!(cache.set_regex("COLORS", kb.content_hash()).is_some());
    }

    #[test]
    fn test_case_insensitive_matching() {
        let kb = KnowledgeBase::new();
        let compiled = compile("HELLO", &kb);
        let re = compiled.build().unwrap();
        assert!(re.is_match("hello"));
    }
}
