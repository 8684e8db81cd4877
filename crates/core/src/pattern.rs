// crates/core/src/pattern.rs
//! Pattern tokenization and match priority.
//!
//! A normalized pattern is a space-separated sequence of literal words,
//! wildcards (`*`, `_`, `^`, `#`), and `<set>NAME</set>` /
//! `<topic>NAME</topic>` references. The priority tuple breaks matcher
//! ties; exact patterns trump all wildcard patterns.

/// One token of a normalized pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternToken {
    /// A literal uppercase word.
    Word(String),
    /// `*` — one or more tokens, star priority.
    Star,
    /// `_` — one or more tokens, dollar priority.
    Underscore,
    /// `^` — zero or more tokens, star priority.
    Caret,
    /// `#` — zero or more tokens, dollar priority.
    Pound,
    /// `<set>NAME</set>` — alternation over a named knowledge-base set.
    SetRef(String),
    /// `<topic>NAME</topic>` — alternation over a named topic word list.
    TopicRef(String),
}

impl PatternToken {
    /// Wildcards consume a variable number of input tokens; words and
    /// set/topic references consume exactly one.
    pub fn is_wildcard(&self) -> bool {
        matches!(
            self,
            PatternToken::Star | PatternToken::Underscore | PatternToken::Caret | PatternToken::Pound
        )
    }

    /// `_` and `#` carry dollar priority and bind tighter than `*`/`^`.
    pub fn is_dollar(&self) -> bool {
        matches!(self, PatternToken::Underscore | PatternToken::Pound)
    }

    /// Wildcards that may match zero tokens.
    pub fn matches_empty(&self) -> bool {
        matches!(self, PatternToken::Caret | PatternToken::Pound)
    }
}

/// Split an already-normalized pattern into tokens.
pub fn tokenize_pattern(pattern: &str) -> Vec<PatternToken> {
    pattern
        .split_whitespace()
        .map(|tok| match tok {
            "*" => PatternToken::Star,
            "_" => PatternToken::Underscore,
            "^" => PatternToken::Caret,
            "#" => PatternToken::Pound,
            _ => {
                if let Some(name) = strip_reference(tok, "set") {
                    PatternToken::SetRef(name.to_string())
                } else if let Some(name) = strip_reference(tok, "topic") {
                    PatternToken::TopicRef(name.to_string())
                } else {
                    PatternToken::Word(tok.to_string())
                }
            }
        })
        .collect()
}

fn strip_reference<'a>(tok: &'a str, kind: &str) -> Option<&'a str> {
    let open = format!("<{kind}>");
    let close = format!("</{kind}>");
    tok.strip_prefix(open.as_str())
        .and_then(|rest| rest.strip_suffix(close.as_str()))
}

/// The priority tuple: compared lexicographically, higher wins.
///
/// Field order is the comparison order: wildcard absence, literal token
/// count, dollar-wildcard presence, first-wildcard position (later first
/// wildcard means a longer literal prefix and ranks higher; `u32::MAX`
/// when there is no wildcard), pattern text. Exactness leads because an
/// exact match trumps every wildcard match — a zero-width dollar pattern
/// can tie an exact pattern on literal count and must still lose.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PatternPriority {
    pub exact: bool,
    pub literal_tokens: u32,
    pub has_dollar: bool,
    pub first_wildcard: u32,
    pub text: String,
}

/// Compute the priority of a normalized pattern.
pub fn compute_priority(pattern: &str) -> PatternPriority {
    let tokens = tokenize_pattern(pattern);
    let literal_tokens = tokens
        .iter()
        .filter(|t| !t.is_wildcard())
        .count() as u32;
    let has_dollar = tokens.iter().any(PatternToken::is_dollar);
    let first_wildcard = tokens
        .iter()
        .position(PatternToken::is_wildcard)
        .map(|p| p as u32)
        .unwrap_or(u32::MAX);
    PatternPriority {
        exact: first_wildcard == u32::MAX,
        literal_tokens,
        has_dollar,
        first_wildcard,
        text: pattern.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tokenize_words_and_wildcards() {
        let tokens = tokenize_pattern("I LIKE * AND _");
        assert_eq!(
            tokens,
            vec![
                PatternToken::Word("I".to_string()),
                PatternToken::Word("LIKE".to_string()),
                PatternToken::Star,
                PatternToken::Word("AND".to_string()),
                PatternToken::Underscore,
            ]
        );
    }

    #[test]
    fn test_tokenize_references() {
        let tokens = tokenize_pattern("MY <set>COLORS</set> <topic>SPORTS</topic>");
        assert_eq!(
            tokens,
            vec![
                PatternToken::Word("MY".to_string()),
                PatternToken::SetRef("COLORS".to_string()),
                PatternToken::TopicRef("SPORTS".to_string()),
            ]
        );
    }

    #[test]
    fn test_exact_beats_wildcard() {
        let exact = compute_priority("HELLO THERE");
        let wild = compute_priority("HELLO *");
        assert!(exact > wild);
    }

    #[test]
    fn test_exact_beats_zero_width_dollar_with_equal_literals() {
        let exact = compute_priority("I LIKE HOT TEA");
        let padded = compute_priority("# I LIKE HOT TEA #");
        assert_eq!(exact.literal_tokens, padded.literal_tokens);
        assert!(exact > padded);
    }

    #[test]
    fn test_more_literals_beat_fewer() {
        let specific = compute_priority("I LIKE CATS *");
        let general = compute_priority("I LIKE *");
        assert!(specific > general);
    }

    #[test]
    fn test_dollar_binds_tighter() {
        let dollar = compute_priority("HELLO _");
        let star = compute_priority("HELLO *");
        assert!(dollar > star);
    }

    #[test]
    fn test_later_wildcard_ranks_higher() {
        let late = compute_priority("A B *");
        let early = compute_priority("A * B");
        assert!(late > early);
    }

    #[test]
    fn test_set_ref_counts_as_literal() {
        let with_set = compute_priority("I LIKE <set>COLORS</set>");
        let with_star = compute_priority("I LIKE *");
        assert!(with_set > with_star);
        assert!(with_set.exact);
    }
}
