// crates/engine/src/eval/person.rs
//! Pronoun substitution tags: `<person>`, `<gender>`, `<person2>`, and
//! `<denormalize>`.
//!
//! Swaps run as a single pass over word tokens, so a replacement is never
//! re-swapped ("I am" → "you are" and not back again). A knowledge-base
//! substitution table with the tag's name overrides the built-in map.

use parlance_core::normalize::project_case;
use parlance_core::KnowledgeBase;

/// First person ↔ second person. The reverse of `you` is the subject
/// form `I`.
const PERSON_SWAPS: &[(&str, &str)] = &[
    ("i'm", "you're"),
    ("i'll", "you'll"),
    ("i've", "you've"),
    ("i'd", "you'd"),
    ("you're", "I'm"),
    ("you'll", "I'll"),
    ("you've", "I've"),
    ("you'd", "I'd"),
    ("i", "you"),
    ("me", "you"),
    ("my", "your"),
    ("mine", "yours"),
    ("myself", "yourself"),
    ("you", "I"),
    ("your", "my"),
    ("yours", "mine"),
    ("yourself", "myself"),
    ("am", "are"),
    ("are", "am"),
];

/// Masculine ↔ feminine. `her` is ambiguous in English; this table keeps
/// the asymmetric `his→her`, `her→his` mapping.
const GENDER_SWAPS: &[(&str, &str)] = &[
    ("he", "she"),
    ("she", "he"),
    ("him", "her"),
    ("her", "his"),
    ("his", "her"),
    ("hers", "his"),
    ("himself", "herself"),
    ("herself", "himself"),
];

/// First person → third person plural. `was` is not tense-adjusted.
const PERSON2_SWAPS: &[(&str, &str)] = &[
    ("i'm", "they're"),
    ("i'll", "they'll"),
    ("i've", "they've"),
    ("i'd", "they'd"),
    ("i", "they"),
    ("me", "them"),
    ("my", "their"),
    ("mine", "theirs"),
    ("myself", "themselves"),
    ("am", "are"),
];

/// Apply the swap table for one of the three pronoun tags.
pub(crate) fn swap_tag(name: &str, inner: &str, kb: &KnowledgeBase) -> String {
    if let Some(table) = kb.substitution(name) {
        if !table.is_empty() {
            return table.apply(inner);
        }
    }
    let swaps = match name {
        "person" => PERSON_SWAPS,
        "gender" => GENDER_SWAPS,
        "person2" => PERSON2_SWAPS,
        _ => return inner.to_string(),
    };
    swap_words(inner, swaps)
}

/// Lowercase the inner text, capitalize its first letter, and close with
/// a period when no terminal punctuation is present.
pub(crate) fn denormalize(inner: &str, kb: &KnowledgeBase) -> String {
    let text = match kb.substitution("denormal") {
        Some(table) if !table.is_empty() => table.apply(inner),
        _ => inner.to_string(),
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let lower = trimmed.to_lowercase();
    let mut chars = lower.chars();
    let mut out: String = match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => return String::new(),
    };
    if !out.ends_with(['.', '!', '?']) {
        out.push('.');
    }
    out
}

/// Single-pass whole-word swap: each word token is looked up once and the
/// replacement never re-enters the table.
fn swap_words(text: &str, swaps: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word = String::new();
    for c in text.chars() {
        if c.is_alphanumeric() || c == '\'' {
            word.push(c);
        } else {
            flush_word(&mut word, swaps, &mut out);
            out.push(c);
        }
    }
    flush_word(&mut word, swaps, &mut out);
    out
}

fn flush_word(word: &mut String, swaps: &[(&str, &str)], out: &mut String) {
    if word.is_empty() {
        return;
    }
    let lower = word.to_ascii_lowercase();
    match swaps.iter().find(|(from, _)| *from == lower) {
        // The capital in "I"/"I'm" is English convention, not casing
        // intent; replacements keep their stored casing for those.
        Some((_, to)) if i_convention(word, &lower) => out.push_str(to),
        Some((_, to)) => out.push_str(&project_case(to, word)),
        None => out.push_str(word),
    }
    word.clear();
}

fn i_convention(word: &str, lower: &str) -> bool {
    (lower == "i" || lower.starts_with("i'")) && !all_caps(word)
}

fn all_caps(word: &str) -> bool {
    let mut letters = word.chars().filter(|c| c.is_alphabetic());
    match (letters.next(), letters.next()) {
        (Some(a), Some(b)) => {
            a.is_uppercase() && b.is_uppercase() && letters.all(|c| c.is_uppercase())
        }
        _ => false,
    }
}
