// crates/engine/src/eval/text.rs
//! Text-formatting tags. Every function here is pure: inner text in,
//! transformed text out.

use parlance_core::normalize::project_case;
use parlance_core::Node;
use rand::seq::SliceRandom;

/// Dispatch a text-formatting tag by name. Returns `None` for names this
/// module does not own.
pub(crate) fn apply(name: &str, node: &Node, inner: &str) -> Option<String> {
    let out = match name {
        "uppercase" => inner.to_uppercase(),
        "lowercase" => inner.to_lowercase(),
        "formal" => formal(inner),
        "sentence" => sentence(inner),
        "word" => word_caps(inner),
        "capitalize" => capitalize(inner),
        "reverse" => inner.chars().rev().collect(),
        "trim" => inner.trim().to_string(),
        "explode" => explode(inner),
        "acronym" => acronym(inner),
        "pluralize" => pluralize(inner),
        "shuffle" => shuffle(inner),
        "length" => length(inner, node.attr("type").unwrap_or("characters")),
        "count" => count(inner, node.attr("search").unwrap_or("")).to_string(),
        "split" => split(
            inner,
            node.attr("delimiter").unwrap_or(" "),
            node.attr("limit").and_then(|l| l.trim().parse().ok()),
        ),
        "join" => join(inner, node.attr("delimiter").unwrap_or(" ")),
        "substring" => substring(
            inner,
            node.attr("start").and_then(|v| v.trim().parse().ok()),
            node.attr("end").and_then(|v| v.trim().parse().ok()),
        ),
        "replace" => inner.replace(
            node.attr("search").unwrap_or(""),
            node.attr("replace").unwrap_or(""),
        ),
        "indent" => indent(
            inner,
            node.attr("level").and_then(|v| v.trim().parse().ok()).unwrap_or(1),
            node.attr("char").unwrap_or(" "),
        ),
        "dedent" => dedent(
            inner,
            node.attr("level").and_then(|v| v.trim().parse().ok()).unwrap_or(1),
            node.attr("char").unwrap_or(" "),
        ),
        "first" => first(inner),
        "rest" => rest(inner),
        _ => return None,
    };
    Some(out)
}

/// Title-case every word: first letter up, rest lowered.
fn formal(s: &str) -> String {
    s.split_whitespace()
        .map(|w| capitalize(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Capitalize the first letter of each sentence (split on `.`, `!`, `?`);
/// everything else is untouched.
fn sentence(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = true;
    for c in s.chars() {
        if capitalize_next && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
            if matches!(c, '.' | '!' | '?') {
                capitalize_next = true;
            }
        }
    }
    out
}

/// Capitalize the first letter of every token, leaving the rest alone.
fn word_caps(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// First letter up, everything else lowered.
fn capitalize(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Insert a space between every pair of characters.
fn explode(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 2);
    let mut chars = s.chars();
    if let Some(first) = chars.next() {
        out.push(first);
        for c in chars {
            out.push(' ');
            out.push(c);
        }
    }
    out
}

/// First letter of each word, uppercased, concatenated.
fn acronym(s: &str) -> String {
    s.split_whitespace()
        .filter_map(|w| w.chars().next())
        .flat_map(|c| c.to_uppercase())
        .collect()
}

const IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("person", "people"),
    ("foot", "feet"),
    ("tooth", "teeth"),
    ("mouse", "mice"),
    ("goose", "geese"),
];

const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u'];

/// English pluralization: irregulars, `-es` after sibilants, `-ies` for
/// consonant+y, otherwise `-s`.
fn pluralize(s: &str) -> String {
    let word = s.trim();
    if word.is_empty() {
        return String::new();
    }
    let lower = word.to_lowercase();
    for (singular, plural) in IRREGULAR_PLURALS {
        if lower == *singular {
            return project_case(plural, word);
        }
    }
    let upper_suffix = word.chars().last().is_some_and(char::is_uppercase);
    let suffix = |base: &str| {
        if upper_suffix {
            base.to_uppercase()
        } else {
            base.to_string()
        }
    };
    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("sh")
        || lower.ends_with("ch")
    {
        return format!("{word}{}", suffix("es"));
    }
    if lower.ends_with('y') && lower.len() >= 2 {
        let before = lower.chars().rev().nth(1).unwrap_or('a');
        if before.is_alphabetic() && !VOWELS.contains(&before) {
            let stem = &word[..word.len() - 1];
            return format!("{stem}{}", suffix("ies"));
        }
    }
    format!("{word}{}", suffix("s"))
}

/// Random permutation of the whitespace-separated tokens.
fn shuffle(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.shuffle(&mut rand::rng());
    tokens.join(" ")
}

fn length(s: &str, kind: &str) -> String {
    let n = if kind.eq_ignore_ascii_case("words") {
        s.split_whitespace().count()
    } else {
        s.chars().count()
    };
    n.to_string()
}

/// Non-overlapping occurrence count via remove-and-divide; `aa` in
/// `aaaa` counts 2, not 3.
fn count(s: &str, search: &str) -> usize {
    if search.is_empty() {
        return 0;
    }
    (s.len() - s.replace(search, "").len()) / search.len()
}

/// Split on a delimiter, capping splits from the left when `limit` is
/// given; parts re-join on single spaces. An empty delimiter is a no-op.
fn split(s: &str, delimiter: &str, limit: Option<usize>) -> String {
    if delimiter.is_empty() {
        return s.to_string();
    }
    let parts: Vec<&str> = match limit {
        Some(n) => s.splitn(n + 1, delimiter).collect(),
        None => s.split(delimiter).collect(),
    };
    parts.join(" ")
}

/// Re-join whitespace-separated tokens with a delimiter (space when the
/// tag gives none, matching `<split>`'s default).
fn join(s: &str, delimiter: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(delimiter)
}

/// Byte-indexed substring, snapped down to char boundaries. An
/// out-of-range start returns the full text; start past end is empty.
fn substring(s: &str, start: Option<usize>, end: Option<usize>) -> String {
    let start = start.unwrap_or(0);
    if start > s.len() {
        return s.to_string();
    }
    let end = end.unwrap_or(s.len()).min(s.len());
    if start > end {
        return String::new();
    }
    let start = snap_to_boundary(s, start);
    let end = snap_to_boundary(s, end);
    s[start..end].to_string()
}

fn snap_to_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn indent(s: &str, level: usize, ch: &str) -> String {
    let prefix = ch.repeat(level);
    s.split('\n')
        .map(|line| format!("{prefix}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn dedent(s: &str, level: usize, ch: &str) -> String {
    s.split('\n')
        .map(|line| {
            let mut line = line;
            for _ in 0..level {
                match line.strip_prefix(ch) {
                    Some(rest) => line = rest,
                    None => break,
                }
            }
            line.to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// First whitespace-separated token.
fn first(s: &str) -> String {
    s.split_whitespace().next().unwrap_or("").to_string()
}

/// Everything after the first token.
fn rest(s: &str) -> String {
    let mut tokens = s.split_whitespace();
    tokens.next();
    tokens.collect::<Vec<_>>().join(" ")
}
