// crates/core/src/normalize.rs
//! Input and pattern normalization.
//!
//! Everything the matcher compares lives in one folded space: uppercase,
//! single-space separated, punctuation stripped, contractions expanded.
//! The contraction expander is word-boundary sensitive and longest-match
//! first; apostrophes that do not form a recognized contraction are left
//! untouched.

/// Full-token contractions, keyed by ASCII-lowercased token.
///
/// Replacements carry canonical English casing; `project_case` adapts them
/// to the source token's case. Irregulars (`won't`, `can't`, `shan't`,
/// `mustn't`) sit here so the generic `n't` suffix rule never sees them.
/// `'d` splits by subject: `I/he/she/it` take "would", `you/we/they` take
/// "had".
const FULL_CONTRACTIONS: &[(&str, &str)] = &[
    ("i'm", "I am"),
    ("you're", "you are"),
    ("he's", "he is"),
    ("she's", "she is"),
    ("it's", "it is"),
    ("we're", "we are"),
    ("they're", "they are"),
    ("don't", "do not"),
    ("won't", "will not"),
    ("can't", "cannot"),
    ("shan't", "shall not"),
    ("mustn't", "must not"),
    ("let's", "let us"),
    ("that's", "that is"),
    ("there's", "there is"),
    ("here's", "here is"),
    ("what's", "what is"),
    ("who's", "who is"),
    ("where's", "where is"),
    ("when's", "when is"),
    ("why's", "why is"),
    ("how's", "how is"),
    ("y'all", "you all"),
    ("ma'am", "madam"),
    ("o'clock", "of the clock"),
    ("i'd", "I would"),
    ("he'd", "he would"),
    ("she'd", "she would"),
    ("it'd", "it would"),
    ("you'd", "you had"),
    ("we'd", "we had"),
    ("they'd", "they had"),
];

/// Suffix contractions, tried longest-first after the full-token table.
const SUFFIX_CONTRACTIONS: &[(&str, &str)] = &[
    ("n't", " not"),
    ("'ll", " will"),
    ("'ve", " have"),
    ("'d", " would"),
];

/// Expand contractions without changing case (beyond what the replacement
/// itself requires). This is the case-preserving normalization used inside
/// case-sensitive substitutions.
pub fn expand_contractions(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    let mut word = String::new();
    for c in s.chars() {
        let c = if c == '\u{2019}' { '\'' } else { c };
        if c.is_alphanumeric() || c == '\'' {
            word.push(c);
        } else {
            if !word.is_empty() {
                out.push_str(&expand_word(&word));
                word.clear();
            }
            out.push(c);
        }
    }
    if !word.is_empty() {
        out.push_str(&expand_word(&word));
    }
    out
}

/// Alias kept close to the operation names the rest of the system speaks:
/// contraction expansion with the source casing intact.
pub fn normalize_for_matching_case_preserving(s: &str) -> String {
    expand_contractions(s)
}

/// Fold an utterance for matching without changing case: expand
/// contractions, strip punctuation to spaces, collapse whitespace.
///
/// The matcher runs case-insensitive regexes over this form so wildcard
/// captures keep the speaker's original casing.
pub fn normalize_utterance(s: &str) -> String {
    let expanded = expand_contractions(s);
    let mut folded = String::with_capacity(expanded.len());
    for c in expanded.chars() {
        if c.is_alphanumeric() {
            folded.push(c);
        } else {
            folded.push(' ');
        }
    }
    collapse_whitespace(&folded)
}

/// Fold an input string into the canonical matching space: the utterance
/// fold plus uppercasing. Diacritics survive (`é` → `É`); only
/// non-alphanumeric characters fold to spaces.
pub fn normalize_for_matching(s: &str) -> String {
    normalize_utterance(s).to_uppercase()
}

/// Normalize a pattern: uppercase, collapse whitespace, strip punctuation,
/// preserving the wildcard tokens `*`, `_`, `^`, `#` and the
/// `<set>NAME</set>` / `<topic>NAME</topic>` references as atomic tokens.
///
/// Idempotent: normalizing a normalized pattern is a no-op.
pub fn normalize_pattern(s: &str) -> String {
    let shadow = s.to_ascii_lowercase();
    let mut tokens: Vec<String> = Vec::new();
    let mut plain = String::new();
    let mut i = 0;

    while i < s.len() {
        let rest = &shadow[i..];
        let reference = if rest.starts_with("<set>") {
            Some(("set", "</set>"))
        } else if rest.starts_with("<topic>") {
            Some(("topic", "</topic>"))
        } else {
            None
        };

        if let Some((kind, close)) = reference {
            let open_len = kind.len() + 2;
            if let Some(end) = shadow[i + open_len..].find(close) {
                flush_plain_tokens(&mut plain, &mut tokens);
                let inner = &s[i + open_len..i + open_len + end];
                let name = fold_reference_name(inner);
                tokens.push(format!("<{kind}>{name}</{kind}>"));
                i += open_len + end + close.len();
                continue;
            }
        }

        // Safe: i always lands on a char boundary (ASCII scanning above).
        let c = s[i..].chars().next().unwrap();
        if c.is_alphanumeric() {
            plain.extend(c.to_uppercase());
        } else if matches!(c, '*' | '_' | '^' | '#') {
            plain.push(' ');
            plain.push(c);
            plain.push(' ');
        } else {
            plain.push(' ');
        }
        i += c.len_utf8();
    }
    flush_plain_tokens(&mut plain, &mut tokens);
    tokens.join(" ")
}

fn flush_plain_tokens(plain: &mut String, tokens: &mut Vec<String>) {
    for tok in plain.split_whitespace() {
        tokens.push(tok.to_string());
    }
    plain.clear();
}

fn fold_reference_name(inner: &str) -> String {
    let mut name = String::with_capacity(inner.len());
    for c in inner.chars() {
        if c.is_alphanumeric() {
            name.extend(c.to_uppercase());
        }
    }
    name
}

/// Collapse runs of whitespace to single spaces and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn expand_word(word: &str) -> String {
    if !word.contains('\'') {
        return word.to_string();
    }
    let lower = word.to_ascii_lowercase();
    for (from, to) in FULL_CONTRACTIONS {
        if lower == *from {
            return project_case(to, word);
        }
    }
    for (suffix, replacement) in SUFFIX_CONTRACTIONS {
        if lower.len() > suffix.len() && lower.ends_with(suffix) {
            // ASCII suffix: byte offsets line up between word and shadow.
            let stem = &word[..word.len() - suffix.len()];
            if stem.chars().any(|c| c.is_alphanumeric()) {
                let tail = if is_all_caps(word) {
                    replacement.to_uppercase()
                } else {
                    (*replacement).to_string()
                };
                return format!("{stem}{tail}");
            }
        }
    }
    word.to_string()
}

/// Project `original`'s casing onto `replacement`: all-caps originals
/// uppercase the whole replacement, capitalized originals capitalize its
/// first letter, anything else leaves the replacement's canonical casing.
pub fn project_case(replacement: &str, original: &str) -> String {
    if is_all_caps(original) {
        return replacement.to_uppercase();
    }
    let first_upper = original
        .chars()
        .find(|c| c.is_alphabetic())
        .map(|c| c.is_uppercase())
        .unwrap_or(false);
    if first_upper {
        capitalize_first(replacement)
    } else {
        replacement.to_string()
    }
}

fn is_all_caps(word: &str) -> bool {
    let mut letters = word.chars().filter(|c| c.is_alphabetic());
    let first = match letters.next() {
        Some(c) => c,
        None => return false,
    };
    let mut count = 1;
    let mut all_upper = first.is_uppercase();
    for c in letters {
        count += 1;
        all_upper &= c.is_uppercase();
    }
    count > 1 && all_upper
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A named, ordered substitution table (`normal`, `person`, `gender`, …).
///
/// Rules apply as whole-word replacements in the order they appear, each
/// over the output of the previous one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubstitutionTable {
    name: String,
    rules: Vec<(String, String)>,
}

impl SubstitutionTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn push_rule(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.rules.push((from.into(), to.into()));
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rules.iter().map(|(f, t)| (f.as_str(), t.as_str()))
    }

    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (from, to) in &self.rules {
            out = replace_whole_word(&out, from, to);
        }
        out
    }
}

/// Replace every whole-word occurrence of `from` in `text` with `to`,
/// case-insensitively. `from` may span multiple words ("WITH YOU");
/// boundaries are non-alphanumeric characters or the string ends.
pub fn replace_whole_word(text: &str, from: &str, to: &str) -> String {
    if from.is_empty() {
        return text.to_string();
    }
    let shadow = text.to_ascii_lowercase();
    let needle = from.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < text.len() {
        if let Some(found) = shadow[i..].find(&needle) {
            let start = i + found;
            let end = start + needle.len();
            let boundary_before = start == 0
                || !shadow[..start]
                    .chars()
                    .next_back()
                    .is_some_and(char::is_alphanumeric);
            let boundary_after = end == shadow.len()
                || !shadow[end..].chars().next().is_some_and(char::is_alphanumeric);
            if boundary_before && boundary_after {
                out.push_str(&text[i..start]);
                out.push_str(to);
                i = end;
                continue;
            }
            // Mid-word hit: emit up to and including the first matched
            // character, then rescan.
            let step = shadow[start..]
                .chars()
                .next()
                .map(char::len_utf8)
                .unwrap_or(1);
            out.push_str(&text[i..start + step]);
            i = start + step;
        } else {
            out.push_str(&text[i..]);
            break;
        }
    }
    out
}
