// Normalization laws and the contraction table, exercised end to end.

use parlance_core::normalize::{
    expand_contractions, normalize_for_matching, normalize_pattern, normalize_utterance,
};
use pretty_assertions::assert_eq;

#[test]
fn test_contraction_sentence() {
    assert_eq!(
        expand_contractions("I'm sure you'll understand why we can't do it"),
        "I am sure you will understand why we cannot do it"
    );
}

#[test]
fn test_contraction_table() {
    // (input, expected) pairs from the required table.
    let cases = [
        ("I'm", "I am"),
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
        ("I'd", "I would"),
        ("he'd", "he would"),
        ("she'd", "she would"),
        ("it'd", "it would"),
        ("you'd", "you had"),
        ("we'd", "we had"),
        ("they'd", "they had"),
        ("I'll", "I will"),
        ("I've", "I have"),
        ("isn't", "is not"),
    ];
    for (input, expected) in cases {
        assert_eq!(expand_contractions(input), expected, "input: {input}");
    }
}

#[test]
fn test_unrecognized_apostrophes_untouched() {
    assert_eq!(expand_contractions("rock 'n' roll"), "rock 'n' roll");
    assert_eq!(expand_contractions("the cat's whiskers"), "the cat's whiskers");
    assert_eq!(expand_contractions("'"), "'");
}

#[test]
fn test_pattern_normalization_idempotent_on_fixtures() {
    let fixtures = [
        "HELLO",
        "i like *",
        "_ knows #",
        "my favorite <set>colors</set> ^",
        "What's   up,  friend?!",
        "<topic> small talk </topic> *",
        "",
        "***",
        "é gauche",
    ];
    for s in fixtures {
        let once = normalize_pattern(s);
        assert_eq!(normalize_pattern(&once), once, "input: {s}");
    }
}

#[test]
fn test_matching_fold_is_uppercased_utterance_fold() {
    for s in ["Hello, World!", "I'm here.", "café ☕ break"] {
        assert_eq!(
            normalize_for_matching(s),
            normalize_utterance(s).to_uppercase()
        );
    }
}

#[test]
fn test_utterance_fold_keeps_case_for_captures() {
    assert_eq!(normalize_utterance("I like Pizza!"), "I like Pizza");
    assert_eq!(normalize_for_matching("I like Pizza!"), "I LIKE PIZZA");
}
