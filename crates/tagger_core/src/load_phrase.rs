//! Detection of the "accreditation instructions" message operators send once
//! a customer has loaded funds.
//!
//! Text is normalized first (accents folded, leetspeak digits mapped back to
//! letters, punctuation turned into spaces) and then tested against a short
//! list of phrases, most specific first.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Phrases that confirm a load, checked in order. Written in normalized form.
const LOAD_PHRASES: &[(&str, &str)] = &[
    (
        "full-instructions",
        "segui los pasos a continuacion para que tu acreditacion se procese sin demoras",
    ),
    ("follow-steps", "segui los pasos"),
    ("steps-below", "pasos a continuacion"),
    ("so-that-accreditation", "para que tu acreditacio"),
    ("accreditation", "acreditacion"),
    ("accreditation-typo", "acredigitacion"),
];

/// Substitutions folded before matching.
const LEET_FOLDS: &[(char, char)] = &[
    ('0', 'o'),
    ('1', 'i'),
    ('3', 'e'),
    ('4', 'a'),
    ('@', 'a'),
    ('$', 's'),
];

struct LoadPattern {
    name: &'static str,
    regex: Regex,
}

static PATTERNS: Lazy<Vec<LoadPattern>> = Lazy::new(|| {
    LOAD_PHRASES
        .iter()
        .map(|&(name, phrase)| {
            let tolerant = phrase
                .split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s*");
            LoadPattern {
                name,
                regex: Regex::new(&tolerant).expect("static load phrase"),
            }
        })
        .collect()
});

/// Lowercases, strips accents, folds leetspeak and replaces punctuation with
/// spaces so words never run together.
pub fn normalize_text(text: &str) -> String {
    let folded: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| {
            LEET_FOLDS
                .iter()
                .find(|(from, _)| *from == c)
                .map_or(c, |(_, to)| *to)
        })
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Name of the first phrase found in `text`, if any.
pub fn match_load_phrase(text: &str) -> Option<&'static str> {
    let normalized = normalize_text(text);
    PATTERNS
        .iter()
        .find(|pattern| pattern.regex.is_match(&normalized))
        .map(|pattern| pattern.name)
}
