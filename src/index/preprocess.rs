//! Text preprocessing for indexing
//!
//! Cleans raw page text into index terms: lowercasing, URL/email/number
//! removal, tokenization, stop-word filtering, and a simple
//! suffix-stripping stemmer.

use std::collections::HashMap;

/// Minimum term length kept after stemming
const MIN_WORD_LENGTH: usize = 3;

/// Common English stop words excluded from the index
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "were", "will", "with", "this", "but", "they",
    "have", "had", "what", "when", "where", "who", "which", "why", "how", "all", "each", "every",
    "both", "few", "more", "most", "other", "some", "such", "than", "too", "very", "can", "just",
    "should", "now", "been", "being", "would", "could", "also", "into", "only", "your", "our",
    "their", "not", "you", "we",
];

/// Suffixes stripped by the stemmer
const SUFFIXES: &[&str] = &[
    "ing", "ed", "ly", "er", "est", "tion", "ness", "ment", "able", "ible",
];

/// Cleans raw text: lowercase, drop URLs/emails/digits, collapse whitespace
pub fn preprocess(text: &str) -> String {
    let lowered = text.to_lowercase();

    let words: Vec<String> = lowered
        .split_whitespace()
        .filter(|w| !w.starts_with("http://") && !w.starts_with("https://") && !w.contains('@'))
        .map(|w| w.chars().filter(|c| !c.is_ascii_digit()).collect::<String>())
        .filter(|w| !w.is_empty())
        .collect();

    words.join(" ")
}

/// Splits preprocessed text into index terms
///
/// Non-alphabetic characters are stripped, short words and stop words are
/// dropped, and the remainder is stemmed.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();

    for raw in text.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation()) {
        let word: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_lowercase();

        if word.len() < MIN_WORD_LENGTH || is_stop_word(&word) {
            continue;
        }

        let stemmed = stem(&word);
        if stemmed.len() >= MIN_WORD_LENGTH {
            tokens.push(stemmed);
        }
    }

    tokens
}

/// Simple suffix-stripping stemmer
pub fn stem(word: &str) -> String {
    if word.len() <= 5 {
        return word.to_string();
    }

    for suffix in SUFFIXES {
        if word.ends_with(suffix) && word.len() > suffix.len() + 3 {
            return word[..word.len() - suffix.len()].to_string();
        }
    }

    word.to_string()
}

/// Checks whether a word is a stop word
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word.to_lowercase().as_str())
}

/// Counts term occurrences
pub fn term_frequency(tokens: &[String]) -> HashMap<String, u32> {
    let mut freq = HashMap::new();
    for token in tokens {
        *freq.entry(token.clone()).or_insert(0) += 1;
    }
    freq
}
