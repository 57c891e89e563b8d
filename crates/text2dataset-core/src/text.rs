//! Input cleaning and sentence splitting.

use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Abbreviations after which a period does not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "mt", "inc", "ltd", "co", "corp", "vs",
    "etc", "e.g", "i.e", "no", "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep", "sept",
    "oct", "nov", "dec", "u.s", "u.k", "gen", "gov", "sen", "rep",
];

/// Collapse whitespace runs to a single space and trim.
#[must_use]
pub fn clean_text(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Replace typographic symbols with their ASCII forms, then [`clean_text`].
#[must_use]
pub fn normalize_symbols(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{201c}' | '\u{201d}' | '\u{201e}' => out.push('"'),
            '\u{2018}' | '\u{2019}' | '\u{201a}' => out.push('\''),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{00a0}' => out.push(' '),
            '\u{2026}' => out.push_str("..."),
            _ => out.push(c),
        }
    }
    clean_text(&out)
}

/// Split cleaned text into sentences.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        let (_, c) = chars[i];
        if !matches!(c, '.' | '!' | '?') {
            i += 1;
            continue;
        }

        let terminator_at = i;
        let mut end = i + 1;
        while end < chars.len() && matches!(chars[end].1, '.' | '!' | '?' | '"' | '\'' | ')') {
            end += 1;
        }

        let boundary = end >= chars.len()
            || (chars[end].1.is_whitespace()
                && next_starts_sentence(&chars, end)
                && !(c == '.' && is_abbreviation(text, chars[terminator_at].0)));

        if boundary {
            let byte_end = chars.get(end).map_or(text.len(), |&(b, _)| b);
            push_sentence(&mut sentences, &text[start..byte_end]);
            start = byte_end;
        }
        i = end;
    }

    if start < text.len() {
        push_sentence(&mut sentences, &text[start..]);
    }
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}

fn next_starts_sentence(chars: &[(usize, char)], from: usize) -> bool {
    chars[from..]
        .iter()
        .map(|&(_, c)| c)
        .find(|c| !c.is_whitespace())
        .is_none_or(|c| c.is_uppercase() || c.is_ascii_digit() || matches!(c, '"' | '\'' | '('))
}

/// Whether the word ending at byte offset `dot` is a known abbreviation or
/// a single-letter initial.
fn is_abbreviation(text: &str, dot: usize) -> bool {
    let before = &text[..dot];
    let word_start = before
        .rfind(|c: char| c.is_whitespace() || c == '(' || c == '"')
        .map_or(0, |p| p + 1);
    let word = before[word_start..].to_lowercase();

    if word.chars().count() == 1 && word.chars().all(char::is_alphabetic) {
        return true;
    }
    ABBREVIATIONS.contains(&word.as_str())
}
