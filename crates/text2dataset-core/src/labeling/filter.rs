/// Function words that are never entities and that delimit keyword phrases.
pub const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "just", "may", "me", "might", "more", "most", "must", "my", "myself", "no", "nor",
    "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves",
    "out", "over", "own", "same", "she", "should", "so", "some", "such", "than", "that", "the",
    "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "very", "was", "we", "were", "what", "when",
    "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you", "your",
    "yours", "yourself", "yourselves", "said", "says", "many", "much", "one", "two",
];

const CURRENCY_SYMBOLS: &[char] = &['$', '£', '€', '¥'];
const CURRENCY_WORDS: &[&str] = &[
    "dollar", "pound", "euro", "yen", "usd", "gbp", "eur", "jpy",
];

#[must_use]
pub fn is_stop_word(word: &str) -> bool {
    let lower = word.to_lowercase();
    STOP_WORDS.contains(&lower.as_str())
}

/// Reject spans that carry no information as an entity.
#[must_use]
pub fn is_meaningful_entity(entity: &str, label: &str) -> bool {
    let entity = entity.trim();
    if entity.is_empty() {
        return false;
    }

    let is_money = label == "MONEY";
    let has_currency_symbol = entity.contains(CURRENCY_SYMBOLS);

    if entity.chars().count() <= 1 {
        return is_money && has_currency_symbol;
    }

    if entity.chars().all(|c| !c.is_alphabetic()) {
        // Digits and symbols only: fine for labels that are numeric by nature.
        return match label {
            "MONEY" => has_currency_symbol,
            "DATE" | "TIME" | "PERCENT" | "PHONE" => entity.chars().any(|c| c.is_ascii_digit()),
            _ => false,
        };
    }

    if is_stop_word(entity) {
        return false;
    }

    let punctuation = entity
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count();
    if punctuation * 2 > entity.chars().count() {
        return false;
    }

    if is_money {
        let lower = entity.to_lowercase();
        return has_currency_symbol || CURRENCY_WORDS.iter().any(|w| lower.contains(w));
    }

    true
}
