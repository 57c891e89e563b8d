use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::filter::is_stop_word;
use super::recognizer::{LabelResult, Recognizer, Span};

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z'-]*").expect("valid regex"));

pub const DEFAULT_TOP_K: usize = 3;
const MAX_PHRASE_WORDS: usize = 4;

/// RAKE keyword extraction: candidate phrases are runs of content words
/// between stop words and punctuation, scored by word degree over frequency.
pub struct KeywordExtractor {
    top_k: usize,
}

struct Candidate {
    start: usize,
    end: usize,
    words: Vec<String>,
}

impl KeywordExtractor {
    #[must_use]
    pub const fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    fn candidates(sentence: &str) -> Vec<Candidate> {
        let mut out = Vec::new();
        let mut current: Option<Candidate> = None;
        let mut last_end = 0;

        for m in WORD.find_iter(sentence) {
            let gap = &sentence[last_end..m.start()];
            let delimited = gap.chars().any(|c| !c.is_whitespace());
            last_end = m.end();

            let word = m.as_str().to_lowercase();
            let is_delimiter = is_stop_word(&word) || word.chars().count() < 2;

            if delimited || is_delimiter {
                out.extend(current.take());
            }
            if is_delimiter {
                continue;
            }

            match current.as_mut() {
                Some(c) if c.words.len() < MAX_PHRASE_WORDS => {
                    c.end = m.end();
                    c.words.push(word);
                }
                _ => {
                    out.extend(current.take());
                    current = Some(Candidate {
                        start: m.start(),
                        end: m.end(),
                        words: vec![word],
                    });
                }
            }
        }
        out.extend(current);
        out
    }
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_K)
    }
}

impl Recognizer for KeywordExtractor {
    fn name(&self) -> &str {
        "rake"
    }

    fn recognize(&self, sentence: &str) -> LabelResult<Vec<Span>> {
        let candidates = Self::candidates(sentence);

        let mut frequency: HashMap<&str, f64> = HashMap::new();
        let mut degree: HashMap<&str, f64> = HashMap::new();
        for c in &candidates {
            #[allow(clippy::cast_precision_loss)]
            let co_occurring = (c.words.len() - 1) as f64;
            for w in &c.words {
                *frequency.entry(w.as_str()).or_default() += 1.0;
                *degree.entry(w.as_str()).or_default() += co_occurring;
            }
        }

        let word_score =
            |w: &str| (degree.get(w).copied().unwrap_or(0.0) + frequency[w]) / frequency[w];

        let mut scored: Vec<(f64, &Candidate)> = candidates
            .iter()
            .map(|c| (c.words.iter().map(|w| word_score(w)).sum(), c))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.start.cmp(&b.1.start)));

        let mut spans: Vec<Span> = Vec::new();
        for (_, c) in scored {
            if spans.len() == self.top_k {
                break;
            }
            let phrase = c.words.join(" ");
            if spans.iter().any(|s| s.text.to_lowercase() == phrase) {
                continue;
            }
            spans.push(Span::new(sentence, c.start, c.end, "KEYWORD"));
        }
        spans.sort_by_key(|s| s.start);
        Ok(spans)
    }
}
