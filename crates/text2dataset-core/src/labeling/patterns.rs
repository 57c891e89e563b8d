use regex::Regex;

use super::recognizer::{LabelResult, Recognizer, Span};

pub struct ExtractionPattern {
    pub label: String,
    pub regex: Regex,
}

impl ExtractionPattern {
    /// If the pattern has a first capture group, only that group is labeled.
    pub fn new(label: &str, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            label: label.to_string(),
            regex: Regex::new(pattern)?,
        })
    }

    pub(crate) fn find_spans(&self, sentence: &str, out: &mut Vec<Span>) {
        for caps in self.regex.captures_iter(sentence) {
            let Some(m) = caps.get(1).or_else(|| caps.get(0)) else {
                continue;
            };
            let (start, end) = trim_span(sentence, m.start(), m.end());
            if start < end {
                out.push(Span::new(sentence, start, end, self.label.clone()));
            }
        }
    }
}

/// Compile `(label, regex)` pairs, skipping any that fail to compile.
pub(crate) fn compile_all(defs: &[(&str, &str)]) -> Vec<ExtractionPattern> {
    defs.iter()
        .filter_map(|&(label, pattern)| match ExtractionPattern::new(label, pattern) {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!(label, error = %e, "Skipping invalid pattern");
                None
            }
        })
        .collect()
}

/// Drop surrounding whitespace from a match.
fn trim_span(sentence: &str, start: usize, end: usize) -> (usize, usize) {
    let slice = &sentence[start..end];
    let leading = slice.len() - slice.trim_start().len();
    let trailing = slice.len() - slice.trim_end().len();
    if leading + trailing >= slice.len() {
        return (start, start);
    }
    (start + leading, end - trailing)
}

/// Regex-only recognizer for things named-entity heuristics do not cover.
pub struct PatternRecognizer {
    patterns: Vec<ExtractionPattern>,
}

impl PatternRecognizer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: ExtractionPattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    /// Emails, URLs and North American phone numbers.
    #[must_use]
    pub fn with_default_patterns() -> Self {
        let defaults = [
            ("EMAIL", r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"),
            ("URL", r#"\bhttps?://[^\s<>"]*[^\s<>".,;:!?)']"#),
            (
                "PHONE",
                r"(?:\+?1[-.\s]?)?(?:\(\d{3}\)|\b\d{3})[-.\s]?\d{3}[-.\s]?\d{4}\b",
            ),
        ];

        Self {
            patterns: compile_all(&defaults),
        }
    }

    #[must_use]
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

impl Default for PatternRecognizer {
    fn default() -> Self {
        Self::with_default_patterns()
    }
}

impl Recognizer for PatternRecognizer {
    fn name(&self) -> &str {
        "patterns"
    }

    fn is_available(&self) -> bool {
        !self.patterns.is_empty()
    }

    fn recognize(&self, sentence: &str) -> LabelResult<Vec<Span>> {
        let mut spans = Vec::new();
        for pattern in &self.patterns {
            pattern.find_spans(sentence, &mut spans);
        }
        Ok(spans)
    }
}
