use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("No text to label")]
    EmptyInput,
    #[error("Labeling failed: {0}")]
    Failed(String),
}

pub type LabelResult<T> = Result<T, LabelError>;

/// A labeled region of a sentence. Offsets are byte offsets into the sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub label: String,
}

impl Span {
    #[must_use]
    pub fn new(sentence: &str, start: usize, end: usize, label: impl Into<String>) -> Self {
        Self {
            text: sentence[start..end].to_string(),
            start,
            end,
            label: label.into(),
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Anything that finds labeled spans in a single sentence.
pub trait Recognizer: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool {
        true
    }

    fn recognize(&self, sentence: &str) -> LabelResult<Vec<Span>>;
}

/// Keep the longest of any overlapping spans; earlier start wins ties.
/// The result is ordered by position.
#[must_use]
pub fn resolve_overlaps(mut spans: Vec<Span>) -> Vec<Span> {
    spans.sort_by(|a, b| b.len().cmp(&a.len()).then(a.start.cmp(&b.start)));

    let mut kept: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        if span.is_empty() || kept.iter().any(|k| k.overlaps(&span)) {
            continue;
        }
        kept.push(span);
    }

    kept.sort_by_key(|s| s.start);
    kept
}
