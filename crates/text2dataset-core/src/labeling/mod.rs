//! Sentence labeling: entity recognizers, keyword extraction and topic
//! classification, combined per mode by [`LabelPipeline`].

mod classifier;
mod filter;
mod keywords;
mod ner;
mod patterns;
mod pipeline;
mod recognizer;

pub use classifier::{
    category_label, Classification, LexiconClassifier, ZeroShotClassifier, CATEGORY_LABELS,
    FALLBACK_LABEL,
};
pub use filter::{is_meaningful_entity, is_stop_word, STOP_WORDS};
pub use keywords::{KeywordExtractor, DEFAULT_TOP_K};
pub use ner::RuleNer;
pub use patterns::{ExtractionPattern, PatternRecognizer};
pub use pipeline::{LabelOutput, LabelPipeline};
pub use recognizer::{resolve_overlaps, LabelError, LabelResult, Recognizer, Span};
