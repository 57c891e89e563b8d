use std::collections::HashSet;

use super::classifier::{category_label, LexiconClassifier, ZeroShotClassifier, CATEGORY_LABELS};
use super::filter::is_meaningful_entity;
use super::keywords::KeywordExtractor;
use super::ner::RuleNer;
use super::patterns::PatternRecognizer;
use super::recognizer::{resolve_overlaps, LabelError, LabelResult, Recognizer};
use crate::dataset::{LabelMode, LabeledRow};
use crate::text::{normalize_symbols, split_sentences};

/// Result of labeling one input text.
#[derive(Debug, Clone)]
pub struct LabelOutput {
    pub sentence_count: usize,
    pub rows: Vec<LabeledRow>,
}

/// Runs the recognizers for a mode over a list of sentences.
pub struct LabelPipeline {
    entities: Box<dyn Recognizer>,
    patterns: Box<dyn Recognizer>,
    keywords: Box<dyn Recognizer>,
    classifier: Box<dyn ZeroShotClassifier>,
    categories: Vec<String>,
}

/// Collects rows for one sentence, skipping noise and duplicates.
struct SentenceRows<'a> {
    sentence: &'a str,
    seen: HashSet<(String, String)>,
    rows: Vec<LabeledRow>,
}

impl<'a> SentenceRows<'a> {
    fn new(sentence: &'a str) -> Self {
        Self {
            sentence,
            seen: HashSet::new(),
            rows: Vec::new(),
        }
    }

    fn push(&mut self, entity: &str, label: &str) {
        let entity = normalize_symbols(entity);
        if is_meaningful_entity(&entity, label)
            && self.seen.insert((entity.clone(), label.to_string()))
        {
            self.rows.push(LabeledRow::new(self.sentence, entity, label));
        }
    }

    fn has_entity(&self, text: &str) -> bool {
        let text = normalize_symbols(text).to_lowercase();
        self.rows.iter().any(|r| r.entity.to_lowercase() == text)
    }
}

impl LabelPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: Box::new(RuleNer::new()),
            patterns: Box::new(PatternRecognizer::with_default_patterns()),
            keywords: Box::new(KeywordExtractor::default()),
            classifier: Box::new(LexiconClassifier::new()),
            categories: CATEGORY_LABELS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[must_use]
    pub fn with_entities(mut self, recognizer: impl Recognizer + 'static) -> Self {
        self.entities = Box::new(recognizer);
        self
    }

    #[must_use]
    pub fn with_patterns(mut self, recognizer: impl Recognizer + 'static) -> Self {
        self.patterns = Box::new(recognizer);
        self
    }

    #[must_use]
    pub fn with_keywords(mut self, recognizer: impl Recognizer + 'static) -> Self {
        self.keywords = Box::new(recognizer);
        self
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: impl ZeroShotClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    fn ensure_available(&self, mode: LabelMode) -> LabelResult<()> {
        let mut recognizers: Vec<&dyn Recognizer> = vec![self.entities.as_ref()];
        if mode == LabelMode::Fast {
            recognizers.push(self.patterns.as_ref());
            recognizers.push(self.keywords.as_ref());
        }
        if let Some(r) = recognizers.iter().find(|r| !r.is_available()) {
            return Err(LabelError::ModelUnavailable(r.name().to_string()));
        }
        if mode == LabelMode::Smart && !self.classifier.is_available() {
            return Err(LabelError::ModelUnavailable(self.classifier.name().to_string()));
        }
        Ok(())
    }

    /// Label already-split sentences.
    pub fn run(&self, mode: LabelMode, sentences: &[String]) -> LabelResult<Vec<LabeledRow>> {
        self.ensure_available(mode)?;

        let mut rows = Vec::new();
        for sentence in sentences {
            let mut out = SentenceRows::new(sentence);
            match mode {
                LabelMode::Fast => self.label_fast(&mut out)?,
                LabelMode::Smart => self.label_smart(&mut out)?,
            }
            rows.extend(out.rows);
        }

        tracing::debug!(
            mode = %mode,
            sentences = sentences.len(),
            rows = rows.len(),
            "Labeling complete"
        );
        Ok(rows)
    }

    fn label_fast(&self, out: &mut SentenceRows<'_>) -> LabelResult<()> {
        let mut spans = self.entities.recognize(out.sentence)?;
        spans.extend(self.patterns.recognize(out.sentence)?);
        for span in resolve_overlaps(spans) {
            out.push(&span.text, &span.label);
        }

        for keyword in self.keywords.recognize(out.sentence)? {
            if !out.has_entity(&keyword.text) {
                out.push(&keyword.text, &keyword.label);
            }
        }
        Ok(())
    }

    fn label_smart(&self, out: &mut SentenceRows<'_>) -> LabelResult<()> {
        let classification = self.classifier.classify(out.sentence, &self.categories)?;
        if let Some((label, _)) = classification.top() {
            let sentence = out.sentence;
            out.push(sentence, &category_label(label));
        }

        for span in self.entities.recognize(out.sentence)? {
            out.push(&span.text, &span.label);
        }
        Ok(())
    }

    /// Normalize, split and label raw input text.
    pub fn label_text(&self, mode: LabelMode, raw: &str) -> LabelResult<LabelOutput> {
        let sentences = split_sentences(&normalize_symbols(raw));
        if sentences.is_empty() {
            return Err(LabelError::EmptyInput);
        }
        let rows = self.run(mode, &sentences)?;
        Ok(LabelOutput {
            sentence_count: sentences.len(),
            rows,
        })
    }
}

impl Default for LabelPipeline {
    fn default() -> Self {
        Self::new()
    }
}
