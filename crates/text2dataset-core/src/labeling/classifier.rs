use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::recognizer::{LabelError, LabelResult};

pub const FALLBACK_LABEL: &str = "general";

/// Candidate topics for sentence-level classification.
pub const CATEGORY_LABELS: &[&str] = &[
    "technology",
    "sports",
    "politics",
    "business",
    "health",
    "entertainment",
    "science",
    "education",
    FALLBACK_LABEL,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub labels: Vec<String>,
    pub scores: Vec<f64>,
}

impl Classification {
    #[must_use]
    pub fn top(&self) -> Option<(&str, f64)> {
        Some((self.labels.first()?.as_str(), *self.scores.first()?))
    }
}

/// Row label for a classification result, e.g. `CATEGORY_SPORTS`.
#[must_use]
pub fn category_label(label: &str) -> String {
    format!("CATEGORY_{}", label.to_uppercase())
}

pub trait ZeroShotClassifier: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool {
        true
    }

    fn classify(&self, text: &str, candidate_labels: &[String]) -> LabelResult<Classification>;
}

/// Scores labels by counting lexicon hits among the sentence's words.
pub struct LexiconClassifier {
    lexicon: HashMap<&'static str, &'static [&'static str]>,
}

impl LexiconClassifier {
    #[must_use]
    pub fn new() -> Self {
        let lexicon: HashMap<&'static str, &'static [&'static str]> = HashMap::from([
            (
                "technology",
                &[
                    "software", "computer", "internet", "digital", "app", "data", "algorithm",
                    "ai", "artificial", "robot", "chip", "semiconductor", "smartphone", "cloud",
                    "cyber", "network", "startup", "tech", "device", "program",
                ][..],
            ),
            (
                "sports",
                &[
                    "game", "match", "team", "player", "coach", "league", "tournament",
                    "championship", "score", "goal", "football", "soccer", "basketball",
                    "tennis", "olympic", "athlete", "season", "win", "stadium", "cup",
                ][..],
            ),
            (
                "politics",
                &[
                    "election", "government", "president", "minister", "parliament", "senate",
                    "congress", "vote", "policy", "law", "campaign", "party", "democrat",
                    "republican", "political", "legislation", "diplomat", "treaty",
                ][..],
            ),
            (
                "business",
                &[
                    "company", "market", "revenue", "profit", "stock", "share", "investor",
                    "economy", "economic", "sales", "bank", "finance", "financial", "trade",
                    "merger", "acquisition", "ceo", "earnings", "price", "industry",
                ][..],
            ),
            (
                "health",
                &[
                    "health", "hospital", "doctor", "patient", "disease", "vaccine", "medical",
                    "medicine", "treatment", "virus", "infection", "drug", "clinic", "nurse",
                    "symptom", "diet", "fitness", "mental",
                ][..],
            ),
            (
                "entertainment",
                &[
                    "film", "movie", "music", "album", "song", "actor", "actress", "celebrity",
                    "concert", "television", "show", "series", "festival", "award", "hollywood",
                    "singer", "band", "theater", "theatre",
                ][..],
            ),
            (
                "science",
                &[
                    "research", "scientist", "study", "experiment", "physics", "chemistry",
                    "biology", "space", "planet", "nasa", "climate", "species", "laboratory",
                    "discovery", "theory", "telescope", "molecule", "genetic",
                ][..],
            ),
            (
                "education",
                &[
                    "school", "student", "teacher", "university", "college", "education",
                    "course", "classroom", "exam", "degree", "curriculum", "learning", "campus",
                    "professor", "lecture", "tuition",
                ][..],
            ),
        ]);
        Self { lexicon }
    }

    fn hits(&self, label: &str, words: &[String]) -> usize {
        let terms = self.lexicon.get(label).copied().unwrap_or_default();
        words
            .iter()
            .filter(|w| {
                w.as_str() == label
                    || terms
                        .iter()
                        .any(|t| w.as_str() == *t || (t.len() >= 4 && w.starts_with(t)))
            })
            .count()
    }
}

impl Default for LexiconClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ZeroShotClassifier for LexiconClassifier {
    fn name(&self) -> &str {
        "lexicon"
    }

    fn classify(&self, text: &str, candidate_labels: &[String]) -> LabelResult<Classification> {
        if candidate_labels.is_empty() {
            return Err(LabelError::Failed("no candidate labels".into()));
        }

        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();

        let counts: Vec<usize> = candidate_labels
            .iter()
            .map(|label| self.hits(&label.to_lowercase(), &words))
            .collect();
        let total: usize = counts.iter().sum();

        let mut ranked: Vec<(String, f64)> = candidate_labels
            .iter()
            .zip(&counts)
            .map(|(label, &count)| {
                let score = if total == 0 {
                    if label.eq_ignore_ascii_case(FALLBACK_LABEL) { 1.0 } else { 0.0 }
                } else {
                    #[allow(clippy::cast_precision_loss)]
                    let share = count as f64 / total as f64;
                    share
                };
                (label.clone(), score)
            })
            .collect();

        // Stable: ties keep candidate order.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let (labels, scores) = ranked.into_iter().unzip();
        Ok(Classification { labels, scores })
    }
}
