use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One labeled row: the sentence, the span or phrase found in it, and its label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabeledRow {
    pub text: String,
    pub entity: String,
    pub label: String,
}

impl LabeledRow {
    #[must_use]
    pub fn new(text: impl Into<String>, entity: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            entity: entity.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
    Spacy,
}

impl OutputFormat {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Spacy => "spacy",
        }
    }

    /// File extension of the exported file. spaCy training data is JSON.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::Spacy => "json",
        }
    }

    #[must_use]
    pub const fn media_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Json | Self::Spacy => "application/json",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "spacy" => Ok(Self::Spacy),
            _ => Err(crate::Error::InvalidFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LabelMode {
    #[default]
    Fast,
    Smart,
}

impl LabelMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Smart => "smart",
        }
    }
}

impl std::fmt::Display for LabelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LabelMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "smart" => Ok(Self::Smart),
            _ => Err(crate::Error::InvalidMode(s.to_string())),
        }
    }
}

/// Where the input text came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputSource {
    Text,
    File { filename: String },
}

/// Parameters a dataset was generated with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub mode: LabelMode,
    pub format: OutputFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    pub sentence_count: usize,
    pub source: InputSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: Uuid,
    pub name: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub params: GenerationParams,
    pub rows: Vec<LabeledRow>,
    pub entity_count: usize,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Dataset {
    /// Build a dataset record for a finished run. The id is embedded in the
    /// output filename, so callers generate it up front.
    #[must_use]
    pub fn new(
        id: Uuid,
        filename: String,
        owner: Option<String>,
        params: GenerationParams,
        rows: Vec<LabeledRow>,
        retention: Duration,
    ) -> Self {
        let now = Utc::now();
        let name = params
            .custom_name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("dataset-{}", &id.simple().to_string()[..8]));
        Self {
            id,
            name,
            filename,
            owner,
            entity_count: rows.len(),
            params,
            rows,
            created_at: now,
            expires_at: now + retention,
        }
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    #[must_use]
    pub fn is_owned_by(&self, username: &str) -> bool {
        self.owner.as_deref() == Some(username)
    }

    #[must_use]
    pub fn history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            dataset_id: self.id,
            name: self.name.clone(),
            filename: self.filename.clone(),
            owner: self.owner.clone(),
            params: self.params.clone(),
            entity_count: self.entity_count,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

/// A generation run as shown in history listings, without the rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub dataset_id: Uuid,
    pub name: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub params: GenerationParams,
    pub entity_count: usize,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
