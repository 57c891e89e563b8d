use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dataset::{Dataset, LabelMode, OutputFormat};
use crate::{Error, Result};

pub const MIN_DESCRIPTION_LEN: usize = 10;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MAX_TAGS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityShare {
    pub id: Uuid,
    pub dataset_id: Uuid,
    pub filename: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub mode: LabelMode,
    pub format: OutputFormat,
    pub entity_count: usize,
    pub owner: String,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub liked_by: Vec<String>,
    #[serde(default)]
    pub download_count: u64,
    pub created_at: DateTime<Utc>,
}

impl CommunityShare {
    /// Share `dataset` on behalf of `owner`. Description and tags are
    /// validated and normalized here so both store backends see the same data.
    pub fn new(dataset: &Dataset, owner: String, description: &str, tags: &str) -> Result<Self> {
        Ok(Self {
            id: Uuid::now_v7(),
            dataset_id: dataset.id,
            filename: dataset.filename.clone(),
            name: dataset.name.clone(),
            description: validate_description(description)?,
            tags: parse_tags(tags),
            mode: dataset.params.mode,
            format: dataset.params.format,
            entity_count: dataset.entity_count,
            owner,
            likes: 0,
            liked_by: Vec::new(),
            download_count: 0,
            created_at: Utc::now(),
        })
    }

    /// Record a like from `username`. Returns false when that user already liked it.
    pub fn like(&mut self, username: &str) -> bool {
        if self.liked_by.iter().any(|u| u == username) {
            return false;
        }
        self.liked_by.push(username.to_string());
        self.likes = self.liked_by.len() as u64;
        true
    }

    #[must_use]
    pub const fn popularity(&self) -> u64 {
        self.likes + self.download_count
    }

    /// Case-insensitive match of `query` against name, filename and
    /// description, and of `tag` against the tag list. Empty filters match.
    #[must_use]
    pub fn matches(&self, query: &str, tag: Option<&str>) -> bool {
        let query = query.trim().to_lowercase();
        let query_ok = query.is_empty()
            || self.name.to_lowercase().contains(&query)
            || self.filename.to_lowercase().contains(&query)
            || self.description.to_lowercase().contains(&query);

        let tag_ok = match tag.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => {
                let t = t.to_lowercase();
                self.tags.iter().any(|existing| existing.to_lowercase() == t)
            }
            None => true,
        };

        query_ok && tag_ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LikeOutcome {
    Liked,
    AlreadyLiked,
}

pub fn validate_description(description: &str) -> Result<String> {
    let trimmed = description.trim();
    if trimmed.chars().count() < MIN_DESCRIPTION_LEN {
        return Err(Error::Validation(format!(
            "Description must be at least {MIN_DESCRIPTION_LEN} characters long"
        )));
    }
    if trimmed.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(Error::Validation(format!(
            "Description is too long (max {MAX_DESCRIPTION_LEN} characters)"
        )));
    }
    Ok(trimmed.to_string())
}

/// Comma separated tags, trimmed, deduplicated case-insensitively.
#[must_use]
pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            continue;
        }
        tags.push(tag.to_string());
        if tags.len() == MAX_TAGS {
            break;
        }
    }
    tags
}
