use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

pub const MAX_MESSAGE_LEN: usize = 1000;

/// Where a chat message was posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "dataset_id", rename_all = "snake_case")]
pub enum ChatTarget {
    Global,
    Dataset(Uuid),
}

impl ChatTarget {
    /// Key used by the store backends to index messages.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Global => "global".to_string(),
            Self::Dataset(id) => id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub author: String,
    pub body: String,
    pub target: ChatTarget,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(author: String, body: &str, target: ChatTarget) -> Result<Self> {
        Ok(Self {
            id: Uuid::now_v7(),
            author,
            body: validate_body(body)?,
            target,
            created_at: Utc::now(),
        })
    }
}

fn validate_body(body: &str) -> Result<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("Message cannot be empty".into()));
    }
    if trimmed.chars().count() > MAX_MESSAGE_LEN {
        return Err(Error::Validation(format!(
            "Message is too long (max {MAX_MESSAGE_LEN} characters)"
        )));
    }
    Ok(trimmed.to_string())
}
