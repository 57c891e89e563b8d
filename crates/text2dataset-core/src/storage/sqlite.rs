use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Pool, Sqlite,
};
use uuid::Uuid;

use super::DatasetStore;
use crate::chat::{ChatMessage, ChatTarget};
use crate::community::{CommunityShare, LikeOutcome};
use crate::dataset::{Dataset, HistoryEntry};
use crate::user::User;
use crate::{Error, Result};

const INIT_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    username TEXT PRIMARY KEY,
    doc TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS datasets (
    id TEXT PRIMARY KEY,
    owner TEXT,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    doc TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_datasets_owner ON datasets(owner);
CREATE INDEX IF NOT EXISTS idx_datasets_created ON datasets(created_at);
CREATE INDEX IF NOT EXISTS idx_datasets_expires ON datasets(expires_at);

CREATE TABLE IF NOT EXISTS shares (
    id TEXT PRIMARY KEY,
    dataset_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    download_count INTEGER NOT NULL DEFAULT 0,
    doc TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS share_likes (
    share_id TEXT NOT NULL REFERENCES shares(id) ON DELETE CASCADE,
    username TEXT NOT NULL,
    PRIMARY KEY (share_id, username)
);

CREATE TABLE IF NOT EXISTS chat_messages (
    id TEXT PRIMARY KEY,
    target TEXT NOT NULL,
    created_at TEXT NOT NULL,
    doc TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chat_target ON chat_messages(target, created_at);
"#;

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Fixed-width timestamps so text order matches time order.
fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Share document plus the counters kept outside it.
type ShareRow = (String, String, i64);

/// Document store on SQLite: indexed key columns plus the record as JSON.
///
/// Share counters live outside the document: likes are rows in
/// `share_likes`, downloads a column bumped in place. Concurrent requests
/// never rewrite a share document.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Accepts a full `sqlite:` URL or a bare file path.
    pub async fn open(url: &str) -> Result<Self> {
        let url = if url.starts_with("sqlite:") {
            url.to_string()
        } else {
            format!("sqlite:{url}")
        };

        let options = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(INIT_SQL).execute(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn open_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::query(INIT_SQL).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Close the pool. Later operations fail with a connectivity error.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn likes_for(&self, share_id: &str) -> Result<Vec<String>> {
        Ok(sqlx::query_scalar(
            "SELECT username FROM share_likes WHERE share_id = ? ORDER BY rowid",
        )
        .bind(share_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn load_share_row(&self, row: Option<ShareRow>) -> Result<Option<CommunityShare>> {
        let Some((id, doc, download_count)) = row else {
            return Ok(None);
        };
        let liked_by = self.likes_for(&id).await?;
        hydrate_share(&doc, download_count, liked_by).map(Some)
    }
}

/// Rebuild a share from its document and the counters stored beside it.
fn hydrate_share(doc: &str, download_count: i64, liked_by: Vec<String>) -> Result<CommunityShare> {
    let mut share: CommunityShare = serde_json::from_str(doc)?;
    share.download_count = u64::try_from(download_count).unwrap_or(0);
    share.likes = liked_by.len() as u64;
    share.liked_by = liked_by;
    Ok(share)
}

fn parse_docs<T: serde::de::DeserializeOwned>(docs: Vec<String>) -> Result<Vec<T>> {
    docs.iter()
        .map(|doc| serde_json::from_str(doc).map_err(Error::from))
        .collect()
}

#[async_trait::async_trait]
impl DatasetStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query("INSERT INTO users (username, doc) VALUES (?, ?)")
            .bind(&user.username)
            .bind(serde_json::to_string(user)?)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e {
                    if db_err.is_unique_violation() {
                        return Error::DuplicateUser(user.username.clone());
                    }
                }
                Error::Database(e)
            })?;

        Ok(())
    }

    async fn get_user(&self, username: &str) -> Result<Option<User>> {
        let doc: Option<String> = sqlx::query_scalar("SELECT doc FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        doc.map(|d| serde_json::from_str(&d).map_err(Error::from))
            .transpose()
    }

    async fn set_banned(&self, username: &str, banned: bool) -> Result<()> {
        let result =
            sqlx::query("UPDATE users SET doc = json_set(doc, '$.banned', json(?)) WHERE username = ?")
                .bind(if banned { "true" } else { "false" })
                .bind(username)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(Error::UserNotFound(username.to_string()));
        }
        Ok(())
    }

    async fn insert_dataset(&self, dataset: &Dataset) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO datasets (id, owner, created_at, expires_at, doc)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(dataset.id.to_string())
        .bind(&dataset.owner)
        .bind(timestamp(dataset.created_at))
        .bind(timestamp(dataset.expires_at))
        .bind(serde_json::to_string(dataset)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_dataset(&self, id: Uuid) -> Result<Dataset> {
        let doc: String = sqlx::query_scalar("SELECT doc FROM datasets WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::DatasetNotFound(id))?;

        Ok(serde_json::from_str(&doc)?)
    }

    async fn list_history(&self, owner: Option<&str>, limit: usize) -> Result<Vec<HistoryEntry>> {
        let docs: Vec<String> = match owner {
            Some(owner) => {
                sqlx::query_scalar(
                    r#"
                    SELECT doc FROM datasets WHERE owner = ?
                    ORDER BY created_at DESC, id DESC LIMIT ?
                    "#,
                )
                .bind(owner)
                .bind(limit_param(limit))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar(
                    "SELECT doc FROM datasets ORDER BY created_at DESC, id DESC LIMIT ?",
                )
                .bind(limit_param(limit))
                .fetch_all(&self.pool)
                .await?
            }
        };

        let datasets: Vec<Dataset> = parse_docs(docs)?;
        Ok(datasets.iter().map(Dataset::history_entry).collect())
    }

    async fn delete_dataset(&self, id: Uuid) -> Result<()> {
        let key = id.to_string();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM datasets WHERE id = ?")
            .bind(&key)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::DatasetNotFound(id));
        }

        sqlx::query(
            "DELETE FROM share_likes WHERE share_id IN (SELECT id FROM shares WHERE dataset_id = ?)",
        )
        .bind(&key)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM shares WHERE dataset_id = ?")
            .bind(&key)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chat_messages WHERE target = ?")
            .bind(&key)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM datasets WHERE expires_at <= ?")
            .bind(timestamp(now))
            .fetch_all(&self.pool)
            .await?;

        let mut purged = 0;
        for id in ids {
            let Ok(id) = id.parse::<Uuid>() else {
                tracing::warn!(%id, "Skipping dataset with malformed id");
                continue;
            };
            match self.delete_dataset(id).await {
                Ok(()) => purged += 1,
                Err(Error::DatasetNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(purged)
    }

    async fn insert_share(&self, share: &CommunityShare) -> Result<()> {
        sqlx::query("INSERT INTO shares (id, dataset_id, created_at, doc) VALUES (?, ?, ?, ?)")
            .bind(share.id.to_string())
            .bind(share.dataset_id.to_string())
            .bind(timestamp(share.created_at))
            .bind(serde_json::to_string(share)?)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e {
                    if db_err.is_unique_violation() {
                        return Error::AlreadyShared(share.dataset_id);
                    }
                }
                Error::Database(e)
            })?;

        Ok(())
    }

    async fn get_share(&self, id: Uuid) -> Result<CommunityShare> {
        let row: Option<ShareRow> =
            sqlx::query_as("SELECT id, doc, download_count FROM shares WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        self.load_share_row(row)
            .await?
            .ok_or(Error::ShareNotFound(id))
    }

    async fn share_for_dataset(&self, dataset_id: Uuid) -> Result<Option<CommunityShare>> {
        let row: Option<ShareRow> =
            sqlx::query_as("SELECT id, doc, download_count FROM shares WHERE dataset_id = ?")
                .bind(dataset_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        self.load_share_row(row).await
    }

    async fn list_shares(&self) -> Result<Vec<CommunityShare>> {
        let rows: Vec<ShareRow> = sqlx::query_as(
            "SELECT id, doc, download_count FROM shares ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let likes: Vec<(String, String)> =
            sqlx::query_as("SELECT share_id, username FROM share_likes ORDER BY rowid")
                .fetch_all(&self.pool)
                .await?;
        let mut liked_by: HashMap<String, Vec<String>> = HashMap::new();
        for (share_id, username) in likes {
            liked_by.entry(share_id).or_default().push(username);
        }

        rows.into_iter()
            .map(|(id, doc, download_count)| {
                hydrate_share(&doc, download_count, liked_by.remove(&id).unwrap_or_default())
            })
            .collect()
    }

    async fn like_share(&self, id: Uuid, username: &str) -> Result<LikeOutcome> {
        let key = id.to_string();

        // The primary key makes a repeated like a no-op.
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO share_likes (share_id, username) SELECT id, ? FROM shares WHERE id = ?",
        )
        .bind(username)
        .bind(&key)
        .execute(&self.pool)
        .await?;
        if inserted.rows_affected() > 0 {
            return Ok(LikeOutcome::Liked);
        }

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM shares WHERE id = ?")
            .bind(&key)
            .fetch_optional(&self.pool)
            .await?;
        match exists {
            Some(_) => Ok(LikeOutcome::AlreadyLiked),
            None => Err(Error::ShareNotFound(id)),
        }
    }

    async fn record_download(&self, dataset_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE shares SET download_count = download_count + 1 WHERE dataset_id = ?")
            .bind(dataset_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_message(&self, message: &ChatMessage) -> Result<()> {
        sqlx::query("INSERT INTO chat_messages (id, target, created_at, doc) VALUES (?, ?, ?, ?)")
            .bind(message.id.to_string())
            .bind(message.target.key())
            .bind(timestamp(message.created_at))
            .bind(serde_json::to_string(message)?)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_messages(&self, target: ChatTarget, limit: usize) -> Result<Vec<ChatMessage>> {
        let docs: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT doc FROM chat_messages WHERE target = ?
            ORDER BY created_at DESC, id DESC LIMIT ?
            "#,
        )
        .bind(target.key())
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut messages: Vec<ChatMessage> = parse_docs(docs)?;
        messages.reverse();
        Ok(messages)
    }
}
