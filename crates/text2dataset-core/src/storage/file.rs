use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::DatasetStore;
use crate::chat::{ChatMessage, ChatTarget};
use crate::community::{CommunityShare, LikeOutcome};
use crate::dataset::{Dataset, HistoryEntry};
use crate::user::User;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy)]
enum Collection {
    Users,
    Datasets,
    Shares,
    Chat,
}

impl Collection {
    const fn file_name(self) -> &'static str {
        match self {
            Self::Users => "users.json",
            Self::Datasets => "datasets.json",
            Self::Shares => "shares.json",
            Self::Chat => "chat.json",
        }
    }
}

/// JSON-file backend: each collection is one array file, read and rewritten
/// whole under a single lock.
pub struct FileStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn load<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>> {
        let path = self.dir.join(collection.file_name());
        match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save<T: Serialize + Sync>(&self, collection: Collection, items: &[T]) -> Result<()> {
        let path = self.dir.join(collection.file_name());
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(items)?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, Uuid)) {
        items.sort_by_key(|item| std::cmp::Reverse(key(item)));
    }

    /// Remove a dataset and everything hanging off it. Caller holds the lock.
    async fn remove_dataset_locked(&self, id: Uuid) -> Result<bool> {
        let mut datasets: Vec<Dataset> = self.load(Collection::Datasets).await?;
        let before = datasets.len();
        datasets.retain(|d| d.id != id);
        if datasets.len() == before {
            return Ok(false);
        }
        self.save(Collection::Datasets, &datasets).await?;

        let mut shares: Vec<CommunityShare> = self.load(Collection::Shares).await?;
        shares.retain(|s| s.dataset_id != id);
        self.save(Collection::Shares, &shares).await?;

        let mut messages: Vec<ChatMessage> = self.load(Collection::Chat).await?;
        messages.retain(|m| m.target != ChatTarget::Dataset(id));
        self.save(Collection::Chat, &messages).await?;

        Ok(true)
    }
}

#[async_trait::async_trait]
impl DatasetStore for FileStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn create_user(&self, user: &User) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut users: Vec<User> = self.load(Collection::Users).await?;
        if users.iter().any(|u| u.username == user.username) {
            return Err(Error::DuplicateUser(user.username.clone()));
        }
        users.push(user.clone());
        self.save(Collection::Users, &users).await
    }

    async fn get_user(&self, username: &str) -> Result<Option<User>> {
        let _guard = self.lock.lock().await;
        let users: Vec<User> = self.load(Collection::Users).await?;
        Ok(users.into_iter().find(|u| u.username == username))
    }

    async fn set_banned(&self, username: &str, banned: bool) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut users: Vec<User> = self.load(Collection::Users).await?;
        let user = users
            .iter_mut()
            .find(|u| u.username == username)
            .ok_or_else(|| Error::UserNotFound(username.to_string()))?;
        user.banned = banned;
        self.save(Collection::Users, &users).await
    }

    async fn insert_dataset(&self, dataset: &Dataset) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut datasets: Vec<Dataset> = self.load(Collection::Datasets).await?;
        datasets.push(dataset.clone());
        self.save(Collection::Datasets, &datasets).await
    }

    async fn get_dataset(&self, id: Uuid) -> Result<Dataset> {
        let _guard = self.lock.lock().await;
        let datasets: Vec<Dataset> = self.load(Collection::Datasets).await?;
        datasets
            .into_iter()
            .find(|d| d.id == id)
            .ok_or(Error::DatasetNotFound(id))
    }

    async fn list_history(&self, owner: Option<&str>, limit: usize) -> Result<Vec<HistoryEntry>> {
        let _guard = self.lock.lock().await;
        let mut datasets: Vec<Dataset> = self.load(Collection::Datasets).await?;
        if let Some(owner) = owner {
            datasets.retain(|d| d.is_owned_by(owner));
        }
        Self::newest_first(&mut datasets, |d| (d.created_at, d.id));
        Ok(datasets
            .iter()
            .take(limit)
            .map(Dataset::history_entry)
            .collect())
    }

    async fn delete_dataset(&self, id: Uuid) -> Result<()> {
        let _guard = self.lock.lock().await;
        if self.remove_dataset_locked(id).await? {
            Ok(())
        } else {
            Err(Error::DatasetNotFound(id))
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let datasets: Vec<Dataset> = self.load(Collection::Datasets).await?;
        let expired: Vec<Uuid> = datasets
            .iter()
            .filter(|d| d.is_expired_at(now))
            .map(|d| d.id)
            .collect();

        let mut purged = 0;
        for id in expired {
            if self.remove_dataset_locked(id).await? {
                purged += 1;
            }
        }
        Ok(purged)
    }

    async fn insert_share(&self, share: &CommunityShare) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut shares: Vec<CommunityShare> = self.load(Collection::Shares).await?;
        if shares.iter().any(|s| s.dataset_id == share.dataset_id) {
            return Err(Error::AlreadyShared(share.dataset_id));
        }
        shares.push(share.clone());
        self.save(Collection::Shares, &shares).await
    }

    async fn get_share(&self, id: Uuid) -> Result<CommunityShare> {
        let _guard = self.lock.lock().await;
        let shares: Vec<CommunityShare> = self.load(Collection::Shares).await?;
        shares
            .into_iter()
            .find(|s| s.id == id)
            .ok_or(Error::ShareNotFound(id))
    }

    async fn share_for_dataset(&self, dataset_id: Uuid) -> Result<Option<CommunityShare>> {
        let _guard = self.lock.lock().await;
        let shares: Vec<CommunityShare> = self.load(Collection::Shares).await?;
        Ok(shares.into_iter().find(|s| s.dataset_id == dataset_id))
    }

    async fn list_shares(&self) -> Result<Vec<CommunityShare>> {
        let _guard = self.lock.lock().await;
        let mut shares: Vec<CommunityShare> = self.load(Collection::Shares).await?;
        Self::newest_first(&mut shares, |s| (s.created_at, s.id));
        Ok(shares)
    }

    async fn like_share(&self, id: Uuid, username: &str) -> Result<LikeOutcome> {
        let _guard = self.lock.lock().await;
        let mut shares: Vec<CommunityShare> = self.load(Collection::Shares).await?;
        let share = shares
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(Error::ShareNotFound(id))?;

        if !share.like(username) {
            return Ok(LikeOutcome::AlreadyLiked);
        }
        self.save(Collection::Shares, &shares).await?;
        Ok(LikeOutcome::Liked)
    }

    async fn record_download(&self, dataset_id: Uuid) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut shares: Vec<CommunityShare> = self.load(Collection::Shares).await?;
        let Some(share) = shares.iter_mut().find(|s| s.dataset_id == dataset_id) else {
            return Ok(());
        };
        share.download_count += 1;
        self.save(Collection::Shares, &shares).await
    }

    async fn insert_message(&self, message: &ChatMessage) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut messages: Vec<ChatMessage> = self.load(Collection::Chat).await?;
        messages.push(message.clone());
        self.save(Collection::Chat, &messages).await
    }

    async fn list_messages(&self, target: ChatTarget, limit: usize) -> Result<Vec<ChatMessage>> {
        let _guard = self.lock.lock().await;
        let mut messages: Vec<ChatMessage> = self.load(Collection::Chat).await?;
        messages.retain(|m| m.target == target);
        messages.sort_by_key(|m| (m.created_at, m.id));
        let skip = messages.len().saturating_sub(limit);
        Ok(messages.split_off(skip))
    }
}
