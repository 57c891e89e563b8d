//! Persistence for users, datasets, community shares and chat.
//!
//! [`SqliteStore`] keeps one JSON document per record; [`FileStore`] keeps
//! one JSON file per collection. [`FallbackStore`] fronts both and moves to
//! the file backend for good once the database stops answering.

mod fallback;
mod file;
mod sqlite;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::chat::{ChatMessage, ChatTarget};
use crate::community::{CommunityShare, LikeOutcome};
use crate::dataset::{Dataset, HistoryEntry};
use crate::user::User;
use crate::Result;

pub use fallback::{open_store, FallbackStore};
pub use file::FileStore;
pub use sqlite::SqliteStore;

#[async_trait::async_trait]
pub trait DatasetStore: Send + Sync {
    /// Short name of the backend currently serving requests.
    fn backend(&self) -> &'static str;

    // Users

    async fn create_user(&self, user: &User) -> Result<()>;

    async fn get_user(&self, username: &str) -> Result<Option<User>>;

    async fn set_banned(&self, username: &str, banned: bool) -> Result<()>;

    // Datasets

    async fn insert_dataset(&self, dataset: &Dataset) -> Result<()>;

    async fn get_dataset(&self, id: Uuid) -> Result<Dataset>;

    /// Newest first. `None` lists every owner, including anonymous runs.
    async fn list_history(&self, owner: Option<&str>, limit: usize) -> Result<Vec<HistoryEntry>>;

    /// Removes the dataset with its community share and chat messages.
    async fn delete_dataset(&self, id: Uuid) -> Result<()>;

    /// Delete every dataset whose retention window ended at or before `now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;

    // Community

    async fn insert_share(&self, share: &CommunityShare) -> Result<()>;

    async fn get_share(&self, id: Uuid) -> Result<CommunityShare>;

    async fn share_for_dataset(&self, dataset_id: Uuid) -> Result<Option<CommunityShare>>;

    /// Newest first.
    async fn list_shares(&self) -> Result<Vec<CommunityShare>>;

    async fn like_share(&self, id: Uuid, username: &str) -> Result<LikeOutcome>;

    /// Bump the download counter of the dataset's share, if it has one.
    async fn record_download(&self, dataset_id: Uuid) -> Result<()>;

    async fn search_shares(&self, query: &str, tag: Option<&str>) -> Result<Vec<CommunityShare>> {
        let shares = self.list_shares().await?;
        Ok(shares.into_iter().filter(|s| s.matches(query, tag)).collect())
    }

    // Chat

    async fn insert_message(&self, message: &ChatMessage) -> Result<()>;

    /// The latest `limit` messages for `target`, oldest first.
    async fn list_messages(&self, target: ChatTarget, limit: usize) -> Result<Vec<ChatMessage>>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use super::*;
    use crate::dataset::{GenerationParams, InputSource, LabelMode, LabeledRow, OutputFormat};
    use crate::Error;

    pub fn dataset(owner: Option<&str>, retention: chrono::Duration) -> Dataset {
        let id = Uuid::now_v7();
        Dataset::new(
            id,
            format!("dataset_{id}.csv"),
            owner.map(str::to_string),
            GenerationParams {
                mode: LabelMode::Fast,
                format: OutputFormat::Csv,
                custom_name: None,
                sentence_count: 1,
                source: InputSource::Text,
            },
            vec![LabeledRow::new("Paris is in France.", "Paris", "GPE")],
            retention,
        )
    }

    /// Behavior every backend must share.
    pub async fn exercise_store(store: &dyn DatasetStore) {
        // Users
        let alice = User::new("alice".into(), "secret123", false);
        store.create_user(&alice).await.unwrap();
        assert!(matches!(
            store.create_user(&alice).await,
            Err(Error::DuplicateUser(_))
        ));
        assert!(store.get_user("alice").await.unwrap().is_some());
        assert!(store.get_user("nobody").await.unwrap().is_none());
        store.set_banned("alice", true).await.unwrap();
        assert!(store.get_user("alice").await.unwrap().unwrap().banned);
        assert!(matches!(
            store.set_banned("nobody", true).await,
            Err(Error::UserNotFound(_))
        ));

        // Datasets and history
        let first = dataset(Some("alice"), chrono::Duration::hours(24));
        let second = dataset(None, chrono::Duration::hours(24));
        store.insert_dataset(&first).await.unwrap();
        store.insert_dataset(&second).await.unwrap();

        assert_eq!(store.get_dataset(first.id).await.unwrap().rows, first.rows);
        let all = store.list_history(None, 10).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].dataset_id, second.id);
        let mine = store.list_history(Some("alice"), 10).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(store.list_history(None, 1).await.unwrap().len(), 1);

        // Shares and likes
        let share =
            CommunityShare::new(&first, "alice".into(), "Places mentioned in news", "geo").unwrap();
        store.insert_share(&share).await.unwrap();
        let again =
            CommunityShare::new(&first, "alice".into(), "Places mentioned in news", "geo").unwrap();
        assert!(matches!(
            store.insert_share(&again).await,
            Err(Error::AlreadyShared(id)) if id == first.id
        ));

        assert_eq!(store.like_share(share.id, "bob").await.unwrap(), LikeOutcome::Liked);
        assert_eq!(
            store.like_share(share.id, "bob").await.unwrap(),
            LikeOutcome::AlreadyLiked
        );
        store.record_download(first.id).await.unwrap();
        store.record_download(second.id).await.unwrap();

        let stored = store.get_share(share.id).await.unwrap();
        assert_eq!(stored.likes, 1);
        assert_eq!(stored.download_count, 1);
        assert_eq!(store.search_shares("places", Some("GEO")).await.unwrap().len(), 1);
        assert!(store.search_shares("weather", None).await.unwrap().is_empty());

        // Chat
        for body in ["one", "two", "three"] {
            let msg = ChatMessage::new("bob".into(), body, ChatTarget::Dataset(first.id)).unwrap();
            store.insert_message(&msg).await.unwrap();
        }
        let global = ChatMessage::new("bob".into(), "hi all", ChatTarget::Global).unwrap();
        store.insert_message(&global).await.unwrap();

        let recent = store
            .list_messages(ChatTarget::Dataset(first.id), 2)
            .await
            .unwrap();
        let bodies: Vec<&str> = recent.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["two", "three"]);
        assert_eq!(store.list_messages(ChatTarget::Global, 50).await.unwrap().len(), 1);

        // Cascading delete
        store.delete_dataset(first.id).await.unwrap();
        assert!(matches!(
            store.get_dataset(first.id).await,
            Err(Error::DatasetNotFound(_))
        ));
        assert!(store.share_for_dataset(first.id).await.unwrap().is_none());
        assert!(store
            .list_messages(ChatTarget::Dataset(first.id), 50)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.list_messages(ChatTarget::Global, 50).await.unwrap().len(), 1);
        assert!(matches!(
            store.delete_dataset(first.id).await,
            Err(Error::DatasetNotFound(_))
        ));

        // Expiry
        let stale = dataset(None, chrono::Duration::zero());
        store.insert_dataset(&stale).await.unwrap();
        assert_eq!(store.purge_expired(Utc::now()).await.unwrap(), 1);
        assert!(store.get_dataset(stale.id).await.is_err());
        assert!(store.get_dataset(second.id).await.is_ok());
    }

    /// Likes and downloads arriving at the same time must all be counted,
    /// and a user racing against themselves still likes only once.
    pub async fn exercise_concurrent_counters(store: Arc<dyn DatasetStore>) {
        let data = dataset(Some("alice"), chrono::Duration::hours(24));
        store.insert_dataset(&data).await.unwrap();
        let share =
            CommunityShare::new(&data, "alice".into(), "Places mentioned in news", "geo").unwrap();
        store.insert_share(&share).await.unwrap();
        let (share_id, dataset_id) = (share.id, data.id);

        let mut likes = tokio::task::JoinSet::new();
        let mut downloads = tokio::task::JoinSet::new();
        for i in 0..40 {
            let s = Arc::clone(&store);
            likes.spawn(async move { s.like_share(share_id, &format!("user{i}")).await });
            let s = Arc::clone(&store);
            likes.spawn(async move { s.like_share(share_id, "carol").await });
            let s = Arc::clone(&store);
            downloads.spawn(async move { s.record_download(dataset_id).await });
        }

        let mut liked = 0;
        while let Some(outcome) = likes.join_next().await {
            if outcome.unwrap().unwrap() == LikeOutcome::Liked {
                liked += 1;
            }
        }
        while let Some(result) = downloads.join_next().await {
            result.unwrap().unwrap();
        }

        let stored = store.get_share(share_id).await.unwrap();
        assert_eq!(liked, 41);
        assert_eq!(stored.likes, 41);
        assert_eq!(stored.liked_by.len(), 41);
        assert_eq!(stored.liked_by.iter().filter(|u| *u == "carol").count(), 1);
        assert_eq!(stored.download_count, 40);
    }
}
