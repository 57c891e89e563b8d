use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{DatasetStore, FileStore, SqliteStore};
use crate::chat::{ChatMessage, ChatTarget};
use crate::community::{CommunityShare, LikeOutcome};
use crate::dataset::{Dataset, HistoryEntry};
use crate::user::User;
use crate::{Error, Result};

/// Try the primary; on a connectivity error switch to the file store for
/// good and retry there.
macro_rules! route {
    ($self:ident, $method:ident($($arg:expr),*)) => {{
        if let Some(primary) = $self.active_primary() {
            match primary.$method($($arg),*).await {
                Err(e) if e.is_connectivity() => $self.degrade(stringify!($method), &e),
                other => return other,
            }
        }
        $self.file.$method($($arg),*).await
    }};
}

/// The document store with a file-backed safety net. No reconciliation:
/// records written to one backend are not copied to the other.
pub struct FallbackStore {
    primary: Option<Box<dyn DatasetStore>>,
    file: FileStore,
    degraded: AtomicBool,
}

impl FallbackStore {
    #[must_use]
    pub fn new(primary: Option<Box<dyn DatasetStore>>, file: FileStore) -> Self {
        Self {
            primary,
            file,
            degraded: AtomicBool::new(false),
        }
    }

    /// Whether requests are served by the file store.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.primary.is_none() || self.degraded.load(Ordering::Acquire)
    }

    fn active_primary(&self) -> Option<&dyn DatasetStore> {
        if self.degraded.load(Ordering::Acquire) {
            return None;
        }
        self.primary.as_deref()
    }

    fn degrade(&self, operation: &str, error: &Error) {
        if !self.degraded.swap(true, Ordering::AcqRel) {
            tracing::warn!(
                operation,
                error = %error,
                dir = %self.file.dir().display(),
                "Document store unreachable, switching to file storage"
            );
        }
    }
}

/// Open the database at `database_url` if given, with a [`FileStore`] under
/// `data_dir` as fallback. A database that cannot be opened is logged and
/// skipped.
pub async fn open_store(
    database_url: Option<&str>,
    data_dir: impl Into<PathBuf>,
) -> Result<FallbackStore> {
    let file = FileStore::open(data_dir).await?;

    let primary: Option<Box<dyn DatasetStore>> = match database_url {
        Some(url) => match SqliteStore::open(url).await {
            Ok(store) => {
                tracing::info!(url, "Connected to document store");
                Some(Box::new(store))
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "Document store unavailable, using file storage");
                None
            }
        },
        None => {
            tracing::info!("No database configured, using file storage");
            None
        }
    };

    Ok(FallbackStore::new(primary, file))
}

#[async_trait::async_trait]
impl DatasetStore for FallbackStore {
    fn backend(&self) -> &'static str {
        self.active_primary()
            .map_or_else(|| self.file.backend(), |primary| primary.backend())
    }

    async fn create_user(&self, user: &User) -> Result<()> {
        route!(self, create_user(user))
    }

    async fn get_user(&self, username: &str) -> Result<Option<User>> {
        route!(self, get_user(username))
    }

    async fn set_banned(&self, username: &str, banned: bool) -> Result<()> {
        route!(self, set_banned(username, banned))
    }

    async fn insert_dataset(&self, dataset: &Dataset) -> Result<()> {
        route!(self, insert_dataset(dataset))
    }

    async fn get_dataset(&self, id: Uuid) -> Result<Dataset> {
        route!(self, get_dataset(id))
    }

    async fn list_history(&self, owner: Option<&str>, limit: usize) -> Result<Vec<HistoryEntry>> {
        route!(self, list_history(owner, limit))
    }

    async fn delete_dataset(&self, id: Uuid) -> Result<()> {
        route!(self, delete_dataset(id))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        route!(self, purge_expired(now))
    }

    async fn insert_share(&self, share: &CommunityShare) -> Result<()> {
        route!(self, insert_share(share))
    }

    async fn get_share(&self, id: Uuid) -> Result<CommunityShare> {
        route!(self, get_share(id))
    }

    async fn share_for_dataset(&self, dataset_id: Uuid) -> Result<Option<CommunityShare>> {
        route!(self, share_for_dataset(dataset_id))
    }

    async fn list_shares(&self) -> Result<Vec<CommunityShare>> {
        route!(self, list_shares())
    }

    async fn like_share(&self, id: Uuid, username: &str) -> Result<LikeOutcome> {
        route!(self, like_share(id, username))
    }

    async fn record_download(&self, dataset_id: Uuid) -> Result<()> {
        route!(self, record_download(dataset_id))
    }

    async fn insert_message(&self, message: &ChatMessage) -> Result<()> {
        route!(self, insert_message(message))
    }

    async fn list_messages(&self, target: ChatTarget, limit: usize) -> Result<Vec<ChatMessage>> {
        route!(self, list_messages(target, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::{dataset, exercise_store};

    #[tokio::test]
    async fn test_file_only_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(None, dir.path()).await.unwrap();

        assert!(store.is_degraded());
        assert_eq!(store.backend(), "file");
        exercise_store(&store).await;
    }

    #[tokio::test]
    async fn test_healthy_primary_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let primary = SqliteStore::open_memory().await.unwrap();
        let store = FallbackStore::new(
            Some(Box::new(primary)),
            FileStore::open(dir.path()).await.unwrap(),
        );

        assert_eq!(store.backend(), "sqlite");
        exercise_store(&store).await;
        assert!(!store.is_degraded());
        assert!(!dir.path().join("datasets.json").exists());
    }

    #[tokio::test]
    async fn test_unreachable_primary_falls_back_without_loss() {
        let dir = tempfile::tempdir().unwrap();
        let primary = SqliteStore::open_memory().await.unwrap();
        primary.close().await;
        let store = FallbackStore::new(
            Some(Box::new(primary)),
            FileStore::open(dir.path()).await.unwrap(),
        );

        let ds = dataset(Some("alice"), chrono::Duration::hours(24));
        store.insert_dataset(&ds).await.unwrap();

        assert!(store.is_degraded());
        assert_eq!(store.backend(), "file");
        assert_eq!(store.get_dataset(ds.id).await.unwrap().id, ds.id);
        assert_eq!(store.list_history(Some("alice"), 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_request_errors_do_not_degrade() {
        let dir = tempfile::tempdir().unwrap();
        let primary = SqliteStore::open_memory().await.unwrap();
        let store = FallbackStore::new(
            Some(Box::new(primary)),
            FileStore::open(dir.path()).await.unwrap(),
        );

        let missing = store.get_dataset(Uuid::now_v7()).await;
        assert!(matches!(missing, Err(Error::DatasetNotFound(_))));
        assert!(!store.is_degraded());
    }

    #[tokio::test]
    async fn test_unopenable_database_uses_files() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!(
            "sqlite:{}?mode=ro",
            dir.path().join("missing").join("none.db").display()
        );

        let store = open_store(Some(&url), dir.path()).await.unwrap();
        assert!(store.is_degraded());
    }
}
