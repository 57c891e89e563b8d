use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};

use crate::dataset::Dataset;
use crate::{Error, Result};

/// Directory holding generated dataset files for the retention window.
#[derive(Debug, Clone)]
pub struct OutputDirectory {
    root: PathBuf,
}

impl OutputDirectory {
    pub async fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a bare filename inside the directory.
    pub fn path(&self, filename: &str) -> Result<PathBuf> {
        if filename.is_empty()
            || filename.contains(['/', '\\'])
            || filename.starts_with('.')
        {
            return Err(Error::Validation(format!("Invalid filename: {filename}")));
        }
        Ok(self.root.join(filename))
    }

    pub async fn write(&self, filename: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.path(filename)?;
        tokio::fs::write(&path, contents).await?;
        tracing::debug!(path = %path.display(), bytes = contents.len(), "Wrote output file");
        Ok(path)
    }

    /// Read a dataset's file, refusing once its retention window has passed.
    pub async fn read(&self, dataset: &Dataset, now: DateTime<Utc>) -> Result<Vec<u8>> {
        if dataset.is_expired_at(now) {
            return Err(Error::Expired(dataset.id));
        }
        let path = self.path(&dataset.filename)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::FileNotFound(dataset.filename.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn remove(&self, filename: &str) -> Result<bool> {
        let path = self.path(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete files last modified at least `retention` ago. Returns how many
    /// were removed.
    pub async fn sweep_expired(&self, retention: Duration) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let age = metadata
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .unwrap_or_default();
            if age < retention {
                continue;
            }

            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "Failed to remove expired file");
                }
            }
        }

        if removed > 0 {
            tracing::info!(removed, "Swept expired output files");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{GenerationParams, InputSource, LabelMode, LabeledRow, OutputFormat};
    use tempfile::tempdir;
    use uuid::Uuid;

    fn dataset(filename: &str, retention: chrono::Duration) -> Dataset {
        let params = GenerationParams {
            mode: LabelMode::Fast,
            format: OutputFormat::Csv,
            custom_name: None,
            sentence_count: 1,
            source: InputSource::Text,
        };
        Dataset::new(
            Uuid::now_v7(),
            filename.to_string(),
            None,
            params,
            vec![LabeledRow::new("Paris is nice.", "Paris", "GPE")],
            retention,
        )
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let dir = tempdir().unwrap();
        let outputs = OutputDirectory::create(dir.path().join("out")).await.unwrap();
        let ds = dataset("a.csv", chrono::Duration::hours(24));

        outputs.write("a.csv", b"text,entity,label\n").await.unwrap();

        let bytes = outputs.read(&ds, Utc::now()).await.unwrap();
        assert_eq!(bytes, b"text,entity,label\n");
    }

    #[tokio::test]
    async fn test_expired_and_missing() {
        let dir = tempdir().unwrap();
        let outputs = OutputDirectory::create(dir.path()).await.unwrap();
        let ds = dataset("b.csv", chrono::Duration::hours(24));
        outputs.write("b.csv", b"x").await.unwrap();

        let later = Utc::now() + chrono::Duration::hours(25);
        assert!(matches!(outputs.read(&ds, later).await, Err(Error::Expired(id)) if id == ds.id));

        outputs.remove("b.csv").await.unwrap();
        assert!(matches!(
            outputs.read(&ds, Utc::now()).await,
            Err(Error::FileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempdir().unwrap();
        let outputs = OutputDirectory::create(dir.path()).await.unwrap();

        assert!(outputs.path("../etc/passwd").is_err());
        assert!(outputs.path(".hidden").is_err());
        assert!(outputs.path("dataset_x.csv").is_ok());
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let dir = tempdir().unwrap();
        let outputs = OutputDirectory::create(dir.path()).await.unwrap();
        outputs.write("old.csv", b"x").await.unwrap();

        assert_eq!(outputs.sweep_expired(Duration::from_secs(3600)).await.unwrap(), 0);
        assert!(dir.path().join("old.csv").exists());

        assert_eq!(outputs.sweep_expired(Duration::ZERO).await.unwrap(), 1);
        assert!(!dir.path().join("old.csv").exists());
    }
}
