//! MetadataStore — one JSON record per distinct content hash, stored as
//! `metadata/<hash>.json`. Writes go to a staging file first and are renamed
//! into place, so readers never see a half-written record.

use crate::{
    errors::{StorageError, StorageResult},
    models::object::ObjectMetadata,
    services::{hasher::ContentHasher, staging::StagedFile},
};
use std::{io::ErrorKind, path::PathBuf};
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;

#[derive(Clone, Debug)]
pub struct MetadataStore {
    dir: PathBuf,
    staging_dir: PathBuf,
}

impl MetadataStore {
    /// `staging_dir` must live on the same filesystem as `dir` for the
    /// final rename to be atomic.
    pub fn new(dir: impl Into<PathBuf>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            staging_dir: staging_dir.into(),
        }
    }

    fn record_path(&self, content_hash: &str) -> PathBuf {
        self.dir.join(format!("{}.json", content_hash))
    }

    /// Write or replace the record for `record.content_hash()`.
    pub async fn save(&self, record: &ObjectMetadata) -> StorageResult<()> {
        let hash = record.content_hash();
        if !ContentHasher::is_digest(hash) {
            return Err(StorageError::InvalidRecordAddress(hash.to_string()));
        }
        let body = serde_json::to_vec_pretty(record)?;

        fs::create_dir_all(&self.dir).await?;
        fs::create_dir_all(&self.staging_dir).await?;
        let staged = StagedFile::new(&self.staging_dir);
        let mut file = fs::File::create(staged.path()).await?;
        file.write_all(&body).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        let path = self.record_path(hash);
        staged.publish(&path).await?;
        debug!("saved metadata record {}", path.display());
        Ok(())
    }

    pub async fn load(&self, content_hash: &str) -> StorageResult<ObjectMetadata> {
        if !ContentHasher::is_digest(content_hash) {
            return Err(StorageError::MetadataNotFound(content_hash.to_string()));
        }
        let bytes = match fs::read(self.record_path(content_hash)).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StorageError::MetadataNotFound(content_hash.to_string()));
            }
            Err(err) => return Err(StorageError::Io(err)),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Number of persisted records.
    pub async fn count(&self) -> StorageResult<usize> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(StorageError::Io(err)),
        };
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if name.to_string_lossy().ends_with(".json") && entry.file_type().await?.is_file() {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> MetadataStore {
        MetadataStore::new(temp.path().join("metadata"), temp.path().join("staging"))
    }

    #[tokio::test]
    async fn save_then_load() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let hash = ContentHasher::hash_bytes(b"payload");
        let record = ObjectMetadata::new("test-bucket", "a/b.csv", &hash, 7, Some("b.csv".into()));

        store.save(&record).await.unwrap();
        let loaded = store.load(&hash).await.unwrap();

        assert_eq!(loaded, record);
        assert!(temp.path().join("metadata").join(format!("{hash}.json")).is_file());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn same_hash_overwrites_single_record() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let hash = ContentHasher::hash_bytes(b"same");

        store
            .save(&ObjectMetadata::new("test-bucket", "first", &hash, 4, None))
            .await
            .unwrap();
        store
            .save(&ObjectMetadata::new("test-bucket", "second", &hash, 4, None))
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.load(&hash).await.unwrap().key, "second");
    }

    #[tokio::test]
    async fn staging_is_left_empty() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let hash = ContentHasher::hash_bytes(b"x");
        store
            .save(&ObjectMetadata::new("test-bucket", "x", &hash, 1, None))
            .await
            .unwrap();

        let mut staged = std::fs::read_dir(temp.path().join("staging")).unwrap();
        assert!(staged.next().is_none());
    }

    #[tokio::test]
    async fn missing_and_malformed_hashes_are_not_found() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let missing = store.load(&ContentHasher::hash_bytes(b"never")).await;
        assert!(matches!(missing, Err(StorageError::MetadataNotFound(_))));

        let traversal = store.load("../logs/operations").await;
        assert!(matches!(traversal, Err(StorageError::MetadataNotFound(_))));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn save_rejects_non_digest_etag() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let record = ObjectMetadata::new("test-bucket", "k", "../escape", 1, None);

        let err = store.save(&record).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidRecordAddress(ref hash) if hash == "../escape"));
        assert!(!err.is_not_found());
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
