//! src/services/object_repository.rs
//!
//! ObjectRepository — S3-like put/list/head over a plain directory tree.
//! Payloads live at `root/buckets/{bucket}/{key}`, metadata records are
//! delegated to `MetadataStore` and every call leaves exactly one line in the
//! `AuditLog`.

use crate::{
    errors::{StorageError, StorageResult},
    models::{
        audit::Operation,
        object::{
            ListObjectsResult, ObjectMetadata, ObjectSummary, STORAGE_CLASS, quote_etag,
            unquote_etag,
        },
    },
    services::{
        audit_log::AuditLog,
        hasher::{CHUNK_SIZE, ContentHasher},
        metadata_store::MetadataStore,
        staging::StagedFile,
    },
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt, pin_mut};
use std::{
    collections::HashMap,
    fs::Metadata,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::{Arc, Mutex as StdMutex, PoisonError, Weak},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
    sync::{Mutex, OwnedMutexGuard},
};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

pub const BUCKETS_DIR: &str = "buckets";
pub const METADATA_DIR: &str = "metadata";
pub const LOGS_DIR: &str = "logs";
pub const AUDIT_LOG_FILE: &str = "operations.log";
pub const STAGING_DIR: &str = "staging";

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

/// ObjectRepository provides the simulator's S3-like operations:
/// - Put an object (stage, hash, record metadata, publish)
/// - List objects under a prefix (recomputed from disk on every call)
/// - Head an object (size, hash and mtime without returning content)
///
/// Cloning is cheap; clones share the audit lock and the per-key locks.
#[derive(Clone, Debug)]
pub struct ObjectRepository {
    /// Root of the simulated store.
    root: PathBuf,

    metadata: MetadataStore,

    audit: AuditLog,

    locks: KeyLocks,
}

impl ObjectRepository {
    /// Open (or initialize) a store rooted at `root`, creating the
    /// `buckets/`, `metadata/`, `logs/` and `staging/` directories.
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        for dir in [BUCKETS_DIR, METADATA_DIR, LOGS_DIR, STAGING_DIR] {
            fs::create_dir_all(root.join(dir)).await?;
        }
        debug!("object store initialized at {}", root.display());

        Ok(Self {
            metadata: MetadataStore::new(root.join(METADATA_DIR), root.join(STAGING_DIR)),
            audit: AuditLog::new(root.join(LOGS_DIR).join(AUDIT_LOG_FILE)),
            locks: KeyLocks::default(),
            root,
        })
    }

    pub fn metadata_store(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    /// Physical folder of a bucket. Does not check for existence.
    fn bucket_root(&self, bucket_name: &str) -> PathBuf {
        let mut path = self.root.join(BUCKETS_DIR);
        path.push(bucket_name);
        path
    }

    /// `root/buckets/{bucket}/{key}`, one path component per key segment.
    fn object_path(&self, bucket_name: &str, key: &str) -> PathBuf {
        let mut path = self.bucket_root(bucket_name);
        for segment in key.split('/') {
            path.push(segment);
        }
        path
    }

    /// Store `stream` under `bucket/key`, replacing any previous object.
    ///
    /// The bytes are staged outside the bucket tree and renamed into place
    /// only after they have been fully written, synced and hashed. If the
    /// stream fails or the future is dropped, nothing reaches the key path
    /// and no success is recorded.
    pub async fn put_object_stream<S>(
        &self,
        bucket: &str,
        key: &str,
        source_location: Option<String>,
        stream: S,
    ) -> StorageResult<ObjectMetadata>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let result = self.put_inner(bucket, key, source_location, stream).await;
        self.audit
            .record(Operation::PutObject, bucket, key, &result, |_| String::new())
            .await;
        result
    }

    /// Stream a local file into `bucket/key` in fixed-size chunks.
    pub async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
    ) -> StorageResult<ObjectMetadata> {
        let file = match File::open(source).await {
            Ok(file) => file,
            Err(err) => {
                let result: StorageResult<ObjectMetadata> = Err(StorageError::Read(err));
                self.audit
                    .record(Operation::PutObject, bucket, key, &result, |_| String::new())
                    .await;
                return result;
            }
        };
        let stream = ReaderStream::with_capacity(file, CHUNK_SIZE);
        self.put_object_stream(bucket, key, Some(source.display().to_string()), stream)
            .await
    }

    async fn put_inner<S>(
        &self,
        bucket: &str,
        key: &str,
        source_location: Option<String>,
        stream: S,
    ) -> StorageResult<ObjectMetadata>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        ensure_bucket_name_safe(bucket)?;
        ensure_key_safe(key)?;
        let _key_guard = self.locks.lock(bucket, key).await;

        let file_path = self.object_path(bucket, key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::other("object path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;
        let staging_dir = self.staging_dir();
        fs::create_dir_all(&staging_dir).await?;

        let staged = StagedFile::new(&staging_dir);
        let mut file = File::create(staged.path()).await?;
        let mut size_bytes: u64 = 0;
        pin_mut!(stream);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(StorageError::Read)?;
            size_bytes += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        let content_hash = ContentHasher::hash_file(staged.path()).await?;

        // a failed save must leave the previous object at the key untouched
        let record = ObjectMetadata::new(bucket, key, &content_hash, size_bytes, source_location);
        self.metadata.save(&record).await?;
        staged.publish(&file_path).await?;

        info!(
            "stored {} ({} bytes, etag {})",
            record.location, size_bytes, content_hash
        );
        Ok(record)
    }

    /// List every object whose key starts with `prefix`, in key order.
    ///
    /// Size, mtime and hash are recomputed from the bytes on disk. A bucket
    /// with no directory lists as empty; the empty prefix matches every key.
    pub async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> StorageResult<ListObjectsResult> {
        let result = self.list_inner(bucket, prefix).await;
        self.audit
            .record(Operation::ListObjects, bucket, prefix, &result, |listing| {
                format!("Found {} objects", listing.key_count)
            })
            .await;
        result
    }

    async fn list_inner(&self, bucket: &str, prefix: &str) -> StorageResult<ListObjectsResult> {
        ensure_bucket_name_safe(bucket)?;
        let bucket_root = self.bucket_root(bucket);

        let mut contents = Vec::new();
        let mut pending = vec![bucket_root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(StorageError::Io(err)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }
                let Some(key) = relative_key(&bucket_root, &path) else {
                    debug!("skipping non UTF-8 path {}", path.display());
                    continue;
                };
                if !key.starts_with(prefix) {
                    continue;
                }
                if let Some(summary) = summarize_if_present(key, &path).await? {
                    contents.push(summary);
                }
            }
        }

        contents.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(ListObjectsResult::new(bucket, prefix, contents))
    }

    /// Size, hash and last-modified time of one object.
    ///
    /// A missing key is `StorageError::NotFound`.
    pub async fn head_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectSummary> {
        let result = self.head_inner(bucket, key).await;
        self.audit
            .record(Operation::HeadObject, bucket, key, &result, |_| String::new())
            .await;
        result
    }

    async fn head_inner(&self, bucket: &str, key: &str) -> StorageResult<ObjectSummary> {
        ensure_bucket_name_safe(bucket)?;
        ensure_key_safe(key)?;
        let _key_guard = self.locks.lock(bucket, key).await;

        let path = self.object_path(bucket, key);
        let meta = match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(StorageError::not_found(bucket, key)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StorageError::not_found(bucket, key));
            }
            Err(err) => return Err(StorageError::Io(err)),
        };
        summarize(key.to_string(), &path, &meta).await
    }

    /// Head `bucket/key` and check its recomputed hash against `expected_etag`
    /// (quoted or bare). Audited as one `HEAD_OBJECT`; a mismatch is `FAILED`.
    pub async fn verify_object(
        &self,
        bucket: &str,
        key: &str,
        expected_etag: &str,
    ) -> StorageResult<ObjectSummary> {
        let result = self.verify_inner(bucket, key, expected_etag).await;
        self.audit
            .record(Operation::HeadObject, bucket, key, &result, |_| String::new())
            .await;
        result
    }

    async fn verify_inner(
        &self,
        bucket: &str,
        key: &str,
        expected_etag: &str,
    ) -> StorageResult<ObjectSummary> {
        let summary = self.head_inner(bucket, key).await?;
        let expected = unquote_etag(expected_etag);
        if summary.content_hash() != expected {
            warn!(
                "integrity mismatch for {}/{}: expected {}, found {}",
                bucket,
                key,
                expected,
                summary.content_hash()
            );
            return Err(StorageError::IntegrityMismatch {
                bucket: bucket.to_string(),
                key: key.to_string(),
                expected: expected.to_string(),
                actual: summary.content_hash().to_string(),
            });
        }
        Ok(summary)
    }
}

async fn summarize(key: String, path: &Path, meta: &Metadata) -> StorageResult<ObjectSummary> {
    let last_modified: DateTime<Utc> = meta.modified()?.into();
    let content_hash = ContentHasher::hash_file(path).await?;
    Ok(ObjectSummary {
        key,
        last_modified,
        etag: quote_etag(&content_hash),
        size: meta.len(),
        storage_class: STORAGE_CLASS.to_string(),
    })
}

/// `summarize` for a path found by a directory walk. A file removed since
/// the walk saw it yields `None`.
async fn summarize_if_present(key: String, path: &Path) -> StorageResult<Option<ObjectSummary>> {
    let meta = match fs::metadata(path).await {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(StorageError::Io(err)),
    };
    match summarize(key, path, &meta).await {
        Ok(summary) => Ok(Some(summary)),
        Err(StorageError::Read(err)) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Slash-joined path of `path` below `bucket_root`.
fn relative_key(bucket_root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(bucket_root).ok()?;
    let segments = relative
        .components()
        .map(|component| component.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(segments.join("/"))
}

/// Reject keys that could escape the bucket directory or collide with the
/// directory structure.
///
/// Keys are `/`-separated segments; empty, `.` and `..` segments are refused,
/// as are backslashes and control characters.
fn ensure_key_safe(key: &str) -> StorageResult<()> {
    let invalid = |reason: &str| -> StorageResult<()> {
        Err(StorageError::InvalidObjectKey {
            key: key.to_string(),
            reason: reason.to_string(),
        })
    };
    if key.is_empty() {
        return invalid("must not be empty");
    }
    if key.len() > MAX_OBJECT_KEY_LEN {
        return invalid("longer than 1024 bytes");
    }
    if key.starts_with('/') || key.ends_with('/') {
        return invalid("cannot begin or end with `/`");
    }
    if key.bytes().any(|b| b.is_ascii_control() || b == b'\\') {
        return invalid("contains a control character or backslash");
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return invalid("contains an empty, `.` or `..` segment");
    }
    Ok(())
}

/// Validate bucket name format.
///
/// Enforces S3-like naming rules:
/// - 3–63 characters
/// - lowercase letters, digits, dots, hyphens only
/// - cannot start/end with dot or hyphen
/// - cannot contain consecutive dots or dot-hyphen patterns
/// - cannot look like an IPv4 address
fn ensure_bucket_name_safe(name: &str) -> StorageResult<()> {
    let invalid = |reason: &str| -> StorageResult<()> {
        Err(StorageError::InvalidBucketName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    let len = name.len();
    if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
        return invalid("must be between 3 and 63 characters");
    }
    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
    {
        return invalid("allowed characters are lowercase letters, digits, dots, and hyphens");
    }
    if name.starts_with('.') || name.ends_with('.') || name.starts_with('-') || name.ends_with('-')
    {
        return invalid("must start and end with a lowercase letter or digit");
    }
    if name.contains("..") || name.contains("-.") || name.contains(".-") {
        return invalid("cannot contain consecutive dots or dot-hyphen combinations");
    }
    if is_ipv4_like(name) {
        return invalid("must not be formatted like an IP address");
    }
    Ok(())
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() != 4 {
        return false;
    }
    parts.iter().all(|segment| {
        !segment.is_empty()
            && segment.len() <= 3
            && segment.chars().all(|c| c.is_ascii_digit())
            && segment.parse::<u8>().is_ok()
    })
}

/// Per-`(bucket, key)` async mutexes. Puts on the same key queue behind each
/// other; different keys never contend.
#[derive(Clone, Debug, Default)]
struct KeyLocks {
    inner: Arc<StdMutex<HashMap<String, Weak<Mutex<()>>>>>,
}

impl KeyLocks {
    async fn lock(&self, bucket: &str, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.retain(|_, weak| weak.strong_count() > 0);
            let id = format!("{}/{}", bucket, key);
            match map.get(&id).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(Mutex::new(()));
                    map.insert(id, Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audit::AuditStatus;
    use futures::stream;
    use tempfile::TempDir;

    fn body(bytes: &'static [u8]) -> impl Stream<Item = io::Result<Bytes>> {
        stream::iter(vec![Ok(Bytes::from_static(bytes))])
    }

    #[tokio::test]
    async fn open_creates_layout() {
        let temp = TempDir::new().unwrap();
        ObjectRepository::open(temp.path()).await.unwrap();
        for dir in [BUCKETS_DIR, METADATA_DIR, LOGS_DIR, STAGING_DIR] {
            assert!(temp.path().join(dir).is_dir(), "{dir} missing");
        }
    }

    #[tokio::test]
    async fn put_writes_payload_and_record() {
        let temp = TempDir::new().unwrap();
        let repo = ObjectRepository::open(temp.path()).await.unwrap();

        let meta = repo
            .put_object_stream("test-bucket", "reports/r.json", None, body(b"{}"))
            .await
            .unwrap();

        let payload = temp.path().join("buckets/test-bucket/reports/r.json");
        assert_eq!(std::fs::read(payload).unwrap(), b"{}");
        assert_eq!(meta.content_length, 2);
        assert_eq!(meta.content_hash(), ContentHasher::hash_bytes(b"{}"));
        assert_eq!(
            repo.metadata_store().load(meta.content_hash()).await.unwrap(),
            meta
        );
    }

    #[tokio::test]
    async fn chunked_stream_is_stored_whole() {
        let temp = TempDir::new().unwrap();
        let repo = ObjectRepository::open(temp.path()).await.unwrap();
        let chunks = stream::iter(vec![
            Ok(Bytes::from_static(b"id,name\n")),
            Ok(Bytes::new()),
            Ok(Bytes::from_static(b"1,x\n")),
        ]);

        let meta = repo
            .put_object_stream("test-bucket", "a.csv", None, chunks)
            .await
            .unwrap();
        assert_eq!(meta.content_length, 12);
        assert_eq!(meta.content_hash(), ContentHasher::hash_bytes(b"id,name\n1,x\n"));
    }

    #[tokio::test]
    async fn put_file_records_source_location() {
        let temp = TempDir::new().unwrap();
        let repo = ObjectRepository::open(temp.path().join("store")).await.unwrap();
        let source = temp.path().join("anime.csv");
        std::fs::write(&source, b"anime_id,name\n").unwrap();

        let meta = repo
            .put_file("test-bucket", "backups/t/anime.csv", &source)
            .await
            .unwrap();
        assert_eq!(meta.source_location.as_deref(), Some(source.to_str().unwrap()));
        assert_eq!(meta.content_length, 14);
    }

    #[tokio::test]
    async fn put_file_with_missing_source_is_audited_failure() {
        let temp = TempDir::new().unwrap();
        let repo = ObjectRepository::open(temp.path()).await.unwrap();

        let err = repo
            .put_file("test-bucket", "k", &temp.path().join("absent.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Read(_)));

        let entries = repo.audit_log().read_all().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, Operation::PutObject);
        assert_eq!(entries[0].status, AuditStatus::Failed);
    }

    #[tokio::test]
    async fn invalid_names_are_rejected_and_audited() {
        let temp = TempDir::new().unwrap();
        let repo = ObjectRepository::open(temp.path()).await.unwrap();

        let bad_bucket = repo
            .put_object_stream("Bad_Bucket", "k", None, body(b"x"))
            .await;
        assert!(matches!(bad_bucket, Err(StorageError::InvalidBucketName { .. })));

        let bad_key = repo
            .put_object_stream("test-bucket", "../escape", None, body(b"x"))
            .await;
        assert!(matches!(bad_key, Err(StorageError::InvalidObjectKey { .. })));

        let bad_head = repo.head_object("test-bucket", "a//b").await;
        assert!(matches!(bad_head, Err(StorageError::InvalidObjectKey { .. })));

        let entries = repo.audit_log().read_all().await.unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.status == AuditStatus::Failed));
        assert!(!temp.path().join("escape").exists());
    }

    #[tokio::test]
    async fn list_of_missing_bucket_is_empty_success() {
        let temp = TempDir::new().unwrap();
        let repo = ObjectRepository::open(temp.path()).await.unwrap();

        let listing = repo.list_objects("no-such-bucket", "").await.unwrap();
        assert_eq!(listing.key_count, 0);
        assert!(listing.contents.is_empty());
        assert_eq!(listing.name, "no-such-bucket");

        let entries = repo.audit_log().read_all().await.unwrap();
        assert_eq!(entries[0].status, AuditStatus::Success);
        assert_eq!(entries[0].message, "Found 0 objects");
    }

    #[tokio::test]
    async fn list_is_sorted_and_recomputed_from_disk() {
        let temp = TempDir::new().unwrap();
        let repo = ObjectRepository::open(temp.path()).await.unwrap();
        for key in ["b/2.csv", "a/1.csv", "b/1.csv"] {
            repo.put_object_stream("test-bucket", key, None, body(b"row"))
                .await
                .unwrap();
        }
        // tamper with one payload behind the repository's back
        std::fs::write(temp.path().join("buckets/test-bucket/a/1.csv"), b"changed").unwrap();

        let listing = repo.list_objects("test-bucket", "").await.unwrap();
        let keys: Vec<&str> = listing.keys().collect();
        assert_eq!(keys, ["a/1.csv", "b/1.csv", "b/2.csv"]);
        assert_eq!(listing.contents[0].size, 7);
        assert_eq!(
            listing.contents[0].content_hash(),
            ContentHasher::hash_bytes(b"changed")
        );
        assert_eq!(listing.contents[1].storage_class, STORAGE_CLASS);
    }

    #[tokio::test]
    async fn head_reports_size_and_hash() {
        let temp = TempDir::new().unwrap();
        let repo = ObjectRepository::open(temp.path()).await.unwrap();
        let meta = repo
            .put_object_stream("test-bucket", "k.bin", None, body(b"0123456789"))
            .await
            .unwrap();

        let head = repo.head_object("test-bucket", "k.bin").await.unwrap();
        assert_eq!(head.size, 10);
        assert_eq!(head.etag, meta.etag);
        assert_eq!(head.key, "k.bin");
    }

    #[tokio::test]
    async fn head_on_directory_is_not_found() {
        let temp = TempDir::new().unwrap();
        let repo = ObjectRepository::open(temp.path()).await.unwrap();
        repo.put_object_stream("test-bucket", "dir/file", None, body(b"x"))
            .await
            .unwrap();

        let err = repo.head_object("test-bucket", "dir").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn verify_detects_tampering() {
        let temp = TempDir::new().unwrap();
        let repo = ObjectRepository::open(temp.path()).await.unwrap();
        let meta = repo
            .put_object_stream("test-bucket", "k", None, body(b"original"))
            .await
            .unwrap();

        repo.verify_object("test-bucket", "k", &meta.etag)
            .await
            .unwrap();

        std::fs::write(temp.path().join("buckets/test-bucket/k"), b"tampered").unwrap();
        let err = repo
            .verify_object("test-bucket", "k", meta.content_hash())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::IntegrityMismatch { .. }));
    }

    #[tokio::test]
    async fn verify_mismatch_is_audited_as_failed_head() {
        let temp = TempDir::new().unwrap();
        let repo = ObjectRepository::open(temp.path()).await.unwrap();
        let meta = repo
            .put_object_stream("test-bucket", "k", None, body(b"original"))
            .await
            .unwrap();

        repo.verify_object("test-bucket", "k", &meta.etag)
            .await
            .unwrap();
        repo.verify_object("test-bucket", "k", &"0".repeat(32))
            .await
            .unwrap_err();

        let entries = repo.audit_log().read_all().await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].operation, Operation::HeadObject);
        assert_eq!(entries[1].status, AuditStatus::Success);
        assert_eq!(entries[2].operation, Operation::HeadObject);
        assert_eq!(entries[2].status, AuditStatus::Failed);
        assert!(entries[2].message.contains("integrity mismatch"));
    }

    #[tokio::test]
    async fn vanished_file_is_skipped_by_summary() {
        let temp = TempDir::new().unwrap();
        let gone = temp.path().join("removed.csv");

        let summary = summarize_if_present("removed.csv".into(), &gone)
            .await
            .unwrap();
        assert!(summary.is_none());

        std::fs::write(&gone, b"back").unwrap();
        let summary = summarize_if_present("removed.csv".into(), &gone)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.size, 4);
    }

    #[test]
    fn key_rules() {
        assert!(ensure_key_safe("backups/20240101_000000/a.csv").is_ok());
        assert!(ensure_key_safe("notes..txt").is_ok());
        assert!(ensure_key_safe("").is_err());
        assert!(ensure_key_safe("/abs").is_err());
        assert!(ensure_key_safe("trailing/").is_err());
        assert!(ensure_key_safe("a/./b").is_err());
        assert!(ensure_key_safe("a/../b").is_err());
        assert!(ensure_key_safe("a\\b").is_err());
        assert!(ensure_key_safe("a\nb").is_err());
        assert!(ensure_key_safe(&"k".repeat(MAX_OBJECT_KEY_LEN + 1)).is_err());
    }

    #[test]
    fn bucket_rules() {
        assert!(ensure_bucket_name_safe("test-bucket").is_ok());
        assert!(ensure_bucket_name_safe("anime-data-pipeline-prod").is_ok());
        assert!(ensure_bucket_name_safe("ab").is_err());
        assert!(ensure_bucket_name_safe("Upper").is_err());
        assert!(ensure_bucket_name_safe("-leading").is_err());
        assert!(ensure_bucket_name_safe("a..b").is_err());
        assert!(ensure_bucket_name_safe("192.168.1.1").is_err());
        assert!(ensure_bucket_name_safe("1.2.3").is_ok());
    }

    #[test]
    fn relative_keys_use_forward_slashes() {
        let root = Path::new("/store/buckets/b");
        assert_eq!(
            relative_key(root, &root.join("x").join("y.csv")).as_deref(),
            Some("x/y.csv")
        );
        assert_eq!(relative_key(root, Path::new("/elsewhere/y")), None);
    }

    #[tokio::test]
    async fn key_locks_are_released() {
        let locks = KeyLocks::default();
        {
            let _a = locks.lock("b", "k").await;
        }
        let _again = locks.lock("b", "k").await;
        let _other = locks.lock("b", "other").await;
    }
}
