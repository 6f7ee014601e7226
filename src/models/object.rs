//! Represents an object (file) stored in a bucket and the views returned
//! by list and head.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage class reported for every object; the simulator has only one tier.
pub const STORAGE_CLASS: &str = "STANDARD";

/// Versioning is not implemented, so every record carries S3's literal `"null"`.
pub const VERSION_ID: &str = "null";

/// Scheme used when synthesizing the `Location` of an object.
pub const LOCATION_SCHEME: &str = "s3";

/// Persisted descriptor of a stored object, addressed by its content hash.
///
/// Field names follow the S3 response shape so the JSON files under
/// `metadata/` read like a `PutObject`/`HeadObject` reply.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectMetadata {
    /// Content hash wrapped in double quotes, as S3 renders ETags.
    #[serde(rename = "ETag")]
    pub etag: String,

    /// Timestamp of the write that produced this record.
    pub last_modified: DateTime<Utc>,

    /// Size in bytes.
    pub content_length: u64,

    pub storage_class: String,

    pub bucket: String,

    pub key: String,

    /// Synthesized resource identifier, `s3://<bucket>/<key>`.
    pub location: String,

    pub version_id: String,

    /// When the record was first built for this upload.
    pub created_at: DateTime<Utc>,

    /// Path the bytes were read from, when the upload came from a file.
    pub source_location: Option<String>,
}

impl ObjectMetadata {
    pub fn new(
        bucket: &str,
        key: &str,
        content_hash: &str,
        content_length: u64,
        source_location: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            etag: quote_etag(content_hash),
            last_modified: now,
            content_length,
            storage_class: STORAGE_CLASS.to_string(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            location: object_location(bucket, key),
            version_id: VERSION_ID.to_string(),
            created_at: now,
            source_location,
        }
    }

    /// The bare hex digest, without the ETag quotes.
    pub fn content_hash(&self) -> &str {
        unquote_etag(&self.etag)
    }
}

/// Per-key view computed from the on-disk bytes by list and head.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectSummary {
    pub key: String,
    pub last_modified: DateTime<Utc>,
    #[serde(rename = "ETag")]
    pub etag: String,
    pub size: u64,
    pub storage_class: String,
}

impl ObjectSummary {
    pub fn content_hash(&self) -> &str {
        unquote_etag(&self.etag)
    }
}

/// Result of a bucket listing. Listing is unbounded, so `is_truncated` is
/// always false.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct ListObjectsResult {
    pub contents: Vec<ObjectSummary>,
    pub is_truncated: bool,
    pub key_count: usize,
    pub name: String,
    pub prefix: String,
}

impl ListObjectsResult {
    pub fn new(bucket: &str, prefix: &str, contents: Vec<ObjectSummary>) -> Self {
        Self {
            key_count: contents.len(),
            contents,
            is_truncated: false,
            name: bucket.to_string(),
            prefix: prefix.to_string(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.contents.iter().map(|obj| obj.key.as_str())
    }
}

pub fn quote_etag(content_hash: &str) -> String {
    format!("\"{}\"", content_hash)
}

pub fn unquote_etag(etag: &str) -> &str {
    etag.trim_matches('"')
}

pub fn object_location(bucket: &str, key: &str) -> String {
    format!("{}://{}/{}", LOCATION_SCHEME, bucket, key)
}
