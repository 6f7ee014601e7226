//! Error taxonomy shared by every storage component.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NotFound { bucket: String, key: String },
    #[error("metadata record `{0}` not found")]
    MetadataNotFound(String),
    #[error("metadata record address `{0}` is not a content digest")]
    InvalidRecordAddress(String),
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("invalid object key `{key}`: {reason}")]
    InvalidObjectKey { key: String, reason: String },
    #[error("integrity mismatch for `{bucket}/{key}`: expected {expected}, found {actual}")]
    IntegrityMismatch {
        bucket: String,
        key: String,
        expected: String,
        actual: String,
    },
    #[error("failed to read source: {0}")]
    Read(#[source] io::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Shortcut for an object-level NotFound.
    pub fn not_found(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// True for the expected-absence variants (object or metadata record).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::MetadataNotFound(_))
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
