//! Backup run inputs, per-file outcomes and the aggregate report.

use crate::models::{audit::percentage, object::ObjectMetadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Category used when a source does not name one.
pub const DEFAULT_CATEGORY: &str = "backups";

/// An external file to copy into the store under `<category>/<timestamp>/`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BackupSource {
    pub path: PathBuf,
    pub category: String,
}

impl BackupSource {
    pub fn new(path: impl Into<PathBuf>, category: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            category: category.into(),
        }
    }

    /// Time-partitioned key: `<category>/<timestamp>/<basename>`.
    ///
    /// Returns `None` when the path has no file name component.
    pub fn object_key(&self, timestamp: &str) -> Option<String> {
        let basename = self.path.file_name()?.to_str()?;
        let category = self.category.trim_matches('/');
        Some(format!("{}/{}/{}", category, timestamp, basename))
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackupStatus {
    Success,
    Failed,
    NotFound,
}

/// What happened to one source during a backup run.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BackupOutcome {
    pub file: PathBuf,
    pub status: BackupStatus,
    /// Object key the source was (or would have been) stored under.
    pub key: Option<String>,
    pub location: Option<String>,
    pub metadata: Option<ObjectMetadata>,
    pub error: Option<String>,
}

impl BackupOutcome {
    pub fn success(file: &Path, key: String, metadata: ObjectMetadata) -> Self {
        Self {
            file: file.to_path_buf(),
            status: BackupStatus::Success,
            location: Some(metadata.location.clone()),
            key: Some(key),
            metadata: Some(metadata),
            error: None,
        }
    }

    pub fn failed(file: &Path, key: Option<String>, error: impl Into<String>) -> Self {
        Self {
            file: file.to_path_buf(),
            status: BackupStatus::Failed,
            key,
            location: None,
            metadata: None,
            error: Some(error.into()),
        }
    }

    pub fn not_found(file: &Path, key: Option<String>) -> Self {
        Self {
            file: file.to_path_buf(),
            status: BackupStatus::NotFound,
            key,
            location: None,
            metadata: None,
            error: Some("File does not exist".into()),
        }
    }

    pub fn bytes_transferred(&self) -> u64 {
        match (&self.status, &self.metadata) {
            (BackupStatus::Success, Some(meta)) => meta.content_length,
            _ => 0,
        }
    }
}

/// Aggregate over every outcome of a run.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct BackupSummary {
    pub total_attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub not_found: usize,
    /// Percentage of attempted sources stored successfully.
    pub success_rate: f64,
    pub total_bytes: u64,
}

impl BackupSummary {
    pub fn from_outcomes(outcomes: &[BackupOutcome]) -> Self {
        let mut summary = Self {
            total_attempted: outcomes.len(),
            ..Self::default()
        };
        for outcome in outcomes {
            match outcome.status {
                BackupStatus::Success => summary.succeeded += 1,
                BackupStatus::Failed => summary.failed += 1,
                BackupStatus::NotFound => summary.not_found += 1,
            }
            summary.total_bytes += outcome.bytes_transferred();
        }
        summary.success_rate = percentage(summary.succeeded, summary.total_attempted);
        summary
    }
}

/// Handed to reporting collaborators after a run.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BackupReport {
    pub operation_id: String,
    pub timestamp: DateTime<Utc>,
    /// Partition segment shared by every key written in this run.
    pub partition: String,
    pub bucket: String,
    pub summary: BackupSummary,
    pub outcomes: Vec<BackupOutcome>,
}

impl BackupReport {
    pub fn new(bucket: &str, partition: &str, outcomes: Vec<BackupOutcome>) -> Self {
        Self {
            operation_id: format!("backup_{}", partition),
            timestamp: Utc::now(),
            partition: partition.to_string(),
            bucket: bucket.to_string(),
            summary: BackupSummary::from_outcomes(&outcomes),
            outcomes,
        }
    }

    pub fn successes(&self) -> impl Iterator<Item = &BackupOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == BackupStatus::Success)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Verified,
    Mismatch,
    Missing,
    /// The on-disk hash has no metadata record.
    Unregistered,
    Error,
}

/// Result of re-checking one stored object.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct VerificationResult {
    pub key: String,
    pub status: VerificationStatus,
    pub detail: Option<String>,
}

impl VerificationResult {
    pub fn new(key: impl Into<String>, status: VerificationStatus, detail: Option<String>) -> Self {
        Self {
            key: key.into(),
            status,
            detail,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.status == VerificationStatus::Verified
    }
}
