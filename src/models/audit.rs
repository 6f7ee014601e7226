//! Represents one line of the operation audit log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Repository operation recorded in the audit log.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    PutObject,
    ListObjects,
    HeadObject,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Success,
    Failed,
}

/// A single operation attempt and its outcome.
///
/// For list operations `key` holds the requested prefix.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
    pub bucket: String,
    pub key: String,
    pub status: AuditStatus,
    pub message: String,
}

impl AuditEntry {
    pub fn new(
        operation: Operation,
        bucket: &str,
        key: &str,
        status: AuditStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            bucket: bucket.to_string(),
            key: key.to_string(),
            status,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AuditStatus::Success
    }
}

/// Aggregate counts over the whole audit log.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct AuditSummary {
    pub total_operations: usize,
    pub successful: usize,
    pub failed: usize,
    /// Percentage of successful entries; 0 for an empty log.
    pub success_rate: f64,
}

impl AuditSummary {
    pub fn push(&mut self, entry: &AuditEntry) {
        self.total_operations += 1;
        if entry.is_success() {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.success_rate = percentage(self.successful, self.total_operations);
    }
}

pub(crate) fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
