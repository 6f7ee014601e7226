//! Read-only view of what a bucket holds and how operations have fared.

use crate::{
    errors::StorageResult,
    models::{audit::AuditSummary, backup::DEFAULT_CATEGORY},
    services::object_repository::ObjectRepository,
};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct CategoryStats {
    pub objects: usize,
    pub bytes: u64,
}

/// All objects sharing one `backups/<session>/` partition.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct BackupSession {
    pub name: String,
    pub objects: usize,
    pub bytes: u64,
}

#[derive(Serialize, Clone, Debug)]
pub struct StorageSnapshot {
    pub bucket: String,
    pub total_objects: usize,
    pub total_bytes: u64,
    /// Keyed by the first key segment; keys without a `/` fall under `""`.
    pub categories: BTreeMap<String, CategoryStats>,
    /// Newest session first.
    pub sessions: Vec<BackupSession>,
    pub metadata_records: usize,
    pub audit: AuditSummary,
}

#[derive(Clone, Debug)]
pub struct StorageMonitor {
    repo: ObjectRepository,
}

impl StorageMonitor {
    pub fn new(repo: ObjectRepository) -> Self {
        Self { repo }
    }

    /// Summarize `bucket`. Issues one audited list over the whole bucket.
    pub async fn snapshot(&self, bucket: &str) -> StorageResult<StorageSnapshot> {
        let listing = self.repo.list_objects(bucket, "").await?;

        let mut categories: BTreeMap<String, CategoryStats> = BTreeMap::new();
        let mut sessions: BTreeMap<String, CategoryStats> = BTreeMap::new();
        let mut total_bytes = 0;
        for object in &listing.contents {
            total_bytes += object.size;
            let mut segments = object.key.splitn(3, '/');
            let first = segments.next().unwrap_or_default();
            let second = segments.next();
            let third = segments.next();

            let category = if second.is_some() { first } else { "" };
            let stats = categories.entry(category.to_string()).or_default();
            stats.objects += 1;
            stats.bytes += object.size;

            if let (DEFAULT_CATEGORY, Some(session), Some(_)) = (first, second, third) {
                let stats = sessions.entry(session.to_string()).or_default();
                stats.objects += 1;
                stats.bytes += object.size;
            }
        }

        Ok(StorageSnapshot {
            bucket: bucket.to_string(),
            total_objects: listing.key_count,
            total_bytes,
            categories,
            sessions: sessions
                .into_iter()
                .rev()
                .map(|(name, stats)| BackupSession {
                    name,
                    objects: stats.objects,
                    bytes: stats.bytes,
                })
                .collect(),
            metadata_records: self.repo.metadata_store().count().await?,
            audit: self.repo.audit_log().summary().await?,
        })
    }
}
