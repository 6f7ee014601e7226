//! BackupService — copies external files into the store under
//! time-partitioned keys and aggregates the per-file outcomes.
//!
//! A failed or missing source never aborts the run; it is recorded and the
//! next source is processed.

use crate::{
    errors::{StorageError, StorageResult},
    models::{
        backup::{
            BackupOutcome, BackupReport, BackupSource, VerificationResult, VerificationStatus,
        },
        object::ObjectMetadata,
    },
    services::object_repository::ObjectRepository,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::{collections::HashSet, io::ErrorKind};
use tokio::fs;
use tracing::{error, info, warn};

/// Sources copied concurrently by default.
pub const DEFAULT_WORKERS: usize = 4;

/// Category under which run reports are published.
pub const REPORTS_CATEGORY: &str = "reports";

/// Partition segment for a run started at `at`, e.g. `20240101_000000`.
pub fn partition_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

#[derive(Clone, Debug)]
pub struct BackupService {
    repo: ObjectRepository,
    bucket: String,
    workers: usize,
}

impl BackupService {
    pub fn new(repo: ObjectRepository, bucket: impl Into<String>) -> Self {
        Self {
            repo,
            bucket: bucket.into(),
            workers: DEFAULT_WORKERS,
        }
    }

    /// Bound on how many sources are copied at once (minimum 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn repository(&self) -> &ObjectRepository {
        &self.repo
    }

    /// Back up `sources` under a partition derived from the current time.
    pub async fn run(&self, sources: &[BackupSource]) -> BackupReport {
        self.run_partitioned(sources, &partition_timestamp(Utc::now()))
            .await
    }

    /// Back up `sources` under an explicit partition segment.
    ///
    /// Outcomes are returned in input order regardless of completion order.
    pub async fn run_partitioned(&self, sources: &[BackupSource], partition: &str) -> BackupReport {
        info!(
            "starting backup of {} sources into s3://{}/ (partition {})",
            sources.len(),
            self.bucket,
            partition
        );

        // only the first source claiming a key is stored
        let mut claimed = HashSet::new();
        let plan: Vec<(&BackupSource, bool)> = sources
            .iter()
            .map(|source| {
                let first = source
                    .object_key(partition)
                    .is_none_or(|key| claimed.insert(key));
                (source, first)
            })
            .collect();

        let outcomes: Vec<BackupOutcome> = stream::iter(plan)
            .map(|(source, first)| self.backup_one(source, partition, first))
            .buffered(self.workers)
            .collect()
            .await;

        let report = BackupReport::new(&self.bucket, partition, outcomes);
        info!(
            "backup {} finished: {}/{} succeeded, {} bytes",
            report.operation_id,
            report.summary.succeeded,
            report.summary.total_attempted,
            report.summary.total_bytes
        );
        report
    }

    async fn backup_one(
        &self,
        source: &BackupSource,
        partition: &str,
        first_for_key: bool,
    ) -> BackupOutcome {
        let key = source.object_key(partition);
        match fs::metadata(&source.path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return BackupOutcome::failed(&source.path, key, "source is not a regular file");
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!("file not found: {}", source.path.display());
                return BackupOutcome::not_found(&source.path, key);
            }
            Err(err) => return BackupOutcome::failed(&source.path, key, err.to_string()),
        }
        let Some(key) = key else {
            return BackupOutcome::failed(&source.path, None, "source path has no file name");
        };
        if !first_for_key {
            warn!(
                "skipping {}: key {} already used in this run",
                source.path.display(),
                key
            );
            return BackupOutcome::failed(
                &source.path,
                Some(key),
                "another source in this run maps to the same key",
            );
        }

        match self.repo.put_file(&self.bucket, &key, &source.path).await {
            Ok(meta) => BackupOutcome::success(&source.path, key, meta),
            Err(err) => {
                error!("backup failed for {}: {}", source.path.display(), err);
                BackupOutcome::failed(&source.path, Some(key), err.to_string())
            }
        }
    }

    /// Re-check every successful outcome of `report` against the ETag
    /// recorded when it was stored.
    pub async fn verify_report(&self, report: &BackupReport) -> Vec<VerificationResult> {
        let mut results = Vec::new();
        for outcome in report.successes() {
            let (Some(key), Some(meta)) = (&outcome.key, &outcome.metadata) else {
                continue;
            };
            let result = self.repo.verify_object(&report.bucket, key, &meta.etag).await;
            results.push(classify(key, result.map(|_| ())));
        }
        results
    }

    /// Check that every object under `prefix` still hashes to content the
    /// store has a metadata record for.
    pub async fn verify_prefix(&self, prefix: &str) -> StorageResult<Vec<VerificationResult>> {
        let listing = self.repo.list_objects(&self.bucket, prefix).await?;
        let mut results = Vec::with_capacity(listing.key_count);
        for object in &listing.contents {
            let record = self
                .repo
                .metadata_store()
                .load(object.content_hash())
                .await;
            let result = match record {
                Ok(record) if record.content_length == object.size => VerificationResult::new(
                    &object.key,
                    VerificationStatus::Verified,
                    None,
                ),
                Ok(record) => VerificationResult::new(
                    &object.key,
                    VerificationStatus::Mismatch,
                    Some(format!(
                        "size {} differs from recorded {}",
                        object.size, record.content_length
                    )),
                ),
                Err(StorageError::MetadataNotFound(hash)) => VerificationResult::new(
                    &object.key,
                    VerificationStatus::Unregistered,
                    Some(format!("no metadata record for hash {}", hash)),
                ),
                Err(err) => VerificationResult::new(
                    &object.key,
                    VerificationStatus::Error,
                    Some(err.to_string()),
                ),
            };
            results.push(result);
        }
        Ok(results)
    }

    /// Store `report` as `reports/backup_report_<partition>.json`.
    pub async fn publish_report(&self, report: &BackupReport) -> StorageResult<ObjectMetadata> {
        let body = Bytes::from(serde_json::to_vec_pretty(report)?);
        let key = format!(
            "{}/backup_report_{}.json",
            REPORTS_CATEGORY, report.partition
        );
        self.repo
            .put_object_stream(&self.bucket, &key, None, stream::iter([Ok(body)]))
            .await
    }
}

fn classify(key: &str, result: StorageResult<()>) -> VerificationResult {
    match result {
        Ok(()) => VerificationResult::new(key, VerificationStatus::Verified, None),
        Err(StorageError::IntegrityMismatch {
            expected, actual, ..
        }) => VerificationResult::new(
            key,
            VerificationStatus::Mismatch,
            Some(format!("expected {}, found {}", expected, actual)),
        ),
        Err(err) if err.is_not_found() => {
            VerificationResult::new(key, VerificationStatus::Missing, Some(err.to_string()))
        }
        Err(err) => VerificationResult::new(key, VerificationStatus::Error, Some(err.to_string())),
    }
}
