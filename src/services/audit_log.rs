//! AuditLog — append-only, newline-delimited JSON record of every
//! repository operation attempt (`logs/operations.log`).
//!
//! Appends are best-effort from the caller's point of view: a failed append
//! is reported through `tracing::error!` and never turns a successful
//! operation into a failed one.

use crate::{
    errors::{StorageError, StorageResult},
    models::audit::{AuditEntry, AuditStatus, AuditSummary, Operation},
};
use futures::{
    TryStreamExt,
    stream::{self, BoxStream, StreamExt},
};
use std::{
    io::{self, ErrorKind},
    path::PathBuf,
    sync::Arc,
};
use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    sync::Mutex,
};
use tracing::error;

#[derive(Clone, Debug)]
pub struct AuditLog {
    path: PathBuf,
    /// Serializes appends so file order matches call order.
    write_lock: Arc<Mutex<()>>,
}

enum ReadState {
    Unopened(PathBuf),
    Reading(Lines<BufReader<File>>),
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Append one entry. Failures go to the error log only.
    pub async fn append(&self, entry: &AuditEntry) {
        if let Err(err) = self.try_append(entry).await {
            error!(
                operation = ?entry.operation,
                bucket = %entry.bucket,
                key = %entry.key,
                status = ?entry.status,
                "failed to append audit entry to {}: {}",
                self.path.display(),
                err
            );
        }
    }

    async fn try_append(&self, entry: &AuditEntry) -> io::Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }

    /// Audit the outcome of an operation at its call boundary.
    ///
    /// `Ok` becomes a `SUCCESS` entry with the message built by `describe`;
    /// `Err` becomes `FAILED` with the error text.
    pub async fn record<T, F>(
        &self,
        operation: Operation,
        bucket: &str,
        key: &str,
        result: &StorageResult<T>,
        describe: F,
    ) where
        F: FnOnce(&T) -> String,
    {
        let entry = match result {
            Ok(value) => AuditEntry::new(
                operation,
                bucket,
                key,
                AuditStatus::Success,
                describe(value),
            ),
            Err(err) => AuditEntry::new(
                operation,
                bucket,
                key,
                AuditStatus::Failed,
                failure_message(err),
            ),
        };
        self.append(&entry).await;
    }

    /// Lazily stream every entry from the start of the log.
    ///
    /// Each call re-opens the file. A log that does not exist yet yields an
    /// empty stream; a malformed line ends the stream with an error.
    pub fn entries(&self) -> BoxStream<'static, StorageResult<AuditEntry>> {
        stream::try_unfold(ReadState::Unopened(self.path.clone()), |state| async move {
            let mut lines = match state {
                ReadState::Unopened(path) => match File::open(&path).await {
                    Ok(file) => BufReader::new(file).lines(),
                    Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
                    Err(err) => return Err(StorageError::Io(err)),
                },
                ReadState::Reading(lines) => lines,
            };
            while let Some(line) = lines.next_line().await? {
                if line.trim().is_empty() {
                    continue;
                }
                let entry: AuditEntry = serde_json::from_str(&line)?;
                return Ok(Some((entry, ReadState::Reading(lines))));
            }
            Ok(None)
        })
        .boxed()
    }

    pub async fn read_all(&self) -> StorageResult<Vec<AuditEntry>> {
        self.entries().try_collect().await
    }

    pub async fn summary(&self) -> StorageResult<AuditSummary> {
        self.entries()
            .try_fold(AuditSummary::default(), |mut summary, entry| async move {
                summary.push(&entry);
                Ok::<_, StorageError>(summary)
            })
            .await
    }
}

fn failure_message(err: &StorageError) -> String {
    match err {
        StorageError::NotFound { .. } => "Object not found".to_string(),
        other => other.to_string(),
    }
}
