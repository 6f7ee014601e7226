//! Stage-then-publish helper shared by object and metadata writes.

use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// A uniquely named file under the staging directory.
///
/// Until [`StagedFile::publish`] succeeds, dropping the guard removes the
/// file, so an aborted or cancelled write leaves nothing behind.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    armed: bool,
}

impl StagedFile {
    pub fn new(staging_dir: &Path) -> Self {
        Self {
            path: staging_dir.join(format!(".tmp-{}", Uuid::new_v4())),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically move the staged bytes onto `dest`, replacing any file there.
    pub async fn publish(mut self, dest: &Path) -> io::Result<()> {
        if let Err(err) = fs::rename(&self.path, dest).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(dest).await?;
                fs::rename(&self.path, dest).await?;
            } else {
                return Err(err);
            }
        }
        self.armed = false;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("discarded staged file {}", self.path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => debug!(
                "failed to discard staged file {}: {}",
                self.path.display(),
                err
            ),
        }
    }
}
