//! One-way folder sync of run outputs to remote storage.
//!
//! Sync is a trailing side effect: callers log and collect failures instead of
//! aborting a run whose model is already persisted.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{PipelineError, Result, Stage, StageContext};

/// Remote prefix for the timestamped artifact tree
pub const ARTIFACT_PREFIX: &str = "artifact";
/// Remote prefix for the production model directory
pub const FINAL_MODEL_PREFIX: &str = "final_model";

/// Destination of a recursive folder sync
pub trait RemoteSync {
    /// Copy `folder` to `<prefix>/<timestamp>` on the remote side
    fn sync_folder(&self, folder: &Path, prefix: &str, timestamp: &str) -> Result<String>;
}

/// Syncs to an S3 bucket through the `aws` command-line client
#[derive(Debug, Clone)]
pub struct S3CliSync {
    pub bucket: String,
    pub program: String,
}

impl S3CliSync {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            program: "aws".to_string(),
        }
    }

    pub fn destination(&self, prefix: &str, timestamp: &str) -> String {
        format!("s3://{}/{}/{}", self.bucket, prefix, timestamp)
    }
}

impl RemoteSync for S3CliSync {
    fn sync_folder(&self, folder: &Path, prefix: &str, timestamp: &str) -> Result<String> {
        let destination = self.destination(prefix, timestamp);
        debug!(folder = %folder.display(), %destination, "running aws s3 sync");

        let output = Command::new(&self.program)
            .arg("s3")
            .arg("sync")
            .arg(folder)
            .arg(&destination)
            .output()
            .at_path(Stage::Sync, folder)?;

        if !output.status.success() {
            let message = format!(
                "sync to {} exited with {}: {}",
                destination,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Err(PipelineError::io(Stage::Sync, folder, std::io::Error::other(message)));
        }
        info!(%destination, "folder synced");
        Ok(destination)
    }
}

/// Mirrors folders into a local directory tree
#[derive(Debug, Clone)]
pub struct LocalMirrorSync {
    pub root: PathBuf,
}

impl LocalMirrorSync {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Copy every regular file under `from` into `to`, keeping relative paths.
///
/// Symbolic links are not followed and are left out of the copy.
fn copy_tree(from: &Path, to: &Path) -> Result<u64> {
    let mut copied = 0;
    for entry in WalkDir::new(from) {
        let entry = entry.at_path(Stage::Sync, from)?;
        let relative = entry.path().strip_prefix(from).at_path(Stage::Sync, entry.path())?;
        let target = to.join(relative);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            std::fs::create_dir_all(&target).at_path(Stage::Sync, &target)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &target).at_path(Stage::Sync, entry.path())?;
            copied += 1;
        } else {
            debug!(path = %entry.path().display(), "skipping non-regular file");
        }
    }
    Ok(copied)
}

impl RemoteSync for LocalMirrorSync {
    fn sync_folder(&self, folder: &Path, prefix: &str, timestamp: &str) -> Result<String> {
        if !folder.is_dir() {
            return Err(PipelineError::missing_artifact(Stage::Sync, folder));
        }
        let destination = self.root.join(prefix).join(timestamp);
        let files = copy_tree(folder, &destination)?;
        info!(destination = %destination.display(), files, "folder mirrored");
        Ok(destination.display().to_string())
    }
}
