//! rsync invocation.
//!
//! Uploads and downloads always use `rsync -rv --inplace`: recursive, with
//! the file list echoed to stdout, writing in place so a half-synced
//! TensorBoard event file is still readable on the other end.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{ClientError, ClientResult};

/// Flags passed to every rsync run.
pub const RSYNC_FLAGS: [&str; 2] = ["-rv", "--inplace"];

/// Captured output of a successful rsync run.
#[derive(Debug, Clone)]
pub struct RsyncOutput {
    pub stdout: String,
    pub stderr: String,
}

impl RsyncOutput {
    /// File lines from `-v` output, without the summary footer.
    pub fn transferred_files(&self) -> Vec<&str> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|line| {
                !line.is_empty()
                    && !line.starts_with("sending incremental file list")
                    && !line.starts_with("receiving incremental file list")
                    && !line.starts_with("sent ")
                    && !line.starts_with("total size is")
                    && !line.ends_with('/')
            })
            .collect()
    }
}

/// One `rsync SRC DST` invocation.
#[derive(Debug, Clone)]
pub struct RsyncCommand {
    binary: String,
    source: String,
    destination: String,
}

impl RsyncCommand {
    pub fn new(binary: impl Into<String>, source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// Local directory → rsync daemon URL. The directory must exist.
    pub fn upload(binary: &str, local_dir: &str, remote_url: &str) -> ClientResult<Self> {
        ensure_rsync_url(remote_url)?;
        if !Path::new(local_dir).is_dir() {
            return Err(ClientError::LocalPathMissing(local_dir.to_string()));
        }
        Ok(Self::new(binary, local_dir, remote_url))
    }

    /// rsync daemon URL → local directory, created if missing.
    pub async fn download(binary: &str, remote_url: &str, local_dir: &str) -> ClientResult<Self> {
        ensure_rsync_url(remote_url)?;
        tokio::fs::create_dir_all(local_dir).await?;

        // A trailing slash pulls the module contents rather than a nested
        // directory named after it.
        let source = if remote_url.ends_with('/') {
            remote_url.to_string()
        } else {
            format!("{}/", remote_url)
        };
        Ok(Self::new(binary, source, local_dir))
    }

    pub fn args(&self) -> Vec<String> {
        RSYNC_FLAGS
            .iter()
            .map(|s| s.to_string())
            .chain([self.source.clone(), self.destination.clone()])
            .collect()
    }

    /// Runs rsync to completion, capturing its output.
    pub async fn run(&self) -> ClientResult<RsyncOutput> {
        let args = self.args();
        debug!(rsync = %self.binary, args = %args.join(" "), "Running rsync");

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ClientError::Spawn {
                program: self.binary.clone(),
                reason: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(ClientError::RsyncFailed {
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        let result = RsyncOutput { stdout, stderr };
        info!(
            source = %self.source,
            destination = %self.destination,
            files = result.transferred_files().len(),
            "rsync finished"
        );
        Ok(result)
    }
}

fn ensure_rsync_url(url: &str) -> ClientResult<()> {
    if !url.starts_with("rsync://") {
        return Err(ClientError::InvalidUrl(format!(
            "rsync daemon URL must start with rsync://, got: {}",
            url
        )));
    }
    Ok(())
}
