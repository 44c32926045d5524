//! # Dataset Archives
//!
//! Downloads an archived dataset over HTTP and unpacks it locally.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  GET https://…/assets/f5Isrpkw.tgz                                      │
//! │       │  streamed chunk by chunk                                        │
//! │       ▼                                                                 │
//! │  temp dir / archive        (removed when done)                          │
//! │       │  magic bytes 1f 8b → gzip, otherwise plain tar                  │
//! │       ▼                                                                 │
//! │  tar entries ──unpack_in──► target_dir                                  │
//! │                  (entries escaping target_dir are skipped)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::api::BackendApi;
use crate::error::{ClientError, ClientResult};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// What a download-and-extract run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArchiveSummary {
    pub bytes_downloaded: u64,
    pub entries_unpacked: usize,
}

/// Downloads `url` and extracts it into `target_dir`.
pub async fn download_archive(http: &Client, url: &str, target_dir: impl AsRef<Path>) -> ClientResult<ArchiveSummary> {
    let url = Url::parse(url)?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ClientError::InvalidUrl(format!(
            "archive URL must be http(s), got: {}",
            url
        )));
    }

    let target_dir = target_dir.as_ref().to_path_buf();
    tokio::fs::create_dir_all(&target_dir).await?;

    let staging = tempfile::tempdir()?;
    let archive_path = staging.path().join("archive");

    info!(%url, target = %target_dir.display(), "Downloading archive");
    let bytes_downloaded = fetch_to_file(http, url, &archive_path).await?;

    let entries_unpacked = {
        let archive_path = archive_path.clone();
        let target_dir = target_dir.clone();
        tokio::task::spawn_blocking(move || extract_archive(&archive_path, &target_dir)).await??
    };

    info!(
        bytes = bytes_downloaded,
        entries = entries_unpacked,
        target = %target_dir.display(),
        "Archive extracted"
    );

    Ok(ArchiveSummary {
        bytes_downloaded,
        entries_unpacked,
    })
}

async fn fetch_to_file(http: &Client, url: Url, path: &Path) -> ClientResult<u64> {
    let mut response = BackendApi::check_status(http.get(url).send().await?).await?;
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;

    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    debug!(bytes = written, path = %path.display(), "Archive downloaded");
    Ok(written)
}

/// Unpacks a `.tar`, `.tgz` or `.tar.gz` file into `target_dir`.
///
/// Returns the number of entries written. Entries whose path would land
/// outside `target_dir` are skipped with a warning.
pub fn extract_archive(archive_path: &Path, target_dir: &Path) -> ClientResult<usize> {
    let mut file = File::open(archive_path)?;

    let mut magic = [0u8; 2];
    let is_gzip = file.read(&mut magic)? == 2 && magic == GZIP_MAGIC;
    file.seek(SeekFrom::Start(0))?;

    let reader = BufReader::new(file);
    if is_gzip {
        unpack_entries(tar::Archive::new(GzDecoder::new(reader)), target_dir)
    } else {
        unpack_entries(tar::Archive::new(reader), target_dir)
    }
}

fn unpack_entries<R: Read>(mut archive: tar::Archive<R>, target_dir: &Path) -> ClientResult<usize> {
    let mut unpacked = 0;

    let entries = archive
        .entries()
        .map_err(|e| ClientError::ArchiveFailed(e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| ClientError::ArchiveFailed(e.to_string()))?;
        let path: PathBuf = entry
            .path()
            .map(|p| p.into_owned())
            .unwrap_or_default();

        let written = entry
            .unpack_in(target_dir)
            .map_err(|e| ClientError::ArchiveFailed(format!("{}: {}", path.display(), e)))?;

        if written {
            unpacked += 1;
        } else {
            warn!(path = %path.display(), "Skipped archive entry outside target directory");
        }
    }

    Ok(unpacked)
}
