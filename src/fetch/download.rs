// src/fetch/download.rs
// =============================================================================
// This module downloads torrent files, skipping any that are already on disk.
//
// Key functionality:
// - Checks the destination first: an existing file means no request at all,
//   which makes re-running the tool cheap and safe
// - Streams the body into "<name>.part" and renames it into place, so an
//   interrupted download never looks like a finished one
// - Runs many downloads concurrently with a cap. URLs that share a file
//   name are tried in order within one job, until one of them leaves a file
//   on disk; later ones then see it and are skipped
//
// Every failure (non-2xx, connection error, disk error) becomes a Failed
// result for that one file. Nothing here returns an Err to the caller.
// =============================================================================

use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::FetchError;

/// Default number of downloads in flight.
pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 4;

/// What happened to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Fetched and written to the destination
    Downloaded,
    /// A file was already present; no request was made
    SkippedExisting,
    /// Non-2xx response, transport error or disk error; nothing was written
    Failed,
}

// The result of handling a single (url, destination) pair
#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    pub url: String,
    pub path: PathBuf,
    pub outcome: Outcome,
    /// Failure reason or other detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DownloadResult {
    pub fn new(url: &str, path: &Path, outcome: Outcome, message: Option<String>) -> Self {
        Self {
            url: url.to_string(),
            path: path.to_path_buf(),
            outcome,
            message,
        }
    }
}

/// A destination file and the URLs that would be saved under it.
///
/// Usually one URL; several when different directories hold a file of the
/// same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub urls: Vec<String>,
    pub destination: PathBuf,
}

// Downloads every job, at most `concurrency` jobs at a time
//
// Results come back in completion order, not job order. Each job yields one
// result per URL.
pub async fn download_all(
    client: &Client,
    jobs: Vec<DownloadJob>,
    concurrency: usize,
) -> Vec<DownloadResult> {
    let futures = jobs.into_iter().map(|job| {
        let client = client.clone();
        async move { download_job(&client, job).await }
    });

    let per_job: Vec<Vec<DownloadResult>> = stream::iter(futures)
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    per_job.into_iter().flatten().collect()
}

// Tries the job's URLs one after another. Once one has put a file in place,
// the existence check in `download` turns the rest into skips without any
// request; a failed URL leaves nothing behind, so the next one gets its turn.
async fn download_job(client: &Client, job: DownloadJob) -> Vec<DownloadResult> {
    let mut results = Vec::with_capacity(job.urls.len());
    for url in &job.urls {
        results.push(download(client, url, &job.destination).await);
    }
    results
}

/// Downloads `url` to `destination` unless a file already exists there.
///
/// The parent directory of `destination` must already exist.
pub async fn download(client: &Client, url: &str, destination: &Path) -> DownloadResult {
    let name = display_name(destination);

    if is_existing_file(destination).await {
        debug!(file = %name, "Skipping existing torrent file");
        return DownloadResult::new(url, destination, Outcome::SkippedExisting, None);
    }

    info!(file = %name, "Downloading new torrent file");

    match fetch_to_file(client, url, destination).await {
        Ok(bytes) => {
            debug!(file = %name, bytes, "Saved torrent file");
            DownloadResult::new(url, destination, Outcome::Downloaded, None)
        }
        Err(e) => {
            warn!(url = %url, error = %e, "Download failed");
            DownloadResult::new(url, destination, Outcome::Failed, Some(e.to_string()))
        }
    }
}

async fn is_existing_file(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

// GETs the url and writes the body to `destination`, returning the byte count
async fn fetch_to_file(client: &Client, url: &str, destination: &Path) -> Result<u64, FetchError> {
    let mut response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::request(url, e))?;

    if !response.status().is_success() {
        return Err(FetchError::status(url, response.status()));
    }

    let partial = partial_path(destination);

    let result: Result<u64, FetchError> = async {
        let bytes = write_body(&mut response, url, &partial).await?;
        fs::rename(&partial, destination)
            .await
            .map_err(|e| FetchError::io(destination, e))?;
        Ok(bytes)
    }
    .await;

    if result.is_err() {
        // Best effort; the .part file may not have been created at all
        let _ = fs::remove_file(&partial).await;
    }

    result
}

async fn write_body(
    response: &mut reqwest::Response,
    url: &str,
    path: &Path,
) -> Result<u64, FetchError> {
    let mut file = File::create(path).await.map_err(|e| FetchError::io(path, e))?;
    let mut written = 0u64;

    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| FetchError::request(url, e))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| FetchError::io(path, e))?;
        written += chunk.len() as u64;
    }

    // tokio's File writes in the background; flush before the rename
    file.flush().await.map_err(|e| FetchError::io(path, e))?;

    Ok(written)
}

// "<dir>/foo.iso.torrent" -> "<dir>/foo.iso.torrent.part"
fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why not response.bytes()?
//    - bytes() buffers the whole body in memory first
//    - chunk() hands us pieces as they arrive, so we write as we go
//
// 2. Why write to ".part" and rename?
//    - A rename within one directory is atomic on the same filesystem
//    - If we crash mid-download, the real file name never exists, so the next
//      run won't mistake a half-written file for a finished one
//
// 3. Why clone the client per job?
//    - Client is an Arc internally; cloning shares the same connection pool
// -----------------------------------------------------------------------------
