// src/error.rs
// =============================================================================
// Error types shared by the crawler and the downloader.
//
// Only one of these ever reaches the user as a hard failure: the root listing
// failing to load. Everything else (a broken sub-directory, a 404 on a torrent
// file) is caught where it happens and turned into a log line or an outcome.
//
// Rust concepts:
// - thiserror: derives Display/Error impls from the #[error(...)] attributes
// - #[source]: keeps the underlying reqwest error in the error chain
// =============================================================================

use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A page or file could not be retrieved.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (DNS, connection refused, timeout, TLS...)
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered, but not with a 2xx status
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: StatusCode },

    /// The URL is not an absolute http/https URL
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Writing the downloaded body to disk failed
    #[error("IO error writing to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    pub fn request(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Request {
            url: url.into(),
            source,
        }
    }

    pub fn status(url: impl Into<String>, status: StatusCode) -> Self {
        Self::Status {
            url: url.into(),
            status,
        }
    }

    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
