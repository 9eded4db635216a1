// src/fetch/mod.rs
// =============================================================================
// This module downloads the torrent files the crawler found.
//
// Submodules:
// - plan: maps URLs to destination paths in the target directory
// - download: the skip-if-present downloader and its concurrent driver
// =============================================================================

mod download;
mod plan;

pub use download::{download_all, DownloadResult, Outcome, DEFAULT_DOWNLOAD_CONCURRENCY};
pub use plan::plan_downloads;
