// src/crawl/mod.rs
// =============================================================================
// This module discovers torrent files by crawling a directory listing tree.
//
// Submodules:
// - links: extracts directory and torrent links from one listing page
// - tree: the recursive, descend-only crawler
// =============================================================================

mod links;
mod tree;

pub use tree::{Crawler, DEFAULT_CRAWL_CONCURRENCY};
