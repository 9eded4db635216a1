// src/fetch/plan.rs
// =============================================================================
// Turns the crawler's URL set into download jobs.
//
// Each file is saved under the last path segment of its URL, unchanged:
//   https://releases.example.com/24.04/ubuntu-24.04-live-server-amd64.iso.torrent
//   -> <target_dir>/ubuntu-24.04-live-server-amd64.iso.torrent
//
// Two URLs in different directories can end in the same file name. They
// become one job with several candidate URLs (in sorted order), tried one
// after another by the downloader. Every job has its own destination, so
// concurrent jobs never race on a path.
// =============================================================================

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::warn;
use url::Url;

use super::download::DownloadJob;

pub fn plan_downloads<I>(urls: I, target_dir: &Path) -> Vec<DownloadJob>
where
    I: IntoIterator<Item = String>,
{
    let sorted: BTreeSet<String> = urls.into_iter().collect();
    let mut by_destination: BTreeMap<PathBuf, Vec<String>> = BTreeMap::new();

    for url in sorted {
        let Some(name) = file_name_for(&url) else {
            warn!(url = %url, "Skipping URL without a usable file name");
            continue;
        };
        by_destination
            .entry(target_dir.join(name))
            .or_default()
            .push(url);
    }

    by_destination
        .into_iter()
        .map(|(destination, urls)| {
            if urls.len() > 1 {
                warn!(
                    file = %destination.display(),
                    candidates = urls.len(),
                    "Several torrents share this file name"
                );
            }
            DownloadJob { urls, destination }
        })
        .collect()
}

// Last path segment of the URL, as written in the URL (no percent-decoding)
fn file_name_for(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let name = url.path_segments()?.last()?;

    if name.is_empty() || name == "." || name == ".." || name.contains('\\') {
        return None;
    }

    Some(name.to_string())
}
