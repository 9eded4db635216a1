// src/crawl/links.rs
// =============================================================================
// This module pulls the two kinds of links we care about out of a directory
// listing page.
//
// An autoindex page (Apache, Nginx, lighttpd...) is mostly a list of <a> tags:
//   <a href="../">Parent Directory</a>
//   <a href="22.04/">22.04/</a>
//   <a href="ubuntu-22.04-desktop-amd64.iso.torrent">...</a>
//   <a href="?C=M;O=A">Last modified</a>
//
// We keep:
// - Directory links: relative hrefs ending in '/', except a bare "/"
// - Target links: hrefs ending in one of TARGET_SUFFIXES
//
// Everything else (sort links, checksums, the ISO itself) is ignored. Hrefs
// that can't be resolved are skipped; torrent links on a non-http(s) scheme
// (ftp://, file://) are skipped with a debug log since we can't fetch them.
//
// Parsing is synchronous and the parsed document never leaves this module:
// scraper's Html is not Send, so it must not live across an .await.
// =============================================================================

use scraper::{Html, Selector};
use std::collections::BTreeSet;
use tracing::debug;
use url::Url;

/// File suffixes that identify a torrent descriptor for a disk image.
/// Matched literally (case-sensitive) against the href.
pub const TARGET_SUFFIXES: [&str; 2] = [".iso.torrent", ".img.torrent"];

// The links found on a single listing page, already resolved against the
// page URL and normalized.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PageLinks {
    /// Candidate sub-directories (not yet filtered to descendants)
    pub directories: BTreeSet<Url>,
    /// Torrent descriptor URLs
    pub targets: BTreeSet<Url>,
}

// Extracts directory and target links from a listing page
//
// Parameters:
//   html: the page body
//   page_url: URL the page was fetched from, used to resolve relative hrefs
//
// Example:
//   html = r#"<a href="sub/">sub/</a> <a href="a.iso.torrent">a</a>"#
//   page_url = "https://example.com/releases/"
//   directories = ["https://example.com/releases/sub/"]
//   targets = ["https://example.com/releases/a.iso.torrent"]
pub fn extract_links(html: &str, page_url: &Url) -> PageLinks {
    let mut links = PageLinks::default();

    let document = Html::parse_document(html);

    // Constant selector, known to be valid
    let selector = Selector::parse("a[href]").expect("static selector is valid");

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();

        if is_directory_href(href) {
            if let Some(url) = resolve(page_url, href) {
                links.directories.insert(url);
            }
        } else if is_target_href(href) {
            match resolve(page_url, href) {
                Some(url) => {
                    links.targets.insert(url);
                }
                None => debug!(href, page = %page_url, "Skipping torrent link that is not http(s)"),
            }
        }
    }

    links
}

// A directory href ends in '/', is not the server root "/", and carries no
// scheme of its own. Absolute links ("https://mirror.example/") point away
// from the listing and are never followed.
fn is_directory_href(href: &str) -> bool {
    href.ends_with('/')
        && href != "/"
        && matches!(Url::parse(href), Err(url::ParseError::RelativeUrlWithoutBase))
}

/// True when the href names a torrent descriptor we want to download.
pub fn is_target_href(href: &str) -> bool {
    TARGET_SUFFIXES.iter().any(|suffix| href.ends_with(suffix))
}

// Resolves an href against the page URL and normalizes the result.
//
// url::Url does the heavy lifting: lower-cased host, default port dropped,
// "." and ".." segments removed, canonical percent-encoding. We also drop the
// fragment since "#top" never names a different resource.
//
// Returns None for unresolvable hrefs and for anything that isn't http(s).
fn resolve(base: &Url, href: &str) -> Option<Url> {
    let mut url = base.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}
