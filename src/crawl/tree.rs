// src/crawl/tree.rs
// =============================================================================
// Recursive, descend-only crawl of an HTML directory tree.
//
// How it works:
// 1. Fetch the listing at a URL (non-2xx counts as a failure)
// 2. Split its links into sub-directories and torrent files (see links.rs)
// 3. Keep only sub-directories that live strictly below the current URL
// 4. Visit those sub-directories concurrently and union everything found
//
// Step 3 is what keeps the crawl finite: "../", "/", self links and links to
// other hosts all fail the prefix-and-not-equal test, so every recursive call
// goes one real level deeper.
//
// Failure policy:
// - The root page failing is fatal: find_targets returns the error
// - A sub-directory failing is logged and contributes nothing; its siblings
//   carry on
//
// Concurrency:
// - Siblings fan out through buffer_unordered
// - A semaphore shared by the whole crawl caps how many pages are being
//   fetched at once, no matter how wide or deep the tree is. The permit is
//   released before recursing, otherwise a deep tree would deadlock on it.
// =============================================================================

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

use super::links::extract_links;
use crate::error::FetchError;

/// Default number of listing pages fetched at the same time.
pub const DEFAULT_CRAWL_CONCURRENCY: usize = 8;

/// Walks a directory listing tree and collects torrent descriptor URLs.
///
/// The client and the semaphore are the only shared state, and neither is
/// mutated by the crawler, so branches never coordinate with each other.
#[derive(Clone)]
pub struct Crawler {
    client: Client,
    permits: Arc<Semaphore>,
    concurrency: usize,
}

impl Crawler {
    pub fn new(client: Client, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            client,
            permits: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        }
    }

    /// Returns every target URL reachable from `root_url`.
    ///
    /// Fails only if `root_url` is not a valid http(s) URL or its own
    /// listing can't be fetched.
    pub async fn find_targets(&self, root_url: &str) -> Result<HashSet<String>, FetchError> {
        let root = parse_root(root_url)?;
        info!(url = %root, "Searching torrent files recursively");

        let targets = self.visit(root).await?;

        info!(count = targets.len(), "Found image torrent files");
        Ok(targets)
    }

    // Visits one directory: fetch, extract, recurse.
    //
    // Boxed because an async fn can't call itself directly (its future type
    // would have infinite size).
    fn visit(&self, url: Url) -> BoxFuture<'_, Result<HashSet<String>, FetchError>> {
        async move {
            let html = self.fetch_listing(&url).await?;
            let links = extract_links(&html, &url);

            debug!(
                url = %url,
                directories = links.directories.len(),
                "Found unique links to directories"
            );

            let children: Vec<Url> = links
                .directories
                .into_iter()
                .filter(|child| is_descendant(&url, child))
                .collect();

            debug!(url = %url, children = children.len(), "Of those, links to sub-directories");
            debug!(
                url = %url,
                targets = links.targets.len(),
                "Found unique image torrents in current directory"
            );

            let mut targets: HashSet<String> =
                links.targets.into_iter().map(String::from).collect();

            let branches: Vec<HashSet<String>> = stream::iter(children)
                .map(|child| self.visit_branch(child))
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

            for branch in branches {
                targets.extend(branch);
            }

            Ok(targets)
        }
        .boxed()
    }

    // A sub-directory visit. Errors stop here: the branch is logged and
    // counts as empty.
    async fn visit_branch(&self, url: Url) -> HashSet<String> {
        match self.visit(url.clone()).await {
            Ok(targets) => targets,
            Err(e) => {
                warn!(url = %url, error = %e, "Skipping sub-directory that could not be fetched");
                HashSet::new()
            }
        }
    }

    // Fetches a listing page and returns its body.
    async fn fetch_listing(&self, url: &Url) -> Result<String, FetchError> {
        // The semaphore is never closed, so this always yields a permit
        let _permit = self.permits.acquire().await.ok();

        debug!(url = %url, "Fetching");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::request(url.as_str(), e))?;

        if !response.status().is_success() {
            return Err(FetchError::status(url.as_str(), response.status()));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::request(url.as_str(), e))
    }
}

/// True when `child` is strictly below `parent`: string-prefixed by it and
/// not equal to it.
pub fn is_descendant(parent: &Url, child: &Url) -> bool {
    child.as_str().starts_with(parent.as_str()) && child.as_str() != parent.as_str()
}

// Parses and normalizes the root URL.
// "https://host" becomes "https://host/" so the prefix test works the same at
// every level.
fn parse_root(root_url: &str) -> Result<Url, FetchError> {
    let mut url = Url::parse(root_url.trim())
        .map_err(|e| FetchError::invalid_url(root_url, e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(FetchError::invalid_url(
            root_url,
            "only http and https are supported",
        ));
    }

    url.set_fragment(None);
    Ok(url)
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why BoxFuture?
//    - An async fn compiles to a state machine that contains the futures it
//      awaits. If it awaits itself, that type would contain itself forever.
//    - Boxing puts the inner future on the heap, so the size is known
//    - FutureExt::boxed() does the Box::pin for us and requires Send
//
// 2. Why is scraper kept out of async code?
//    - scraper::Html is not Send, and tokio may move a task between threads
//      at any .await
//    - extract_links parses and drops the document before we await again
//
// 3. buffer_unordered vs the semaphore:
//    - buffer_unordered(n) limits how many children of ONE page run at once
//    - The semaphore limits page fetches across the WHOLE tree, which is what
//      the mirror actually sees
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn crawler() -> Crawler {
        Crawler::new(Client::new(), DEFAULT_CRAWL_CONCURRENCY)
    }

    // Serves `body` as an HTML listing at `route`, and expects exactly
    // `hits` requests for it.
    async fn listing(server: &MockServer, route: &str, body: &str, hits: u64) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(body),
            )
            .expect(hits)
            .mount(server)
            .await;
    }

    fn sorted(set: HashSet<String>) -> Vec<String> {
        let mut v: Vec<_> = set.into_iter().collect();
        v.sort();
        v
    }

    #[tokio::test]
    async fn test_targets_at_multiple_depths() {
        let server = MockServer::start().await;
        listing(
            &server,
            "/",
            r#"<a href="sub1/">sub1/</a><a href="sub2/">sub2/</a><a href="a.iso.torrent">a</a>"#,
            1,
        )
        .await;
        listing(&server, "/sub1/", r#"<a href="../">up</a><a href="b.iso.torrent">b</a>"#, 1).await;
        listing(&server, "/sub2/", r#"<a href="../">up</a>"#, 1).await;

        let root = format!("{}/", server.uri());
        let found = crawler().find_targets(&root).await.unwrap();

        assert_eq!(
            sorted(found),
            vec![format!("{root}a.iso.torrent"), format!("{root}sub1/b.iso.torrent")]
        );
    }

    #[tokio::test]
    async fn test_failed_subdirectory_is_skipped() {
        let server = MockServer::start().await;
        listing(
            &server,
            "/",
            r#"<a href="good/">good/</a><a href="broken/">broken/</a>"#,
            1,
        )
        .await;
        listing(&server, "/good/", r#"<a href="x.img.torrent">x</a>"#, 1).await;
        Mock::given(method("GET"))
            .and(path("/broken/"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let root = format!("{}/", server.uri());
        let found = crawler().find_targets(&root).await.unwrap();

        assert_eq!(sorted(found), vec![format!("{root}good/x.img.torrent")]);
    }

    #[tokio::test]
    async fn test_root_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let root = format!("{}/", server.uri());
        let err = crawler().find_targets(&root).await.unwrap_err();

        assert!(matches!(err, FetchError::Status { ref url, .. } if url == &root));
    }

    #[tokio::test]
    async fn test_self_and_parent_links_are_not_followed() {
        let server = MockServer::start().await;
        // The root is requested exactly once even though it links to itself
        listing(
            &server,
            "/releases/",
            r#"
                <a href="./">self</a>
                <a href="../">parent</a>
                <a href="/releases/">absolute-path self</a>
                <a href="/other/">sibling tree</a>
                <a href="c.iso.torrent">c</a>
            "#,
            1,
        )
        .await;
        listing(&server, "/other/", r#"<a href="nope.iso.torrent">nope</a>"#, 0).await;
        listing(&server, "/", r#"<a href="releases/">releases/</a>"#, 0).await;

        let root = format!("{}/releases/", server.uri());
        let found = crawler().find_targets(&root).await.unwrap();

        assert_eq!(sorted(found), vec![format!("{root}c.iso.torrent")]);
    }

    #[tokio::test]
    async fn test_same_target_linked_from_two_pages() {
        let server = MockServer::start().await;
        let root = format!("{}/", server.uri());
        let shared = format!(r#"<a href="{root}shared.iso.torrent">shared</a>"#);

        listing(&server, "/", &format!(r#"<a href="a/">a/</a><a href="b/">b/</a>{shared}"#), 1)
            .await;
        listing(&server, "/a/", &shared, 1).await;
        listing(&server, "/b/", &shared, 1).await;

        let found = crawler().find_targets(&root).await.unwrap();

        assert_eq!(sorted(found), vec![format!("{root}shared.iso.torrent")]);
    }

    #[tokio::test]
    async fn test_empty_listing_returns_empty_set() {
        let server = MockServer::start().await;
        listing(&server, "/", "<html><body>Nothing here</body></html>", 1).await;

        let root = format!("{}/", server.uri());
        let found = crawler().find_targets(&root).await.unwrap();

        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_root_without_trailing_slash() {
        let server = MockServer::start().await;
        listing(&server, "/", r#"<a href="d.iso.torrent">d</a>"#, 1).await;

        // server.uri() has no trailing slash
        let found = crawler().find_targets(&server.uri()).await.unwrap();

        assert_eq!(sorted(found), vec![format!("{}/d.iso.torrent", server.uri())]);
    }

    #[tokio::test]
    async fn test_single_permit_still_completes() {
        let server = MockServer::start().await;
        listing(&server, "/", r#"<a href="a/">a/</a><a href="b/">b/</a>"#, 1).await;
        listing(&server, "/a/", r#"<a href="deep/">deep/</a>"#, 1).await;
        listing(&server, "/a/deep/", r#"<a href="z.iso.torrent">z</a>"#, 1).await;
        listing(&server, "/b/", r#"<a href="y.img.torrent">y</a>"#, 1).await;

        let found = Crawler::new(Client::new(), 1)
            .find_targets(&server.uri())
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_non_http_root() {
        let err = crawler().find_targets("ftp://example.com/pub/").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[test]
    fn test_is_descendant() {
        let parent = Url::parse("https://example.com/releases/").unwrap();
        let child = Url::parse("https://example.com/releases/24.04/").unwrap();
        let sibling = Url::parse("https://example.com/other/").unwrap();

        assert!(is_descendant(&parent, &child));
        assert!(!is_descendant(&parent, &parent));
        assert!(!is_descendant(&parent, &sibling));
        assert!(!is_descendant(&child, &parent));
    }
}
