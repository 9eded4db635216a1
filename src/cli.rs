// src/cli.rs
// =============================================================================
// Command-line interface, defined with clap's derive API.
//
// There is one job and therefore no subcommands: point the tool at a release
// directory and a local folder.
//
//   iso-torrent-fetcher --root-url https://releases.ubuntu.com/ --target-dir ./torrents
// =============================================================================

use clap::Parser;
use std::path::PathBuf;

use crate::crawl::DEFAULT_CRAWL_CONCURRENCY;
use crate::fetch::DEFAULT_DOWNLOAD_CONCURRENCY;

#[derive(Parser, Debug)]
#[command(
    name = "iso-torrent-fetcher",
    version,
    about = "Get all available ISO torrents from a Linux distro release directory",
    long_about = "iso-torrent-fetcher crawls an HTML directory listing (Apache/Nginx autoindex) \
                  and every directory below it, then downloads each .iso.torrent and .img.torrent \
                  file it finds. Files already present in the target directory are skipped, so \
                  the tool can be re-run safely."
)]
pub struct Cli {
    /// URL of distro release directory (e.g. https://releases.ubuntu.com/)
    #[arg(long)]
    pub root_url: String,

    /// Path to directory to download torrent files into (created if missing)
    #[arg(long)]
    pub target_dir: PathBuf,

    /// Output tons of debugging information
    ///
    /// RUST_LOG, when set, takes precedence over this flag.
    #[arg(long)]
    pub debug: bool,

    /// Print per-file results as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Maximum number of directory pages fetched at the same time
    #[arg(long, default_value_t = DEFAULT_CRAWL_CONCURRENCY)]
    pub crawl_concurrency: usize,

    /// Maximum number of torrent files downloaded at the same time
    #[arg(long, default_value_t = DEFAULT_DOWNLOAD_CONCURRENCY)]
    pub download_concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_args_and_defaults() {
        let cli = Cli::try_parse_from([
            "iso-torrent-fetcher",
            "--root-url",
            "https://releases.example.com/",
            "--target-dir",
            "out",
        ])
        .unwrap();

        assert_eq!(cli.root_url, "https://releases.example.com/");
        assert_eq!(cli.target_dir, PathBuf::from("out"));
        assert!(!cli.debug);
        assert!(!cli.json);
        assert_eq!(cli.crawl_concurrency, DEFAULT_CRAWL_CONCURRENCY);
        assert_eq!(cli.download_concurrency, DEFAULT_DOWNLOAD_CONCURRENCY);
        assert_eq!(cli.timeout, 30);
    }

    #[test]
    fn test_root_url_is_required() {
        let result = Cli::try_parse_from(["iso-torrent-fetcher", "--target-dir", "out"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_tuning_flags() {
        let cli = Cli::try_parse_from([
            "iso-torrent-fetcher",
            "--root-url",
            "https://releases.example.com/",
            "--target-dir",
            "out",
            "--debug",
            "--json",
            "--crawl-concurrency",
            "2",
            "--download-concurrency",
            "1",
            "--timeout",
            "5",
        ])
        .unwrap();

        assert!(cli.debug);
        assert!(cli.json);
        assert_eq!(cli.crawl_concurrency, 2);
        assert_eq!(cli.download_concurrency, 1);
        assert_eq!(cli.timeout, 5);
    }
}
