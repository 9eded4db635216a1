// src/main.rs
// =============================================================================
// Entry point: crawl a release directory, then download every torrent found.
//
// What happens here:
// 1. Parse command-line arguments and set up logging
// 2. Crawl the root URL for .iso.torrent / .img.torrent links
// 3. Download each one into the target directory, skipping files already there
// 4. Print per-file results and a summary
// 5. Exit with 0 (all present), 1 (some downloads failed) or 2 (fatal error)
// =============================================================================

mod cli;
mod crawl;
mod error;
mod fetch;

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use crawl::Crawler;
use fetch::{DownloadResult, Outcome};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[tokio::main]
async fn main() {
    // Parse first so --help and usage errors print without log noise
    let cli = Cli::parse();
    init_logging(cli.debug);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            // {:#} prints the whole context chain, including the failing URL
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// RUST_LOG wins; otherwise --debug picks debug level, else info.
// Logs go to stderr so --json output on stdout stays clean.
fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// Returns:
//   Ok(0) = every torrent file is now present
//   Ok(1) = at least one download failed
//   Err   = fatal: bad target dir, bad root URL or root listing unreachable
async fn run(cli: Cli) -> Result<i32> {
    debug!(?cli, "CLI arguments parsed");

    tokio::fs::create_dir_all(&cli.target_dir)
        .await
        .with_context(|| format!("could not create target directory {}", cli.target_dir.display()))?;

    // One client for everything so connections to the mirror are reused
    let client = Client::builder()
        .timeout(Duration::from_secs(cli.timeout))
        .user_agent(USER_AGENT)
        .build()
        .context("could not build HTTP client")?;

    let crawler = Crawler::new(client.clone(), cli.crawl_concurrency);
    let urls = crawler
        .find_targets(&cli.root_url)
        .await
        .with_context(|| format!("could not crawl {}", cli.root_url))?;

    let jobs = fetch::plan_downloads(urls, &cli.target_dir);
    let mut results = fetch::download_all(&client, jobs, cli.download_concurrency).await;
    results.sort_by(|a, b| a.url.cmp(&b.url));

    let summary = Summary::from_results(&results);
    info!("Downloaded {} new torrent files", summary.downloaded);
    info!("Skipped {} existing torrent files", summary.skipped);
    if summary.failed > 0 {
        info!("Failed to download {} torrent files", summary.failed);
    }

    print_results(&results, &summary, cli.json)?;

    Ok(if summary.failed > 0 { 1 } else { 0 })
}

// Tally of outcomes for the final report
#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    downloaded: usize,
    skipped: usize,
    failed: usize,
}

impl Summary {
    fn from_results(results: &[DownloadResult]) -> Self {
        let mut summary = Summary::default();
        for result in results {
            match result.outcome {
                Outcome::Downloaded => summary.downloaded += 1,
                Outcome::SkippedExisting => summary.skipped += 1,
                Outcome::Failed => summary.failed += 1,
            }
        }
        summary
    }

    fn total(&self) -> usize {
        self.downloaded + self.skipped + self.failed
    }
}

fn print_results(results: &[DownloadResult], summary: &Summary, json: bool) -> Result<()> {
    if json {
        let json_output = serde_json::to_string_pretty(results)?;
        println!("{}", json_output);
    } else {
        print_table(results, summary);
    }
    Ok(())
}

fn print_table(results: &[DownloadResult], summary: &Summary) {
    println!("{:<60} {:<18} {:<30}", "FILE", "OUTCOME", "MESSAGE");
    println!("{}", "=".repeat(108));

    for result in results {
        let name = result
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| result.url.clone());

        // Truncate long names for display
        let name_display = if name.chars().count() > 57 {
            format!("{}...", name.chars().take(57).collect::<String>())
        } else {
            name
        };

        let message = result.message.as_deref().unwrap_or("");
        println!(
            "{:<60} {:<18} {:<30}",
            name_display,
            format_outcome(result.outcome),
            message
        );
    }

    println!();
    println!("Summary:");
    println!("   Downloaded: {}", summary.downloaded);
    println!("   Skipped:    {}", summary.skipped);
    println!("   Failed:     {}", summary.failed);
    println!("   Total:      {}", summary.total());
}

fn format_outcome(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Downloaded => "DOWNLOADED",
        Outcome::SkippedExisting => "SKIPPED (EXISTS)",
        Outcome::Failed => "FAILED",
    }
}
