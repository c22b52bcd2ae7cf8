//! SEO Audit main entry point
//!
//! This is the command-line interface for the SEO audit engine.

use anyhow::{bail, Context};
use clap::Parser;
use seo_audit::cache::open_cache;
use seo_audit::config::load_config;
use seo_audit::jobs::{JobOrchestrator, JobStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Interval between status polls while an audit runs
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// SEO Audit: a crawling audit engine for on-page and technical SEO
///
/// Crawls a site from a root URL, scores every page against a fixed rule
/// set and prints the aggregated analysis result as JSON.
#[derive(Parser, Debug)]
#[command(name = "seo-audit")]
#[command(version)]
#[command(about = "A crawling SEO audit engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Root URL to audit
    #[arg(long, required_unless_present_any = ["cache_stats", "clear_cache"])]
    url: Option<String>,

    /// Target keyword for relevance rules
    #[arg(long)]
    keyword: Option<String>,

    /// Maximum pages to audit
    #[arg(long, conflicts_with = "whole_site")]
    max_pages: Option<usize>,

    /// Crawl the whole site, up to the configured safety ceiling
    #[arg(long)]
    whole_site: bool,

    /// Concurrent fetches
    #[arg(long)]
    concurrency: Option<usize>,

    /// Always fetch from the network, ignoring cached pages
    #[arg(long)]
    no_cache: bool,

    /// Do not honor robots.txt disallow rules
    #[arg(long)]
    ignore_robots: bool,

    /// Show cache statistics and exit
    #[arg(long, conflicts_with_all = ["clear_cache", "url"])]
    cache_stats: bool,

    /// Remove every cached page and exit
    #[arg(long, conflicts_with_all = ["cache_stats", "url"])]
    clear_cache: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    let cache = open_cache(Path::new(&config.cache.database_path))
        .with_context(|| format!("Failed to open cache at {}", config.cache.database_path))?;
    let orchestrator = JobOrchestrator::new(config, Arc::new(cache))?;

    if cli.cache_stats {
        handle_cache_stats(&orchestrator)
    } else if cli.clear_cache {
        handle_clear_cache(&orchestrator)
    } else {
        handle_audit(&orchestrator, &cli).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("seo_audit=info,warn"),
            1 => EnvFilter::new("seo_audit=debug,info"),
            2 => EnvFilter::new("seo_audit=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Logs go to stderr so stdout carries only the JSON report
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles --cache-stats: prints record count and age range
fn handle_cache_stats(orchestrator: &JobOrchestrator) -> anyhow::Result<()> {
    let stats = orchestrator.cache_stats()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

/// Handles --clear-cache
fn handle_clear_cache(orchestrator: &JobOrchestrator) -> anyhow::Result<()> {
    let removed = orchestrator.clear_cache()?;
    println!("Removed {} cached pages", removed);
    Ok(())
}

/// Runs one audit, polling until it ends, and prints the result as JSON
///
/// Ctrl-C cancels the job and waits for it to wind down.
async fn handle_audit(orchestrator: &JobOrchestrator, cli: &Cli) -> anyhow::Result<()> {
    let Some(url) = cli.url.as_deref() else {
        bail!("--url is required");
    };

    let mut job = orchestrator.default_job_config();
    job.whole_site = cli.whole_site;
    if let Some(max_pages) = cli.max_pages {
        job.max_pages = max_pages;
    }
    if let Some(concurrency) = cli.concurrency {
        job.concurrency = concurrency;
    }
    job.use_cache = !cli.no_cache;
    job.respect_robots = !cli.ignore_robots;

    let submission = orchestrator.submit(url, cli.keyword.as_deref(), job)?;
    tracing::info!(
        "Submitted job {} (estimated {}s)",
        submission.id,
        submission.estimated_duration.as_secs()
    );

    let mut interrupted = false;
    let status = loop {
        let status = orchestrator.status(&submission.id)?;
        if status.status.is_terminal() {
            break status;
        }
        tracing::debug!(
            "Progress: {}/{} pages ({:.1}%)",
            status.progress.step,
            status.progress.total,
            status.progress.percent
        );

        tokio::select! {
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                tracing::warn!("Interrupted, cancelling job {}", submission.id);
                interrupted = true;
                orchestrator.cancel(&submission.id)?;
            }
        }
    };

    match status.status {
        JobStatus::Completed => {
            let report = orchestrator.report(&submission.id)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        JobStatus::Failed => bail!(
            "Audit failed: {}",
            status.error.unwrap_or_else(|| "unknown error".to_string())
        ),
        other => bail!("Audit ended with status {}", other),
    }
}
