//! # RFI → LingQ
//!
//! Scrapes episodes of *Journal en français facile* from RFI (transcript,
//! MP3 audio, cover image), stores them in a local directory tree, and
//! imports each one as a lesson into a LingQ course, skipping episodes whose
//! lesson already exists.
//!
//! ## Usage
//!
//! ```sh
//! rfi-lingq scrape --limit 5
//! rfi-lingq upload
//! rfi-lingq sync --limit 5      # scrape then upload, for the daily job
//! ```
//!
//! ## Architecture
//!
//! A linear pipeline, one HTTP request at a time:
//! 1. **Scrape**: index the episode listing, fetch each episode page, write
//!    artifacts to the local store (already-stored episodes are not
//!    re-fetched)
//! 2. **Upload**: list remote lesson titles once, create a lesson for every
//!    local episode not present remotely, report created/skipped/failed

use chrono::NaiveDate;
use clap::Parser;
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod lingq;
mod models;
mod scrapers;
mod store;
mod uploader;

use cli::{Cli, Command};
use config::Config;
use error::Result;
use lingq::LingQClient;
use models::UploadReport;
use scrapers::rfi::{Scraper, slug_from_url};
use store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();

    let args = Cli::parse();
    let config = Config::from_env(args.data_dir.clone())?;
    info!(data_dir = %config.data_dir.display(), course_id = config.course_id, "rfi-lingq starting up");

    match args.command {
        Command::Scrape {
            limit,
            pages,
            since,
        } => {
            if config.api_token.is_none() {
                warn!("LINGQ_API_TOKEN is not set; scraping works but upload will fail");
            }
            run_scrape(&config, limit, pages, since).await?;
        }
        Command::Upload { date, limit } => {
            run_upload(&config, date, limit).await?;
        }
        Command::Sync {
            limit,
            pages,
            since,
            date,
        } => {
            config.require_token()?;
            run_scrape(&config, limit, pages, since).await?;
            run_upload(&config, date, None).await?;
        }
    }

    let elapsed = start_time.elapsed();
    info!(secs = elapsed.as_secs(), millis = elapsed.subsec_millis(), "Execution complete");
    Ok(())
}

/// Scrape up to `limit` episodes into the local store.
///
/// The listing fetch is fatal; everything per-episode (missing transcript or
/// audio, fetch errors) is logged and skipped.
#[instrument(level = "info", skip(config))]
async fn run_scrape(
    config: &Config,
    limit: usize,
    pages: usize,
    since: Option<NaiveDate>,
) -> Result<usize> {
    let scraper = Scraper::new(config)?;
    let store = Store::new(&config.data_dir);

    let listing = scraper.fetch_listing(limit, since, pages).await?;
    info!(count = listing.len(), "Episodes found in listing");

    let mut saved = 0usize;
    for (date, url) in listing {
        let id = format!("{date}-{}", slug_from_url(&url));
        if store.exists(&id) {
            info!(%id, "Already stored; skipping");
            continue;
        }

        match scraper.fetch_episode(date, &url).await {
            Ok(Some(episode)) => {
                store.write(&episode)?;
                saved += 1;
            }
            Ok(None) => {
                warn!(%url, "No transcript or audio on page; skipping episode");
            }
            Err(e) => {
                error!(%url, error = %e, "Episode fetch failed; skipping");
            }
        }
    }

    info!(saved, "Scrape finished");
    Ok(saved)
}

/// Upload local episodes to the configured course.
#[instrument(level = "info", skip(config))]
async fn run_upload(
    config: &Config,
    date: Option<NaiveDate>,
    limit: Option<usize>,
) -> Result<UploadReport> {
    let store = Store::new(&config.data_dir);
    let mut episodes = store.list()?;

    if let Some(date) = date {
        episodes.retain(|e| e.date == date);
        if episodes.is_empty() {
            warn!(%date, "No stored episodes match the requested date");
        }
    }
    if let Some(limit) = limit {
        episodes.truncate(limit);
    }
    info!(count = episodes.len(), "Episodes queued for upload");

    let api = LingQClient::new(config)?;
    let report = uploader::upload_all(&api, &episodes, config).await?;

    for (id, message) in &report.failed {
        warn!(%id, %message, "Episode upload failed");
    }
    info!(
        created = report.created.len(),
        skipped = report.skipped,
        failed = report.failed.len(),
        "Upload finished"
    );
    Ok(report)
}
