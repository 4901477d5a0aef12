//! Command-line interface definitions.
//!
//! This module defines the CLI arguments and subcommands using the `clap`
//! crate. The data directory can also be provided via the `RFI_DATA_DIR`
//! environment variable.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Command-line arguments for the RFI → LingQ automator.
///
/// # Examples
///
/// ```sh
/// # Scrape the five most recent episodes
/// rfi-lingq scrape --limit 5
///
/// # Upload everything in the local store that is not on LingQ yet
/// rfi-lingq upload
///
/// # Daily job: scrape then upload in one run
/// rfi-lingq sync --limit 5
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Root directory of the local episode store
    #[arg(long, env = "RFI_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scrape episodes from RFI into the local store
    Scrape {
        /// Maximum number of episodes to scrape
        #[arg(long, default_value_t = 5)]
        limit: usize,

        /// How many listing pages to walk
        #[arg(long, default_value_t = 3)]
        pages: usize,

        /// Only scrape episodes published on or after this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<NaiveDate>,
    },

    /// Upload local episodes to LingQ, skipping existing lessons
    Upload {
        /// Only upload the episode published on this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Maximum number of episodes to upload
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Scrape then upload in one run
    Sync {
        /// Maximum number of episodes to scrape
        #[arg(long, default_value_t = 5)]
        limit: usize,

        /// How many listing pages to walk
        #[arg(long, default_value_t = 3)]
        pages: usize,

        /// Only scrape episodes published on or after this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<NaiveDate>,

        /// Only upload the episode published on this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}
