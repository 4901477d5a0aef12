//! Runtime configuration built once at process entry.
//!
//! Everything the pipeline needs from the environment lives in [`Config`],
//! constructed by [`Config::from_env`] in `main` and passed by reference into
//! the scraper, store, and uploader. Components never read the environment
//! themselves, so tests can hand them a fabricated config.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, SyncError};

/// Default LingQ course: "Journal en français facile 2026".
const DEFAULT_COURSE_ID: u64 = 2570591;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// LingQ API token. Optional at construction; `scrape` runs without it,
    /// `upload`/`sync` require it via [`Config::require_token`].
    pub api_token: Option<String>,
    /// LingQ API v3 root URL.
    pub api_root: String,
    /// LingQ language code for the target course.
    pub language_code: String,
    /// Target course (collection) id on LingQ.
    pub course_id: u64,
    /// Tags applied to every created lesson, in addition to the episode year.
    pub default_tags: Vec<String>,
    /// Shelves applied to every created lesson.
    pub default_shelves: Vec<String>,
    /// RFI episode listing URL for Journal en français facile.
    pub listing_url: String,
    /// User agent sent with every scrape request.
    pub user_agent: String,
    /// Root of the local episode store.
    pub data_dir: PathBuf,
    /// How local episodes are matched against remote lesson titles.
    pub dedup_key: DedupKey,
}

impl Config {
    /// Build the configuration from process environment variables.
    ///
    /// Reads `LINGQ_API_TOKEN`, `LINGQ_COURSE_ID`, and `LINGQ_DEDUP_KEY`.
    /// The data directory comes from the CLI (which itself honors
    /// `RFI_DATA_DIR`).
    pub fn from_env(data_dir: PathBuf) -> Result<Self> {
        let api_token = std::env::var("LINGQ_API_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());

        let course_id = match std::env::var("LINGQ_COURSE_ID") {
            Ok(raw) if !raw.is_empty() => raw.parse::<u64>().map_err(|_| {
                SyncError::Config(format!("LINGQ_COURSE_ID is not a valid id: {raw:?}"))
            })?,
            _ => DEFAULT_COURSE_ID,
        };

        let dedup_key = match std::env::var("LINGQ_DEDUP_KEY") {
            Ok(raw) if !raw.is_empty() => raw.parse()?,
            _ => DedupKey::Title,
        };

        Ok(Self {
            api_token,
            course_id,
            dedup_key,
            data_dir,
            ..Self::defaults()
        })
    }

    /// Baseline values shared by `from_env` and tests.
    pub fn defaults() -> Self {
        Self {
            api_token: None,
            api_root: "https://www.lingq.com/api/v3".to_string(),
            language_code: "fr".to_string(),
            course_id: DEFAULT_COURSE_ID,
            default_tags: vec!["news".to_string(), "rfi".to_string(), "JFF".to_string()],
            default_shelves: vec!["news".to_string()],
            listing_url:
                "https://francaisfacile.rfi.fr/fr/podcasts/journal-en-fran%C3%A7ais-facile/"
                    .to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .to_string(),
            data_dir: PathBuf::from("data"),
            dedup_key: DedupKey::Title,
        }
    }

    /// The API token, or an [`SyncError::Auth`] if it was not provided.
    pub fn require_token(&self) -> Result<&str> {
        self.api_token
            .as_deref()
            .ok_or_else(|| SyncError::Auth("LINGQ_API_TOKEN environment variable is not set".to_string()))
    }
}

/// Dedup key used to match local episodes against remote lessons.
///
/// The episode title embeds the publish date, so `Title` is an exact
/// case-sensitive match on the full title. `Date` compares only the
/// `YYYY-MM-DD` date found in each title, which survives changes to the
/// title wording on either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupKey {
    Title,
    Date,
}

impl FromStr for DedupKey {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "title" => Ok(DedupKey::Title),
            "date" => Ok(DedupKey::Date),
            other => Err(SyncError::Config(format!(
                "LINGQ_DEDUP_KEY must be 'title' or 'date', got {other:?}"
            ))),
        }
    }
}
