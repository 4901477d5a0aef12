//! Data models for scraped episodes and the lessons built from them.
//!
//! - [`Episode`]: one scraped podcast installment, as produced by the scraper
//!   before it is persisted to the local store
//! - [`EpisodeMeta`]: the `episode.txt` key/value metadata saved next to each
//!   transcript
//! - [`LessonDraft`]: everything the uploader hands the LingQ client to create
//!   one lesson
//! - [`UploadReport`]: created/skipped counts plus collected failures for a run

use std::path::PathBuf;

use chrono::NaiveDate;

/// Title prefix shared by every lesson created from this podcast.
pub const TITLE_PREFIX: &str = "Journal en français facile";

/// Build the lesson title for an episode published on `date`.
pub fn lesson_title(date: NaiveDate) -> String {
    format!("{TITLE_PREFIX} {date}")
}

/// One scraped podcast episode, ready to be persisted.
///
/// Episodes are created by the scraper, written once to the local store, and
/// read-only thereafter. The scraper only yields an `Episode` when both the
/// transcript and the audio payload were found; pages missing either are
/// skipped.
#[derive(Debug)]
pub struct Episode {
    /// Store identifier, `YYYY-MM-DD-slug`. Unique within the local store.
    pub id: String,
    /// Publish date extracted from the episode URL.
    pub date: NaiveDate,
    /// The episode page URL.
    pub url: String,
    /// Plain transcript text, paragraphs separated by blank lines.
    pub transcript: String,
    /// Source URL of the MP3 payload.
    pub audio_url: String,
    /// MP3 file name (last path segment of `audio_url`).
    pub audio_name: String,
    /// Downloaded MP3 bytes.
    pub audio: Vec<u8>,
    /// Cover image URL and bytes, when the page carried one.
    pub image_url: Option<String>,
    pub image: Option<Vec<u8>>,
}

impl Episode {
    /// The lesson title this episode maps to on LingQ.
    pub fn title(&self) -> String {
        lesson_title(self.date)
    }
}

/// Metadata persisted as `episode.txt` inside each episode directory.
///
/// Stored as `key: value` lines so the files stay greppable and hand-editable.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EpisodeMeta {
    pub url: String,
    pub mp3: String,
    pub image: String,
}

impl EpisodeMeta {
    /// Render as `key: value` lines for `episode.txt`.
    pub fn to_text(&self) -> String {
        format!(
            "url: {}\nmp3: {}\nimage: {}\n",
            self.url, self.mp3, self.image
        )
    }

    /// Parse `episode.txt` content. Unknown keys are ignored, missing keys
    /// stay empty.
    pub fn from_text(text: &str) -> Self {
        let mut meta = EpisodeMeta::default();
        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim().to_string();
            match key.trim() {
                "url" => meta.url = value,
                "mp3" => meta.mp3 = value,
                "image" => meta.image = value,
                _ => {}
            }
        }
        meta
    }
}

/// Visibility of a created lesson on LingQ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonStatus {
    Shared,
    Private,
}

impl LessonStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LessonStatus::Shared => "shared",
            LessonStatus::Private => "private",
        }
    }
}

/// Everything needed to create one lesson on LingQ.
#[derive(Debug)]
pub struct LessonDraft {
    pub title: String,
    pub text: String,
    pub status: LessonStatus,
    pub level: u8,
    /// Episode-specific tags; the client appends the configured defaults.
    pub tags: Vec<String>,
    pub original_url: Option<String>,
    pub audio_path: Option<PathBuf>,
    pub image_path: Option<PathBuf>,
}

/// Outcome of one upload run.
#[derive(Debug, Default)]
pub struct UploadReport {
    /// Titles of lessons created during this run.
    pub created: Vec<String>,
    /// Episodes skipped because their lesson already existed remotely.
    pub skipped: usize,
    /// Per-episode failures: (episode id, error message). The queue keeps
    /// going past these.
    pub failed: Vec<(String, String)>,
}
