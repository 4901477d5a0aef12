//! Local on-disk store of scraped episodes.
//!
//! One directory per episode identifier under the data root:
//!
//! ```text
//! data/
//! └── 2026-01-15-20260115-tempete-en-bretagne/
//!     ├── transcript.txt
//!     ├── ep-0115.mp3
//!     ├── image.jpg
//!     └── episode.txt          # url / mp3 / image metadata
//! ```
//!
//! Writes never overwrite an existing file, so re-running `scrape` leaves
//! stored artifacts untouched. Single-process sequential access only; there
//! is no locking.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::models::{lesson_title, Episode, EpisodeMeta};

pub const TRANSCRIPT_FILE: &str = "transcript.txt";
pub const META_FILE: &str = "episode.txt";
pub const IMAGE_FILE: &str = "image.jpg";

pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Whether a complete episode (transcript + metadata) is already stored
    /// under `id`. Used to skip re-downloading before any network fetch.
    pub fn exists(&self, id: &str) -> bool {
        let dir = self.root.join(id);
        dir.join(TRANSCRIPT_FILE).exists() && dir.join(META_FILE).exists()
    }

    /// Persist an episode's artifacts under its identifier.
    ///
    /// Files that already exist are left as they are, so a partial earlier
    /// run can be completed without clobbering anything.
    #[instrument(level = "info", skip_all, fields(id = %episode.id))]
    pub fn write(&self, episode: &Episode) -> Result<PathBuf> {
        let dir = self.root.join(&episode.id);
        fs::create_dir_all(&dir)?;

        write_if_absent(&dir.join(TRANSCRIPT_FILE), episode.transcript.as_bytes())?;
        write_if_absent(&dir.join(&episode.audio_name), &episode.audio)?;
        if let Some(image) = &episode.image {
            write_if_absent(&dir.join(IMAGE_FILE), image)?;
        }

        let meta = EpisodeMeta {
            url: episode.url.clone(),
            mp3: episode.audio_url.clone(),
            image: episode.image_url.clone().unwrap_or_default(),
        };
        write_if_absent(&dir.join(META_FILE), meta.to_text().as_bytes())?;

        info!(dir = %dir.display(), "Episode stored");
        Ok(dir)
    }

    /// All complete episodes in the store, sorted by identifier (ascending
    /// date). Directories without a transcript or metadata file, or whose
    /// name does not start with a date, are skipped with a warning.
    #[instrument(level = "info", skip_all, fields(root = %self.root.display()))]
    pub fn list(&self) -> Result<Vec<StoredEpisode>> {
        let mut episodes = Vec::new();
        if !self.root.exists() {
            return Ok(episodes);
        }

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();

            let transcript = dir.join(TRANSCRIPT_FILE);
            let meta_file = dir.join(META_FILE);
            if !transcript.exists() || !meta_file.exists() {
                debug!(%id, "Skipping incomplete episode directory");
                continue;
            }

            let Some(date) = date_from_id(&id) else {
                warn!(%id, "Episode directory name has no leading date; skipping");
                continue;
            };

            let meta = EpisodeMeta::from_text(&fs::read_to_string(&meta_file)?);
            episodes.push(StoredEpisode {
                dir,
                id,
                date,
                meta,
            });
        }

        episodes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(episodes)
    }
}

/// A persisted episode, as read back from the store.
#[derive(Debug)]
pub struct StoredEpisode {
    pub dir: PathBuf,
    pub id: String,
    pub date: NaiveDate,
    pub meta: EpisodeMeta,
}

impl StoredEpisode {
    /// The lesson title this episode maps to on LingQ.
    pub fn title(&self) -> String {
        lesson_title(self.date)
    }

    /// Transcript text, trimmed.
    pub fn transcript(&self) -> Result<String> {
        Ok(fs::read_to_string(self.dir.join(TRANSCRIPT_FILE))?
            .trim()
            .to_string())
    }

    /// The stored MP3, if one was downloaded.
    pub fn audio_path(&self) -> Option<PathBuf> {
        let entries = fs::read_dir(&self.dir).ok()?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"))
            {
                return Some(path);
            }
        }
        None
    }

    /// The stored cover image, if one was downloaded.
    pub fn image_path(&self) -> Option<PathBuf> {
        let path = self.dir.join(IMAGE_FILE);
        path.exists().then_some(path)
    }
}

/// Parse the leading `YYYY-MM-DD` of an episode identifier.
fn date_from_id(id: &str) -> Option<NaiveDate> {
    let prefix = id.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

fn write_if_absent(path: &Path, bytes: &[u8]) -> Result<()> {
    if path.exists() {
        debug!(path = %path.display(), "File exists; not overwriting");
        return Ok(());
    }
    fs::write(path, bytes)?;
    Ok(())
}
