//! Upload local episodes to LingQ, skipping lessons that already exist.
//!
//! The remote title list is fetched exactly once per run; each local episode
//! whose dedup key is not present remotely becomes one lesson creation call.
//! Per-episode failures are collected into the [`UploadReport`] and the queue
//! keeps going; only run-level failures (auth, unreachable lesson list)
//! propagate.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::config::{Config, DedupKey};
use crate::error::Result;
use crate::lingq::LessonApi;
use crate::models::{LessonDraft, LessonStatus, UploadReport};
use crate::store::StoredEpisode;

/// Lesson difficulty level used for every created lesson.
const LESSON_LEVEL: u8 = 3;

/// `YYYY-MM-DD` embedded in a lesson title.
static TITLE_DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap());

/// Upload every episode whose lesson is not already in the course.
///
/// The auth check happens implicitly on the initial title listing: an
/// invalid token aborts here, before any creation call is made.
#[instrument(level = "info", skip_all, fields(course_id = config.course_id, count = episodes.len()))]
pub async fn upload_all<A: LessonApi>(
    api: &A,
    episodes: &[StoredEpisode],
    config: &Config,
) -> Result<UploadReport> {
    let existing = api.list_lesson_titles(config.course_id).await?;
    info!(remote = existing.len(), "Course lesson titles fetched");

    let mut seen: HashSet<String> = existing
        .keys()
        .filter_map(|title| remote_key(title, config.dedup_key))
        .collect();

    let mut report = UploadReport::default();
    for episode in episodes {
        let key = local_key(episode, config.dedup_key);
        if seen.contains(&key) {
            info!(id = %episode.id, title = %episode.title(), "Lesson already exists; skipping");
            report.skipped += 1;
            continue;
        }

        match upload_episode(api, episode, config).await {
            Ok(lesson_id) => {
                info!(id = %episode.id, lesson_id, "Lesson created");
                seen.insert(key);
                report.created.push(episode.title());
            }
            Err(e) => {
                warn!(id = %episode.id, error = %e, "Upload failed; continuing with queue");
                report.failed.push((episode.id.clone(), e.to_string()));
            }
        }
    }

    info!(
        created = report.created.len(),
        skipped = report.skipped,
        failed = report.failed.len(),
        "Upload run finished"
    );
    Ok(report)
}

async fn upload_episode<A: LessonApi>(
    api: &A,
    episode: &StoredEpisode,
    config: &Config,
) -> Result<u64> {
    let draft = build_draft(episode)?;
    api.create_lesson(config.course_id, &draft).await
}

/// Build the lesson draft for one stored episode.
///
/// Lessons with both audio and a cover image are shared; anything partial
/// stays private. Tags carry the episode year; the client appends the
/// configured defaults.
fn build_draft(episode: &StoredEpisode) -> Result<LessonDraft> {
    let text = episode.transcript()?;
    let audio_path = episode.audio_path();
    let image_path = episode.image_path();
    let status = if audio_path.is_some() && image_path.is_some() {
        LessonStatus::Shared
    } else {
        LessonStatus::Private
    };
    let original_url = (!episode.meta.url.is_empty()).then(|| episode.meta.url.clone());

    Ok(LessonDraft {
        title: episode.title(),
        text,
        status,
        level: LESSON_LEVEL,
        tags: vec![episode.date.format("%Y").to_string()],
        original_url,
        audio_path,
        image_path,
    })
}

/// Dedup key for a local episode.
fn local_key(episode: &StoredEpisode, key: DedupKey) -> String {
    match key {
        DedupKey::Title => episode.title(),
        DedupKey::Date => episode.date.to_string(),
    }
}

/// Dedup key for a remote lesson title. With date-based dedup, titles that
/// carry no recognizable date never match anything.
fn remote_key(title: &str, key: DedupKey) -> Option<String> {
    match key {
        DedupKey::Title => Some(title.to_string()),
        DedupKey::Date => TITLE_DATE_RE.find(title).map(|m| m.as_str().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::models::Episode;
    use crate::store::Store;
    use chrono::NaiveDate;
    use reqwest::StatusCode;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory stand-in for the LingQ API.
    struct FakeApi {
        titles: Mutex<HashMap<String, u64>>,
        created: Mutex<Vec<String>>,
        fail_titles: Vec<String>,
        reject_token: bool,
    }

    impl FakeApi {
        fn with_titles(titles: &[&str]) -> Self {
            let titles = titles
                .iter()
                .enumerate()
                .map(|(i, t)| (t.to_string(), i as u64 + 1))
                .collect();
            Self {
                titles: Mutex::new(titles),
                created: Mutex::new(Vec::new()),
                fail_titles: Vec::new(),
                reject_token: false,
            }
        }

        fn created_titles(&self) -> Vec<String> {
            self.created.lock().unwrap().clone()
        }
    }

    impl LessonApi for FakeApi {
        async fn list_lesson_titles(&self, _course_id: u64) -> Result<HashMap<String, u64>> {
            if self.reject_token {
                return Err(SyncError::Auth("LingQ rejected the API token".to_string()));
            }
            Ok(self.titles.lock().unwrap().clone())
        }

        async fn create_lesson(&self, _course_id: u64, draft: &LessonDraft) -> Result<u64> {
            if self.fail_titles.contains(&draft.title) {
                return Err(SyncError::Api {
                    status: StatusCode::BAD_REQUEST,
                    body: "text too long".to_string(),
                });
            }
            let mut created = self.created.lock().unwrap();
            created.push(draft.title.clone());
            let id = 100 + created.len() as u64;
            self.titles.lock().unwrap().insert(draft.title.clone(), id);
            Ok(id)
        }
    }

    fn store_episode(store: &Store, day: u32, with_image: bool) -> StoredEpisode {
        let date = NaiveDate::from_ymd_opt(2026, 1, day).unwrap();
        let episode = Episode {
            id: format!("{date}-journal"),
            date,
            url: format!("https://francaisfacile.rfi.fr/fr/podcasts/j/{date}-journal"),
            transcript: "Bonjour à tous.".to_string(),
            audio_url: "https://aod.example/ep.mp3".to_string(),
            audio_name: "ep.mp3".to_string(),
            audio: vec![0xff, 0xfb],
            image_url: with_image.then(|| "https://img.example/og.jpg".to_string()),
            image: with_image.then(|| vec![0xff, 0xd8]),
        };
        store.write(&episode).unwrap();
        let mut listed = store.list().unwrap();
        let pos = listed.iter().position(|e| e.id == episode.id).unwrap();
        listed.swap_remove(pos)
    }

    #[tokio::test]
    async fn test_creates_only_missing_lessons() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path());
        let episodes = vec![
            store_episode(&store, 14, true),
            store_episode(&store, 15, true),
        ];
        let api = FakeApi::with_titles(&["Journal en français facile 2026-01-14"]);

        let report = upload_all(&api, &episodes, &Config::defaults()).await.unwrap();

        assert_eq!(report.created, vec!["Journal en français facile 2026-01-15"]);
        assert_eq!(report.skipped, 1);
        assert!(report.failed.is_empty());
        assert_eq!(
            api.created_titles(),
            vec!["Journal en français facile 2026-01-15"]
        );
    }

    #[tokio::test]
    async fn test_rerun_creates_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path());
        let episodes = vec![
            store_episode(&store, 14, true),
            store_episode(&store, 15, true),
        ];
        let api = FakeApi::with_titles(&[
            "Journal en français facile 2026-01-14",
            "Journal en français facile 2026-01-15",
        ]);

        let report = upload_all(&api, &episodes, &Config::defaults()).await.unwrap();

        assert!(report.created.is_empty());
        assert_eq!(report.skipped, 2);
        assert!(api.created_titles().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_token_aborts_before_creation() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path());
        let episodes = vec![store_episode(&store, 15, true)];
        let api = FakeApi {
            reject_token: true,
            ..FakeApi::with_titles(&[])
        };

        let result = upload_all(&api, &episodes, &Config::defaults()).await;

        assert!(matches!(result, Err(SyncError::Auth(_))));
        assert!(api.created_titles().is_empty());
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_queue() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path());
        let episodes = vec![
            store_episode(&store, 14, true),
            store_episode(&store, 15, true),
        ];
        let api = FakeApi {
            fail_titles: vec!["Journal en français facile 2026-01-14".to_string()],
            ..FakeApi::with_titles(&[])
        };

        let report = upload_all(&api, &episodes, &Config::defaults()).await.unwrap();

        assert_eq!(report.created, vec!["Journal en français facile 2026-01-15"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "2026-01-14-journal");
    }

    #[tokio::test]
    async fn test_date_dedup_survives_title_drift() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path());
        let episodes = vec![store_episode(&store, 15, true)];
        // Remote title worded differently but dated the same day.
        let api = FakeApi::with_titles(&["JFF du 2026-01-15 (édition du soir)"]);
        let config = Config {
            dedup_key: DedupKey::Date,
            ..Config::defaults()
        };

        let report = upload_all(&api, &episodes, &config).await.unwrap();

        assert!(report.created.is_empty());
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_in_run_dedup_with_date_key() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path());
        // Two store entries for the same publish date (slug changed upstream).
        let first = store_episode(&store, 15, true);
        let second = {
            let date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
            let episode = Episode {
                id: format!("{date}-journal-bis"),
                date,
                url: "https://francaisfacile.rfi.fr/fr/podcasts/j/20260115-journal-bis"
                    .to_string(),
                transcript: "Rebonjour.".to_string(),
                audio_url: "https://aod.example/ep2.mp3".to_string(),
                audio_name: "ep2.mp3".to_string(),
                audio: vec![0xff, 0xfb],
                image_url: None,
                image: None,
            };
            store.write(&episode).unwrap();
            store
                .list()
                .unwrap()
                .into_iter()
                .find(|e| e.id == episode.id)
                .unwrap()
        };
        let api = FakeApi::with_titles(&[]);
        let config = Config {
            dedup_key: DedupKey::Date,
            ..Config::defaults()
        };

        let report = upload_all(&api, &[first, second], &config).await.unwrap();

        assert_eq!(report.created.len(), 1);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_draft_status_depends_on_image() {
        let tmp = TempDir::new().unwrap();
        let store = Store::new(tmp.path());
        let with_image = store_episode(&store, 14, true);
        let without_image = store_episode(&store, 15, false);

        let shared = build_draft(&with_image).unwrap();
        assert_eq!(shared.status, LessonStatus::Shared);
        assert!(shared.audio_path.is_some());
        assert_eq!(shared.tags, vec!["2026"]);
        assert!(shared.original_url.is_some());

        let private = build_draft(&without_image).unwrap();
        assert_eq!(private.status, LessonStatus::Private);
        assert!(private.image_path.is_none());
    }
}
