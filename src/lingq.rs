//! LingQ API v3 client.
//!
//! The uploader only depends on the narrow [`LessonApi`] trait, so tests can
//! substitute an in-memory fake. [`LingQClient`] is the real implementation:
//! token-authenticated `reqwest` calls against
//! `https://www.lingq.com/api/v3/{lang}/...`.
//!
//! Lesson creation is a multipart POST (text fields plus the MP3 and cover
//! image payloads). After a lesson is created the client patches its shelves
//! and tags and triggers audio timestamp generation; both steps are best
//! effort and only warn on failure.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::models::LessonDraft;

const PAGE_SIZE: usize = 50;

/// The narrow interface the uploader needs from the learning platform.
pub trait LessonApi {
    /// All lesson titles in the course, mapped to their lesson ids.
    async fn list_lesson_titles(&self, course_id: u64) -> Result<HashMap<String, u64>>;

    /// Create one lesson in the course and return its id.
    async fn create_lesson(&self, course_id: u64, draft: &LessonDraft) -> Result<u64>;
}

pub struct LingQClient {
    client: Client,
    api_root: String,
    language: String,
    token: String,
    default_tags: Vec<String>,
    default_shelves: Vec<String>,
}

impl LingQClient {
    /// Build a client from the configuration. Fails with an auth error when
    /// no API token is configured.
    pub fn new(config: &Config) -> Result<Self> {
        let token = config.require_token()?.to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            api_root: config.api_root.clone(),
            language: config.language_code.clone(),
            token,
            default_tags: config.default_tags.clone(),
            default_shelves: config.default_shelves.clone(),
        })
    }

    fn lessons_url(&self) -> String {
        format!("{}/{}/lessons/", self.api_root, self.language)
    }

    fn collection_lessons_url(&self, course_id: u64) -> String {
        format!(
            "{}/{}/collections/{}/lessons/",
            self.api_root, self.language, course_id
        )
    }

    fn auth_value(&self) -> String {
        format!("Token {}", self.token)
    }

    /// Map auth failures and other HTTP errors to the crate taxonomy.
    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SyncError::Auth(format!(
                "LingQ rejected the API token ({status})"
            )));
        }
        if status.is_client_error() || status.is_server_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Api { status, body });
        }
        Ok(resp)
    }

    /// PATCH shelves and tags onto a created lesson. Best effort.
    #[instrument(level = "info", skip(self, tags))]
    async fn update_lesson_metadata(&self, lesson_id: u64, tags: &[String]) {
        let url = format!("{}/{}/lessons/{}/", self.api_root, self.language, lesson_id);
        let payload = serde_json::json!({
            "shelves": self.default_shelves,
            "tags": tags,
        });
        let result = self
            .client
            .patch(&url)
            .header(AUTHORIZATION, self.auth_value())
            .json(&payload)
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => {
                info!(lesson_id, ?tags, "Updated lesson metadata");
            }
            Ok(resp) => {
                warn!(lesson_id, status = %resp.status(), "Failed to update lesson metadata");
            }
            Err(e) => warn!(lesson_id, error = %e, "Failed to update lesson metadata"),
        }
    }

    /// Trigger audio timestamp generation. A 409 means the timestamps
    /// already exist or are in progress, which is fine. Best effort.
    #[instrument(level = "info", skip(self))]
    async fn generate_audio_timestamps(&self, lesson_id: u64) {
        let url = format!(
            "{}/{}/lessons/{}/genaudio/",
            self.api_root, self.language, lesson_id
        );
        let result = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.auth_value())
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => {
                info!(lesson_id, "Generated audio timestamps");
            }
            Ok(resp) if resp.status() == StatusCode::CONFLICT => {
                info!(lesson_id, "Timestamps already exist or are in progress");
            }
            Ok(resp) => {
                warn!(lesson_id, status = %resp.status(), "Failed to generate timestamps");
            }
            Err(e) => warn!(lesson_id, error = %e, "Failed to generate timestamps"),
        }
    }

    async fn build_form(&self, course_id: u64, draft: &LessonDraft) -> Result<Form> {
        let mut form = Form::new()
            .text("title", draft.title.clone())
            .text("text", draft.text.clone())
            .text("status", draft.status.as_str())
            .text("accent", "france_french")
            .text("language", self.language.clone())
            .text("collection", course_id.to_string())
            .text("level", draft.level.to_string());

        for tag in lesson_tags(&draft.tags, &self.default_tags) {
            form = form.text("tags[]", tag);
        }
        for shelf in &self.default_shelves {
            form = form.text("shelves[]", shelf.clone());
        }
        if let Some(original_url) = &draft.original_url {
            form = form.text("original_url", original_url.clone());
        }

        if let Some(audio_path) = &draft.audio_path {
            let bytes = tokio::fs::read(audio_path).await?;
            let name = file_name(audio_path);
            let part = Part::bytes(bytes).file_name(name).mime_str("audio/mpeg")?;
            form = form.part("audio", part);
        }
        if let Some(image_path) = &draft.image_path {
            let bytes = tokio::fs::read(image_path).await?;
            let name = file_name(image_path);
            let part = Part::bytes(bytes).file_name(name).mime_str("image/jpeg")?;
            form = form.part("image", part);
        }

        Ok(form)
    }
}

impl LessonApi for LingQClient {
    /// Fetch the full lesson title map for a course, following pagination.
    ///
    /// A 404 yields an empty map (course has no lessons yet); 401/403 is an
    /// auth failure and aborts the run before any lesson creation.
    #[instrument(level = "info", skip(self))]
    async fn list_lesson_titles(&self, course_id: u64) -> Result<HashMap<String, u64>> {
        let url = self.collection_lessons_url(course_id);
        let mut mapping = HashMap::new();
        let mut page = 1usize;

        loop {
            let resp = self
                .client
                .get(&url)
                .header(AUTHORIZATION, self.auth_value())
                .query(&[("page", page.to_string()), ("page_size", PAGE_SIZE.to_string())])
                .send()
                .await?;

            if resp.status() == StatusCode::NOT_FOUND {
                debug!(course_id, page, "Lesson list returned 404; treating as empty");
                break;
            }
            let resp = Self::check(resp).await?;
            let body = resp.text().await?;
            let parsed: LessonPage = serde_json::from_str(&body)
                .map_err(|e| SyncError::Parse(format!("lesson list page {page}: {e}")))?;

            if parsed.results.is_empty() {
                break;
            }
            collect_titles(&parsed, &mut mapping);

            if parsed.next.is_none() {
                break;
            }
            page += 1;
        }

        info!(course_id, count = mapping.len(), "Fetched remote lesson titles");
        Ok(mapping)
    }

    #[instrument(level = "info", skip(self, draft), fields(title = %draft.title))]
    async fn create_lesson(&self, course_id: u64, draft: &LessonDraft) -> Result<u64> {
        let form = self.build_form(course_id, draft).await?;
        let resp = self
            .client
            .post(self.lessons_url())
            .header(AUTHORIZATION, self.auth_value())
            .multipart(form)
            .send()
            .await?;
        let resp = Self::check(resp).await?;

        let created: CreatedLesson = resp
            .json()
            .await
            .map_err(|e| SyncError::Parse(format!("create lesson response: {e}")))?;
        info!(lesson_id = created.id, status = draft.status.as_str(), "Lesson created");

        let all_tags = lesson_tags(&draft.tags, &self.default_tags);
        self.update_lesson_metadata(created.id, &all_tags).await;
        if draft.audio_path.is_some() {
            self.generate_audio_timestamps(created.id).await;
        }

        Ok(created.id)
    }
}

/// One page of the course lesson list. The v3 API has used both `data` and
/// `results` as the array key.
#[derive(Debug, Deserialize)]
struct LessonPage {
    #[serde(default, alias = "data")]
    results: Vec<LessonSummary>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LessonSummary {
    #[serde(default, alias = "pk")]
    id: Option<u64>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedLesson {
    id: u64,
}

/// Merge one page's lessons into the title map; entries without a title or
/// id are ignored.
fn collect_titles(page: &LessonPage, mapping: &mut HashMap<String, u64>) {
    for lesson in &page.results {
        if let (Some(title), Some(id)) = (&lesson.title, lesson.id) {
            mapping.insert(title.clone(), id);
        }
    }
}

/// Episode tags followed by the configured defaults, without duplicates.
fn lesson_tags(tags: &[String], defaults: &[String]) -> Vec<String> {
    let mut all: Vec<String> = tags.to_vec();
    for tag in defaults {
        if !all.contains(tag) {
            all.push(tag.clone());
        }
    }
    all
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string())
}
