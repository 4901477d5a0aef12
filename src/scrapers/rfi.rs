//! RFI episode scraper for *Journal en français facile*.
//!
//! Scraping is two-phase:
//!
//! 1. **Listing**: walk the podcast listing pages and extract episode URLs,
//!    each carrying its publish date in the `(\d{8})-slug` path segment.
//! 2. **Episode**: fetch each episode page, pull the transcript out of the
//!    on-page `.m-transcription` block, find the MP3 URL in the raw HTML,
//!    and download the audio (plus the cover image, best effort).
//!
//! Pages missing a transcript or an MP3 produce no [`Episode`]; the caller
//! logs and moves on to the next one.

use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::models::Episode;

/// Episode links on the listing page: captures the YYYYMMDD publish date.
static LISTING_EPISODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/fr/podcasts/journal-en-fran%C3%A7ais-facile/(\d{8})-").unwrap()
});

/// First MP3 URL anywhere in the episode page HTML.
static MP3_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"https?://[^\s"]+\.mp3"#).unwrap());

/// Collapses runs of whitespace; the page uses many consecutive spaces.
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

pub struct Scraper {
    client: Client,
    listing_url: Url,
}

impl Scraper {
    pub fn new(config: &Config) -> Result<Self> {
        let listing_url = Url::parse(&config.listing_url)
            .map_err(|e| SyncError::Parse(format!("listing URL {}: {e}", config.listing_url)))?;
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            listing_url,
        })
    }

    /// Walk listing pages and return up to `limit` episodes, newest first.
    ///
    /// A fetch failure on the first page is fatal for the run; failures on
    /// later pages are logged and end the walk with what was collected so
    /// far. The walk also stops early when a page contributes no new links.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch_listing(
        &self,
        limit: usize,
        since: Option<NaiveDate>,
        pages: usize,
    ) -> Result<Vec<(NaiveDate, String)>> {
        let mut collected: HashMap<String, NaiveDate> = HashMap::new();

        for page in 0..pages.max(1) {
            let page_url = if page == 0 {
                self.listing_url.to_string()
            } else {
                format!("{}?page={page}", self.listing_url)
            };

            let html = match self.get_text(&page_url).await {
                Ok(html) => html,
                Err(e) if page == 0 => {
                    // Without the index page there is nothing to scrape.
                    return Err(e);
                }
                Err(e) => {
                    warn!(page, error = %e, "Failed to fetch listing page; stopping walk");
                    break;
                }
            };

            let links = find_episode_links(&html, &self.listing_url);
            let before = collected.len();
            for (date, link) in links {
                collected.insert(link, date);
            }
            if collected.len() == before {
                debug!(page, "No new episode links on page; stopping walk");
                break;
            }
        }

        let episodes = select_episodes(collected, since, limit);
        info!(count = episodes.len(), "Indexed episode URLs");
        Ok(episodes)
    }

    /// Fetch one episode page and download its media.
    ///
    /// Returns `Ok(None)` when the page has no transcript or no MP3 link;
    /// such episodes are skipped without failing the batch. Image download
    /// failures are logged and the episode is kept without an image.
    #[instrument(level = "info", skip(self), fields(%url, %date))]
    pub async fn fetch_episode(&self, date: NaiveDate, url: &str) -> Result<Option<Episode>> {
        let html = self.get_text(url).await?;

        let page = match extract_episode_page(&html) {
            Some(page) => page,
            None => return Ok(None),
        };

        let audio_name = mp3_file_name(&page.audio_url);
        let audio = self.get_bytes(&page.audio_url).await?;
        info!(bytes = audio.len(), file = %audio_name, "Downloaded audio");

        let image = match &page.image_url {
            Some(image_url) => match self.get_bytes(image_url).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!(%image_url, error = %e, "Failed to download image; keeping episode");
                    None
                }
            },
            None => None,
        };

        let slug = slug_from_url(url);
        Ok(Some(Episode {
            id: format!("{date}-{slug}"),
            date,
            url: url.to_string(),
            transcript: page.transcript,
            audio_url: page.audio_url,
            audio_name,
            audio,
            image_url: page.image_url,
            image,
        }))
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        Ok(resp.text().await?)
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        Ok(resp.bytes().await?.to_vec())
    }
}

/// Transcript, MP3 URL, and image URL pulled from one episode page.
struct EpisodePage {
    transcript: String,
    audio_url: String,
    image_url: Option<String>,
}

/// Parse an episode page. `None` when the transcript or the MP3 is missing.
fn extract_episode_page(html: &str) -> Option<EpisodePage> {
    let audio_url = MP3_RE.find(html)?.as_str().to_string();
    let transcript = extract_transcript(html)?;
    let image_url = extract_image_url(html);
    Some(EpisodePage {
        transcript,
        audio_url,
        image_url,
    })
}

/// Order collected listing links newest first, then apply the `since`
/// filter and the limit. A limit of zero keeps everything.
fn select_episodes(
    collected: HashMap<String, NaiveDate>,
    since: Option<NaiveDate>,
    limit: usize,
) -> Vec<(NaiveDate, String)> {
    let mut episodes: Vec<(NaiveDate, String)> = collected
        .into_iter()
        .map(|(link, date)| (date, link))
        .collect();
    episodes.sort_by(|a, b| b.0.cmp(&a.0));
    if let Some(since) = since {
        episodes.retain(|(date, _)| *date >= since);
    }
    if limit > 0 {
        episodes.truncate(limit);
    }
    episodes
}

/// Extract episode `(date, absolute URL)` pairs from listing page HTML.
///
/// Relative hrefs are resolved against `base`. Duplicate hrefs (the date and
/// the title both link the same episode) collapse to one entry.
pub fn find_episode_links(html: &str, base: &Url) -> Vec<(NaiveDate, String)> {
    let document = Html::parse_document(html);
    let link_selector = Selector::parse("a[href]").unwrap();

    let mut found: HashMap<String, NaiveDate> = HashMap::new();
    for element in document.select(&link_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(captures) = LISTING_EPISODE_RE.captures(href) else {
            continue;
        };
        let Ok(date) = NaiveDate::parse_from_str(&captures[1], "%Y%m%d") else {
            continue;
        };
        if let Ok(resolved) = base.join(href) {
            found.insert(resolved.to_string(), date);
        }
    }

    let mut links: Vec<(NaiveDate, String)> =
        found.into_iter().map(|(link, date)| (date, link)).collect();
    links.sort_by(|a, b| b.0.cmp(&a.0));
    links
}

/// Grab plain transcript text from the on-page transcription block.
///
/// Paragraphs are kept separated by blank lines for readability; falls back
/// to the block's full text when it has no `<p>` children.
pub fn extract_transcript(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let block_selector = Selector::parse(".m-transcription").unwrap();
    let para_selector = Selector::parse("p").unwrap();

    let block = document.select(&block_selector).next()?;

    let paras: Vec<String> = block
        .select(&para_selector)
        .filter_map(|p| {
            let raw = p.text().collect::<Vec<_>>().join(" ");
            let clean = WHITESPACE_RE.replace_all(&raw, " ").trim().to_string();
            (!clean.is_empty()).then_some(clean)
        })
        .collect();
    if !paras.is_empty() {
        return Some(paras.join("\n\n"));
    }

    let raw = block.text().collect::<Vec<_>>().join(" ");
    let fallback = WHITESPACE_RE.replace_all(&raw, " ").trim().to_string();
    (!fallback.is_empty()).then_some(fallback)
}

/// Pull `og:image` (preferred) or the first figure image URL from episode HTML.
pub fn extract_image_url(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let og_selector = Selector::parse(r#"meta[property="og:image"]"#).unwrap();
    let figure_img_selector = Selector::parse("figure img").unwrap();

    if let Some(og) = document.select(&og_selector).next() {
        if let Some(content) = og.value().attr("content") {
            if !content.is_empty() {
                return Some(content.to_string());
            }
        }
    }
    document
        .select(&figure_img_selector)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(str::to_string)
}

/// Make a filesystem-safe slug from the last path segment of a URL.
pub fn slug_from_url(url: &str) -> String {
    let tail = url.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    let tail = urlencoding::decode(tail).map_or_else(|_| tail.to_string(), |s| s.into_owned());
    let slug = tail
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>();
    let slug = slug.trim_matches('-');
    // successive separators collapse to one
    let mut out = String::with_capacity(slug.len());
    let mut prev_dash = false;
    for c in slug.chars() {
        if c == '-' {
            if !prev_dash {
                out.push('-');
            }
            prev_dash = true;
        } else {
            out.push(c);
            prev_dash = false;
        }
    }
    if out.is_empty() {
        "episode".to_string()
    } else {
        out
    }
}

/// File name for a downloaded MP3, from the last path segment of its URL.
pub fn mp3_file_name(audio_url: &str) -> String {
    audio_url
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("episode.mp3")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING_HTML: &str = r#"
        <html><body>
          <div class="o-layout-list">
            <a href="/fr/podcasts/journal-en-fran%C3%A7ais-facile/20260115-tempete-en-bretagne">15/01</a>
            <a href="/fr/podcasts/journal-en-fran%C3%A7ais-facile/20260115-tempete-en-bretagne">doublon</a>
            <a href="/fr/podcasts/journal-en-fran%C3%A7ais-facile/20260114-elections-au-chili">14/01</a>
            <a href="/fr/podcasts/autre-emission/20260114-pas-le-journal">autre</a>
            <a href="/fr/autre-page">nav</a>
          </div>
        </body></html>
    "#;

    fn base() -> Url {
        Url::parse("https://francaisfacile.rfi.fr/fr/podcasts/journal-en-fran%C3%A7ais-facile/")
            .unwrap()
    }

    #[test]
    fn test_find_episode_links_dedupes_and_sorts() {
        let links = find_episode_links(LISTING_HTML, &base());
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].0, NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
        assert!(links[0].1.contains("20260115-tempete-en-bretagne"));
        assert_eq!(links[1].0, NaiveDate::from_ymd_opt(2026, 1, 14).unwrap());
        assert!(links[0].1.starts_with("https://francaisfacile.rfi.fr/"));
    }

    #[test]
    fn test_find_episode_links_empty_page() {
        let links = find_episode_links("<html><body>rien</body></html>", &base());
        assert!(links.is_empty());
    }

    #[test]
    fn test_extract_transcript_paragraphs() {
        let html = r#"
            <div class="m-transcription">
              <p>Bonjour   à tous.</p>
              <p></p>
              <p>Voici le <em>journal</em>.</p>
            </div>
        "#;
        let transcript = extract_transcript(html).unwrap();
        assert_eq!(transcript, "Bonjour à tous.\n\nVoici le journal .");
    }

    #[test]
    fn test_extract_transcript_fallback_without_paragraphs() {
        let html = r#"<div class="m-transcription">  Texte   brut  </div>"#;
        assert_eq!(extract_transcript(html).unwrap(), "Texte brut");
    }

    #[test]
    fn test_extract_transcript_missing_block() {
        assert!(extract_transcript("<div class='autre'>x</div>").is_none());
    }

    #[test]
    fn test_extract_image_prefers_og() {
        let html = r#"
            <meta property="og:image" content="https://img.example/og.jpg">
            <figure><img src="https://img.example/fig.jpg"></figure>
        "#;
        assert_eq!(
            extract_image_url(html).as_deref(),
            Some("https://img.example/og.jpg")
        );
    }

    #[test]
    fn test_extract_image_figure_fallback() {
        let html = r#"<figure><img src="https://img.example/fig.jpg"></figure>"#;
        assert_eq!(
            extract_image_url(html).as_deref(),
            Some("https://img.example/fig.jpg")
        );
    }

    #[test]
    fn test_extract_episode_page_requires_audio() {
        let html = r#"<div class="m-transcription"><p>Texte</p></div>"#;
        assert!(extract_episode_page(html).is_none());
    }

    #[test]
    fn test_extract_episode_page_requires_transcript() {
        let html = r#"<a href="https://aod.example/ep.mp3">écouter</a>"#;
        assert!(extract_episode_page(html).is_none());
    }

    #[test]
    fn test_extract_episode_page_complete() {
        let html = r#"
            <meta property="og:image" content="https://img.example/og.jpg">
            <div class="m-transcription"><p>Le journal.</p></div>
            <script>{"audio": "https://aod.example/2026/ep-0115.mp3"}</script>
        "#;
        let page = extract_episode_page(html).unwrap();
        assert_eq!(page.transcript, "Le journal.");
        assert_eq!(page.audio_url, "https://aod.example/2026/ep-0115.mp3");
        assert_eq!(page.image_url.as_deref(), Some("https://img.example/og.jpg"));
    }

    fn collected_days(days: &[u32]) -> HashMap<String, NaiveDate> {
        days.iter()
            .map(|day| {
                let date = NaiveDate::from_ymd_opt(2026, 1, *day).unwrap();
                (format!("https://x/fr/podcasts/j/202601{day:02}-journal"), date)
            })
            .collect()
    }

    #[test]
    fn test_select_episodes_limit_keeps_newest() {
        let episodes = select_episodes(collected_days(&[11, 12, 13, 14, 15]), None, 3);
        assert_eq!(episodes.len(), 3);
        let dates: Vec<u32> = episodes
            .iter()
            .map(|(date, _)| chrono::Datelike::day(date))
            .collect();
        assert_eq!(dates, vec![15, 14, 13]);
    }

    #[test]
    fn test_select_episodes_since_drops_older() {
        let since = NaiveDate::from_ymd_opt(2026, 1, 14).unwrap();
        let episodes = select_episodes(collected_days(&[11, 12, 13, 14, 15]), Some(since), 0);
        assert_eq!(episodes.len(), 2);
        assert!(episodes.iter().all(|(date, _)| *date >= since));
    }

    #[test]
    fn test_select_episodes_zero_limit_keeps_all() {
        let episodes = select_episodes(collected_days(&[11, 12, 13]), None, 0);
        assert_eq!(episodes.len(), 3);
        assert!(episodes[0].0 > episodes[1].0 && episodes[1].0 > episodes[2].0);
    }

    #[test]
    fn test_select_episodes_since_then_limit() {
        let since = NaiveDate::from_ymd_opt(2026, 1, 12).unwrap();
        let episodes = select_episodes(collected_days(&[11, 12, 13, 14, 15]), Some(since), 2);
        let dates: Vec<u32> = episodes
            .iter()
            .map(|(date, _)| chrono::Datelike::day(date))
            .collect();
        assert_eq!(dates, vec![15, 14]);
    }

    #[test]
    fn test_slug_from_url() {
        assert_eq!(
            slug_from_url("https://x/fr/podcasts/j/20260115-temp%C3%AAte-en-bretagne"),
            "20260115-temp-te-en-bretagne"
        );
        assert_eq!(slug_from_url("https://x/fr/podcasts/j/"), "j");
        assert_eq!(slug_from_url("https://x/a__b"), "a-b");
        assert_eq!(slug_from_url(""), "episode");
    }

    #[test]
    fn test_mp3_file_name() {
        assert_eq!(mp3_file_name("https://aod.example/2026/ep.mp3"), "ep.mp3");
        assert_eq!(mp3_file_name(""), "episode.mp3");
    }
}
