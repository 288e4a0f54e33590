use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use tracing::{debug, warn};

use super::{Chapter, Manga};
use crate::client::HttpClient;
use crate::error::DownloadError;

pub const DEFAULT_BASE_URL: &str = "https://tcbscans.com";

const SERIES_SELECTOR: &str = "div.bg-card.border.border-border.rounded.p-3.mb-3";
const CHAPTER_SELECTOR: &str = "a.block.border.border-border.bg-card.mb-3.p-3.rounded";
const CHAPTER_NAME_SELECTOR: &str = "div.text-lg.font-bold";
const CHAPTER_TITLE_SELECTOR: &str = "div.text-gray-500";
const IMAGE_SELECTOR: &str = "img.fixed-ratio-content";

/// Where series, chapters and page images are listed.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn list_series(&self) -> Result<Vec<Manga>, DownloadError>;

    /// Chapters of a series, sorted by number.
    async fn list_chapters(&self, manga: &Manga) -> Result<Vec<Chapter>, DownloadError>;

    /// Image urls of a chapter, in reading order.
    async fn list_images(&self, chapter: &Chapter) -> Result<Vec<String>, DownloadError>;
}

/// Scrapes the TCB Scans website.
pub struct TcbScans {
    client: HttpClient,
    base: Url,
}

impl TcbScans {
    pub fn new(client: HttpClient, base_url: &str) -> Result<Self, DownloadError> {
        let base = Url::parse(base_url)
            .map_err(|e| DownloadError::source_unavailable(base_url, e))?;
        Ok(Self { client, base })
    }

    async fn document(&self, path: &str) -> Result<Html, DownloadError> {
        let url = join(&self.base, path);
        let body = self.client.get_text(&url).await?;
        Ok(Html::parse_document(&body))
    }
}

#[async_trait]
impl ListingSource for TcbScans {
    async fn list_series(&self) -> Result<Vec<Manga>, DownloadError> {
        let document = self.document("/projects").await?;
        parse_series(&document)
    }

    async fn list_chapters(&self, manga: &Manga) -> Result<Vec<Chapter>, DownloadError> {
        let document = self.document(&manga.url).await?;
        parse_chapters(&document)
    }

    async fn list_images(&self, chapter: &Chapter) -> Result<Vec<String>, DownloadError> {
        let document = self.document(&chapter.url).await?;
        parse_images(&document, &self.base)
    }
}

fn join(base: &Url, path: &str) -> String {
    base.join(path)
        .map(String::from)
        .unwrap_or_else(|_| path.to_string())
}

fn selector(css: &str) -> Result<Selector, DownloadError> {
    Selector::parse(css)
        .map_err(|e| DownloadError::source_unavailable(css, format!("invalid selector: {e:?}")))
}

fn text(element: ElementRef<'_>, css: &Selector) -> String {
    element
        .select(css)
        .next()
        .map(|e| e.text().collect::<String>())
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Extracts the number out of names like `One Piece Chapter 1089.5`.
pub fn chapter_number(name: &str) -> Option<f64> {
    static NUMBER: OnceLock<Option<Regex>> = OnceLock::new();
    let regex = NUMBER
        .get_or_init(|| Regex::new(r"Chapter (\d+(\.\d+)?)").ok())
        .as_ref()?;
    regex.captures(name)?.get(1)?.as_str().parse().ok()
}

pub fn parse_series(document: &Html) -> Result<Vec<Manga>, DownloadError> {
    let link = selector("a")?;
    let cover = selector("img")?;
    Ok(document
        .select(&selector(SERIES_SELECTOR)?)
        .filter_map(|card| {
            let url = card.select(&link).next()?.value().attr("href")?;
            let title = card.select(&cover).next()?.value().attr("alt")?;
            Some(Manga::new(url.to_string(), title.to_string()))
        })
        .collect())
}

pub fn parse_chapters(document: &Html) -> Result<Vec<Chapter>, DownloadError> {
    let name_selector = selector(CHAPTER_NAME_SELECTOR)?;
    let title_selector = selector(CHAPTER_TITLE_SELECTOR)?;
    let mut chapters: Vec<Chapter> = document
        .select(&selector(CHAPTER_SELECTOR)?)
        .filter_map(|entry| {
            let url = entry.value().attr("href")?;
            let name = text(entry, &name_selector);
            let Some(number) = chapter_number(&name) else {
                warn!(name = %name, url, "skipping chapter without a number");
                return None;
            };
            Some(Chapter::new(url.to_string(), number, text(entry, &title_selector)))
        })
        .collect();
    chapters.sort_by(|a, b| a.number.total_cmp(&b.number));
    debug!(count = chapters.len(), "chapters listed");
    Ok(chapters)
}

pub fn parse_images(document: &Html, base: &Url) -> Result<Vec<String>, DownloadError> {
    Ok(document
        .select(&selector(IMAGE_SELECTOR)?)
        .filter_map(|img| img.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(|src| join(base, src))
        .collect())
}
