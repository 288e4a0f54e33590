use std::path::{Path, PathBuf};

use crate::batch::{Batch, BatchReport, DownloadOptions};

pub mod archive;
pub mod chapter;
pub mod get;
pub mod listing;
pub mod page;

pub use chapter::{clean_title, Chapter, ChapterOutcome};

/// A series as listed on the site.
#[derive(Debug, Clone, PartialEq)]
pub struct Manga {
    pub url: String,
    pub title: String,
}

impl Manga {
    pub fn new(url: String, title: String) -> Self {
        Self { url, title }
    }

    /// `{base}/{title}`, with the title cleaned up for the file system.
    pub fn directory(&self, base: &Path) -> PathBuf {
        base.join(clean_title(&self.title))
    }
}

/// A manga together with the chapters picked for download.
#[derive(Debug)]
pub struct Download {
    pub manga: Manga,
    pub chapters: Vec<Chapter>,
    pub options: DownloadOptions,
}

impl Download {
    pub async fn download(self, batch: &Batch) -> BatchReport {
        batch.run(&self.manga, self.chapters, &self.options).await
    }
}
