use futures::{stream, StreamExt};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::archive::{self, CBZ_EXTENSION};
use super::page::{DownloadJob, PageDownloader};
use crate::error::DownloadError;

/// A chapter as listed by the source. The number is its key.
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub url: String,
    pub number: f64,
    pub title: String,
}

/// How a chapter download ended.
#[derive(Debug)]
pub enum ChapterOutcome {
    Completed {
        pages: usize,
        archive: Option<PathBuf>,
    },
    Failed(Vec<DownloadError>),
}

impl ChapterOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ChapterOutcome::Completed { .. })
    }
}

/// Strips characters that are illegal in file names, along with leading and
/// trailing spaces and dots.
pub fn clean_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect::<String>()
        .trim_matches(|c: char| c.is_whitespace() || c == '.')
        .to_string()
}

impl Chapter {
    pub fn new(url: String, number: f64, title: String) -> Self {
        Self {
            url,
            number,
            title: clean_title(&title),
        }
    }

    /// The chapter number with its integer part padded to three digits,
    /// `7` -> `007`, `10.5` -> `010.5`.
    pub fn padded_number(&self) -> String {
        let number = self.number.to_string();
        match number.split_once('.') {
            Some((integer, fraction)) => format!("{integer:0>3}.{fraction}"),
            None => format!("{number:0>3}"),
        }
    }

    /// `NNN title`, used for both the chapter directory and its archive.
    pub fn file_stem(&self) -> String {
        if self.title.is_empty() {
            self.padded_number()
        } else {
            format!("{} {}", self.padded_number(), self.title)
        }
    }

    pub fn label(&self) -> String {
        format!("({}) {}", self.number, self.title)
    }

    /// Downloads every page into `{manga_dir}/{file_stem}`, all at once.
    ///
    /// Every page runs to the end even if a sibling fails; any failure fails
    /// the chapter and skips the archive. With `cbz` the directory is packed
    /// into `{manga_dir}/{file_stem}.cbz` and removed once the archive is
    /// complete.
    pub async fn download(
        &self,
        manga_dir: &Path,
        image_urls: Vec<String>,
        pages: &PageDownloader,
        pb: &ProgressBar,
        cbz: bool,
    ) -> ChapterOutcome {
        if image_urls.is_empty() {
            return ChapterOutcome::Failed(vec![DownloadError::source_unavailable(
                self.url.as_str(),
                "no images found in chapter",
            )]);
        }

        if pages.cancel_token().is_cancelled() {
            return ChapterOutcome::Failed(vec![DownloadError::Cancelled]);
        }

        let directory = manga_dir.join(self.file_stem());
        if let Err(e) = tokio::fs::create_dir_all(&directory).await {
            return ChapterOutcome::Failed(vec![DownloadError::write_failed(directory, e)]);
        }

        pb.set_length(image_urls.len() as u64);
        debug!(
            chapter = self.number,
            pages = image_urls.len(),
            "downloading chapter"
        );

        let jobs: Vec<DownloadJob> = image_urls
            .into_iter()
            .enumerate()
            .map(|(index, url)| DownloadJob::new(index + 1, url, &directory))
            .collect();
        let len = jobs.len();

        let errors: Vec<DownloadError> = stream::iter(jobs)
            .map(|job| async move {
                let result = pages.download(&job).await;
                if result.is_ok() {
                    pb.inc(1);
                }
                result
            })
            .buffer_unordered(len)
            .filter_map(|result| async move { result.err() })
            .collect()
            .await;

        if !errors.is_empty() {
            debug!(
                chapter = self.number,
                failed = errors.len(),
                "chapter incomplete"
            );
            return ChapterOutcome::Failed(errors);
        }

        let archive = if cbz {
            match self.archive(manga_dir, &directory).await {
                Ok(path) => Some(path),
                Err(e) => return ChapterOutcome::Failed(vec![e]),
            }
        } else {
            None
        };

        info!(chapter = self.number, pages = len, "chapter done");
        ChapterOutcome::Completed {
            pages: len,
            archive,
        }
    }

    async fn archive(&self, manga_dir: &Path, directory: &Path) -> Result<PathBuf, DownloadError> {
        let destination = manga_dir.join(format!("{}.{}", self.file_stem(), CBZ_EXTENSION));
        let source = directory.to_path_buf();

        let packed = tokio::task::spawn_blocking(move || archive::pack(&source, &destination))
            .await
            .map_err(|e| DownloadError::ArchiveFailed {
                path: manga_dir.to_path_buf(),
                reason: e.to_string(),
            })??;

        tokio::fs::remove_dir_all(directory)
            .await
            .map_err(|e| DownloadError::write_failed(directory, e))?;
        Ok(packed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manga::page::testing::{CountingFetcher, FakeFetcher, Response, WarnLog};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn image(i: usize) -> String {
        format!("https://cdn.example.com/ch/{i}.jpg")
    }

    fn urls(count: usize) -> Vec<String> {
        (1..=count).map(image).collect()
    }

    fn fetcher_for(count: usize, failing: &[usize]) -> FakeFetcher {
        (1..=count)
            .filter(|i| !failing.contains(i))
            .fold(FakeFetcher::default(), |fetcher, i| {
                fetcher.with(&image(i), Response::Body(vec![i as u8]))
            })
    }

    fn pages(fetcher: FakeFetcher) -> PageDownloader {
        PageDownloader::new(Arc::new(fetcher), 4, CancellationToken::new())
    }

    #[test]
    fn cleans_titles() {
        assert_eq!(clean_title("  ...The End?.  "), "The End");
        assert_eq!(clean_title(r#"A<b>:c"d/e\f|g?h*"#), "Abcdefgh");
        assert_eq!(clean_title("Plain"), "Plain");
    }

    #[test]
    fn no_trailing_space_once_cleaned() {
        assert_eq!(clean_title("Who Are You ?"), "Who Are You");
        assert_eq!(clean_title("* Stars *"), "Stars");

        let chapter = Chapter::new("/c/5".into(), 5.0, "Who Are You ?".into());
        assert_eq!(chapter.file_stem(), "005 Who Are You");
    }

    #[test]
    fn pads_numbers() {
        let chapter = |n| Chapter::new(String::new(), n, "Title".into());
        assert_eq!(chapter(7.0).padded_number(), "007");
        assert_eq!(chapter(10.5).padded_number(), "010.5");
        assert_eq!(chapter(1100.0).padded_number(), "1100");
        assert_eq!(chapter(0.0).padded_number(), "000");
    }

    #[test]
    fn stems_and_labels() {
        let chapter = Chapter::new("/c/1".into(), 1.0, " Romance Dawn. ".into());
        assert_eq!(chapter.file_stem(), "001 Romance Dawn");
        assert_eq!(chapter.label(), "(1) Romance Dawn");
        let untitled = Chapter::new("/c/2".into(), 2.5, "...".into());
        assert_eq!(untitled.file_stem(), "002.5");
    }

    #[tokio::test]
    async fn downloads_every_page() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let base = dir.path();
        let chapter = Chapter::new("/c/1".into(), 1.0, "Romance Dawn".into());
        let pages = pages(fetcher_for(12, &[]));
        let pb = ProgressBar::hidden();

        let images = urls(12);
        let outcome = chapter.download(base, images, &pages, &pb, false).await;

        match outcome {
            ChapterOutcome::Completed { pages, archive } => {
                assert_eq!(pages, 12);
                assert_eq!(archive, None);
            }
            ChapterOutcome::Failed(errors) => panic!("chapter failed: {errors:?}"),
        }
        assert_eq!(pb.position(), 12);
        let chapter_dir = base.join("001 Romance Dawn");
        assert_eq!(std::fs::read(chapter_dir.join("007.jpg"))?, vec![7]);
        assert_eq!(std::fs::read_dir(&chapter_dir)?.count(), 12);
        Ok(())
    }

    #[tokio::test]
    async fn pages_download_together() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let chapter = Chapter::new("/c/1".into(), 1.0, "Romance Dawn".into());
        let fetcher = Arc::new(CountingFetcher::new(Duration::from_millis(30)));
        let pages = PageDownloader::new(fetcher.clone(), 64, CancellationToken::new());
        let pb = ProgressBar::hidden();

        let base = dir.path();
        let images = urls(10);
        let outcome = chapter.download(base, images, &pages, &pb, false).await;

        assert!(outcome.is_completed());
        assert_eq!(fetcher.peak(), 10);
        Ok(())
    }

    #[tokio::test]
    async fn reuses_existing_directory() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let chapter = Chapter::new("/c/3".into(), 3.0, "Again".into());
        std::fs::create_dir_all(dir.path().join("003 Again"))?;
        let pages = pages(fetcher_for(1, &[]));
        let pb = ProgressBar::hidden();

        let base = dir.path();
        let images = urls(1);
        let outcome = chapter.download(base, images, &pages, &pb, false).await;
        assert!(outcome.is_completed());
        Ok(())
    }

    #[tokio::test]
    async fn one_failed_page_fails_chapter_but_keeps_the_rest() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let base = dir.path();
        let chapter = Chapter::new("/c/1".into(), 1.0, "Romance Dawn".into());
        let pages = pages(fetcher_for(10, &[4]));
        let pb = ProgressBar::hidden();

        let images = urls(10);
        let outcome = chapter.download(base, images, &pages, &pb, true).await;

        let ChapterOutcome::Failed(errors) = outcome else {
            panic!("chapter should have failed");
        };
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            DownloadError::FetchFailed { url, .. } if *url == image(4)
        ));
        assert_eq!(pb.position(), 9);

        let chapter_dir = base.join("001 Romance Dawn");
        for i in (1..=10).filter(|i| *i != 4) {
            assert!(chapter_dir.join(format!("{i:03}.jpg")).exists());
        }
        assert!(!chapter_dir.join("004.jpg").exists());
        // no archive for an incomplete chapter
        assert!(!base.join("001 Romance Dawn.cbz").exists());
        Ok(())
    }

    #[tokio::test]
    async fn failed_pages_stay_off_the_warn_log() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let chapter = Chapter::new("/c/1".into(), 1.0, "Romance Dawn".into());
        let pages = pages(fetcher_for(5, &[2, 3]));
        let pb = ProgressBar::hidden();
        let log = WarnLog::default();
        let _guard = log.install();

        let base = dir.path();
        let images = urls(5);
        let outcome = chapter.download(base, images, &pages, &pb, false).await;

        assert!(!outcome.is_completed());
        assert_eq!(log.contents(), "");
        Ok(())
    }

    #[tokio::test]
    async fn cbz_replaces_directory() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let base = dir.path();
        let chapter = Chapter::new("/c/2".into(), 2.0, "The Great Swordsman".into());
        let pages = pages(fetcher_for(3, &[]));
        let pb = ProgressBar::hidden();

        let images = urls(3);
        let outcome = chapter.download(base, images, &pages, &pb, true).await;

        let cbz = base.join("002 The Great Swordsman.cbz");
        match outcome {
            ChapterOutcome::Completed { pages, archive } => {
                assert_eq!(pages, 3);
                assert_eq!(archive, Some(cbz.clone()));
            }
            ChapterOutcome::Failed(errors) => panic!("chapter failed: {errors:?}"),
        }
        assert!(cbz.exists());
        assert!(!base.join("002 The Great Swordsman").exists());
        Ok(())
    }

    #[tokio::test]
    async fn empty_chapter_fails() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let chapter = Chapter::new("/c/9".into(), 9.0, "Blank".into());
        let pages = pages(FakeFetcher::default());
        let pb = ProgressBar::hidden();

        let base = dir.path();
        let images = Vec::new();
        let outcome = chapter.download(base, images, &pages, &pb, false).await;
        assert!(matches!(
            outcome,
            ChapterOutcome::Failed(ref errors)
                if matches!(errors[..], [DownloadError::SourceUnavailable { .. }])
        ));
        assert!(!dir.path().join("009 Blank").exists());
        Ok(())
    }

    #[tokio::test]
    async fn cancelled_chapter_creates_nothing() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let chapter = Chapter::new("/c/4".into(), 4.0, "Luffy".into());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let pages = PageDownloader::new(Arc::new(fetcher_for(3, &[])), 4, cancel);
        let pb = ProgressBar::hidden();

        let base = dir.path();
        let images = urls(3);
        let outcome = chapter.download(base, images, &pages, &pb, false).await;
        assert!(matches!(
            outcome,
            ChapterOutcome::Failed(ref errors) if matches!(errors[..], [DownloadError::Cancelled])
        ));
        assert!(!dir.path().join("004 Luffy").exists());
        Ok(())
    }
}
