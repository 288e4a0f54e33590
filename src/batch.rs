use futures::future::join_all;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::DownloadError;
use crate::manga::listing::ListingSource;
use crate::manga::page::PageDownloader;
use crate::manga::{Chapter, ChapterOutcome, Manga};
use crate::report::{Level, Reporter};

const BAR_TEMPLATE: &str = "{msg} {pos:>3}/{len:3} {bar:40.cyan/blue} {percent:>3}%";

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Base directory; the manga gets its own directory inside.
    pub output: PathBuf,
    pub cbz: bool,
}

#[derive(Debug)]
pub struct ChapterReport {
    pub chapter: Chapter,
    pub outcome: ChapterOutcome,
}

/// Per-chapter outcomes of a run, in selection order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub chapters: Vec<ChapterReport>,
}

impl BatchReport {
    pub fn completed(&self) -> usize {
        self.chapters
            .iter()
            .filter(|c| c.outcome.is_completed())
            .count()
    }

    pub fn failed(&self) -> usize {
        self.chapters.len() - self.completed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Prints one line per failed chapter cause, then the totals.
    pub fn summarize(&self, reporter: &dyn Reporter) {
        for report in &self.chapters {
            if let ChapterOutcome::Failed(errors) = &report.outcome {
                for e in errors {
                    reporter.report(
                        Level::Error,
                        &format!("Chapter {}: {}", report.chapter.number, e),
                    );
                }
            }
        }

        let summary = format!(
            "Done: {} completed, {} failed",
            self.completed(),
            self.failed()
        );
        if self.is_success() {
            reporter.report(Level::Success, &summary);
        } else {
            reporter.report(Level::Warning, &summary);
        }
    }
}

/// Downloads many chapters of one manga at the same time.
pub struct Batch {
    source: Arc<dyn ListingSource>,
    pages: PageDownloader,
    multi: MultiProgress,
}

impl Batch {
    pub fn new(
        source: Arc<dyn ListingSource>,
        pages: PageDownloader,
        multi: MultiProgress,
    ) -> Self {
        Self {
            source,
            pages,
            multi,
        }
    }

    fn chapter_bar(&self, chapter: &Chapter) -> ProgressBar {
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        let pb = ProgressBar::new(0)
            .with_style(style)
            .with_message(chapter.label());
        self.multi.add(pb)
    }

    /// Runs every chapter in its own task and waits for all of them. A failed
    /// chapter never stops its siblings.
    pub async fn run(
        &self,
        manga: &Manga,
        chapters: Vec<Chapter>,
        options: &DownloadOptions,
    ) -> BatchReport {
        let manga_dir = manga.directory(&options.output);
        debug!(manga = %manga.title, chapters = chapters.len(), "starting batch");

        let handles: Vec<_> = chapters
            .iter()
            .cloned()
            .map(|chapter| {
                let pb = self.chapter_bar(&chapter);
                let source = Arc::clone(&self.source);
                let pages = self.pages.clone();
                let dir = manga_dir.clone();
                let cbz = options.cbz;

                tokio::spawn(async move {
                    let image_urls = tokio::select! {
                        biased;
                        _ = pages.cancel_token().cancelled() => Err(DownloadError::Cancelled),
                        urls = source.list_images(&chapter) => urls,
                    };
                    let outcome = match image_urls {
                        Ok(urls) => chapter.download(&dir, urls, &pages, &pb, cbz).await,
                        Err(e) => ChapterOutcome::Failed(vec![e]),
                    };
                    finish_bar(&pb, &chapter, &outcome);
                    outcome
                })
            })
            .collect();

        let outcomes = join_all(handles).await;
        let chapters = chapters
            .into_iter()
            .zip(outcomes)
            .map(|(chapter, joined)| {
                let outcome = joined.unwrap_or_else(|e| {
                    error!(chapter = chapter.number, error = %e, "chapter task panicked");
                    ChapterOutcome::Failed(vec![DownloadError::source_unavailable(
                        chapter.url.as_str(),
                        format!("chapter task failed: {e}"),
                    )])
                });
                ChapterReport { chapter, outcome }
            })
            .collect();

        BatchReport { chapters }
    }
}

fn finish_bar(pb: &ProgressBar, chapter: &Chapter, outcome: &ChapterOutcome) {
    let label = chapter.label();
    match outcome {
        ChapterOutcome::Completed { pages, archive } => {
            let message = match archive {
                Some(path) => format!("{label} -> {}", path.display()),
                None => format!("{label} done, {pages} pages"),
            };
            pb.finish_with_message(message);
        }
        ChapterOutcome::Failed(errors) => {
            pb.abandon_with_message(format!("{label} failed, {} errors", errors.len()));
        }
    }
}
