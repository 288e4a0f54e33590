use super::listing::{ListingSource, DEFAULT_BASE_URL};
use super::Download;
use crate::batch::DownloadOptions;
use crate::prompt::{self, Prompt};
use crate::report::{Level, Reporter};
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Downloads manga chapters from TCB Scans. Anything not given on the
/// command line is asked for interactively.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct GetManga {
    /// Directory the manga directory is created in
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Pack every finished chapter into a .cbz archive (true/false)
    #[arg(long)]
    pub cbz: Option<bool>,

    /// Number of the manga in the listing, starting at 1
    #[arg(short, long)]
    pub manga: Option<usize>,

    /// Chapters to download, e.g. "1-5,7,10.5"
    #[arg(short, long)]
    pub chapters: Option<String>,

    /// How many images may download at the same time, over all chapters
    #[arg(short = 'j', long, default_value_t = 8)]
    #[arg(value_parser = clap::value_parser!(u16).range(1..=64))]
    pub max_concurrent: u16,

    /// Seconds a whole request may take
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,

    /// Seconds to wait for a connection
    #[arg(long, default_value_t = 10)]
    pub connect_timeout: u64,

    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(short, long)]
    pub verbose: bool,
}

impl GetManga {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.into()
    }

    /// Works out what to download: where, whether to archive, which manga
    /// and which of its chapters. Values given as arguments skip their
    /// prompt but fail the run when they are invalid.
    pub async fn get(
        &self,
        source: &dyn ListingSource,
        input: &mut dyn Prompt,
        reporter: &dyn Reporter,
    ) -> Result<Download> {
        let output = match &self.output {
            Some(dir) if dir.is_dir() => dir.clone(),
            Some(dir) => bail!("{} is not an existing directory", dir.display()),
            None => prompt::download_location(input, reporter)
                .context("No download location given")?,
        };

        let cbz = match self.cbz {
            Some(cbz) => cbz,
            None => prompt::confirm_cbz(input, reporter)
                .context("No archive choice given")?,
        };

        reporter.report(Level::Info, "Fetching manga list...");
        let mangas = source
            .list_series()
            .await
            .context("Could not list the available manga")?;
        if mangas.is_empty() {
            bail!("The site lists no manga");
        }

        let manga = match self.manga {
            Some(number) => number
                .checked_sub(1)
                .and_then(|i| mangas.get(i))
                .with_context(|| format!("No manga number {number} in the listing"))?,
            None => prompt::select_manga(input, reporter, &mangas)
                .context("No manga selected")?,
        }
        .clone();

        reporter.report(
            Level::Info,
            &format!("Fetching chapters of {}...", manga.title),
        );
        let chapters = source
            .list_chapters(&manga)
            .await
            .with_context(|| format!("Could not list the chapters of {}", manga.title))?;
        if chapters.is_empty() {
            bail!("{} has no chapters", manga.title);
        }

        let chapters = match &self.chapters {
            Some(selection) => prompt::pick_chapters(&chapters, selection)
                .map_err(anyhow::Error::msg)
                .context("Invalid --chapters")?,
            None => prompt::select_chapters(input, reporter, &chapters)
                .context("No chapters selected")?,
        };

        Ok(Download {
            manga,
            chapters,
            options: DownloadOptions { output, cbz },
        })
    }
}
