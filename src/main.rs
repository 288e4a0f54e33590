use anyhow::{Context, Result};
use clap::Parser;
use indicatif::MultiProgress;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

mod batch;
mod client;
mod error;
mod manga;
mod prompt;
mod report;
mod selection;

use batch::Batch;
use client::HttpClient;
use manga::get::GetManga;
use manga::listing::TcbScans;
use manga::page::PageDownloader;
use prompt::LinePrompt;
use report::{ConsoleReporter, Level, Reporter};

#[tokio::main]
async fn main() -> ExitCode {
    let args = GetManga::parse();

    tracing_subscriber::fmt()
        .with_max_level(log_level(args.verbose))
        .with_writer(std::io::stderr)
        .init();

    let reporter = ConsoleReporter;
    match run(&args, &reporter).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            reporter.report(Level::Error, &format!("Error: {e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn log_level(verbose: bool) -> tracing::Level {
    if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    }
}

/// Returns whether every selected chapter was downloaded.
async fn run(args: &GetManga, reporter: &dyn Reporter) -> Result<bool> {
    let client = HttpClient::new(args.timeout(), args.connect_timeout())
        .context("Could not build the HTTP client")?;
    let source = Arc::new(TcbScans::new(client.clone(), &args.base_url)?);

    let download = args
        .get(source.as_ref(), &mut LinePrompt::stdio(), reporter)
        .await?;

    // Installed only now so ctrl-c still kills the process while prompting.
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling downloads");
                cancel.cancel();
            }
        }
    });

    let pages = PageDownloader::new(Arc::new(client), args.max_concurrent(), cancel);
    let batch = Batch::new(source, pages, MultiProgress::new());

    reporter.report(
        Level::Info,
        &format!(
            "Downloading {} chapter(s) of {} to {}",
            download.chapters.len(),
            download.manga.title,
            download.manga.directory(&download.options.output).display()
        ),
    );
    let report = download.download(&batch).await;
    report.summarize(reporter);
    Ok(report.is_success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_turns_on_debug_logs() {
        assert_eq!(log_level(false), tracing::Level::WARN);
        assert_eq!(log_level(true), tracing::Level::DEBUG);
    }
}
