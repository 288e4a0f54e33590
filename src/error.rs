use std::path::PathBuf;
use thiserror::Error;

/// Errors from parsing a chapter selection such as `1-5,7,10.5`.
#[derive(Debug, Error, PartialEq)]
pub enum SelectionError {
    #[error("invalid chapter number: {0:?}")]
    InvalidNumber(String),

    #[error("invalid range format: {0:?}")]
    InvalidRangeFormat(String),

    #[error("start of range should not be greater than end: {0:?}")]
    InvalidRange(String),
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("source unavailable ({url}): {reason}")]
    SourceUnavailable { url: String, reason: String },

    #[error("failed to fetch {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("failed to write {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build archive {}: {reason}", path.display())]
    ArchiveFailed { path: PathBuf, reason: String },

    #[error("download cancelled")]
    Cancelled,
}

impl DownloadError {
    pub fn source_unavailable(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn fetch_failed(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::FetchFailed {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn write_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteFailed {
            path: path.into(),
            source,
        }
    }
}
