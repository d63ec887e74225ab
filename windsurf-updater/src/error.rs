//! Error types for the updater.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for updater operations.
pub type UpdateResult<T> = Result<T, UpdateError>;

/// Errors that can occur while resolving, downloading, verifying or installing
/// an update.
///
/// Every variant is fatal for the current run. Partial artifacts (`.partial`
/// downloads, staging directories) are left on disk so the next run can pick
/// up where this one stopped.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Release metadata could not be fetched or parsed.
    #[error("failed to resolve latest release from {url}: {reason}")]
    Resolution { url: String, reason: String },

    /// The archive download failed (transport error, bad status, timeout).
    #[error("failed to download {url}: {reason}")]
    Transfer { url: String, reason: String },

    /// The downloaded archive does not match the published digest.
    #[error("checksum mismatch for {filename}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        filename: String,
        expected: String,
        actual: String,
    },

    /// Archive extraction failed.
    #[error("failed to extract {}: {reason}", path.display())]
    Extraction { path: PathBuf, reason: String },

    /// The user refused the destructive replacement of the install directory.
    #[error("replacement of {} was declined", path.display())]
    ConfirmationDeclined { path: PathBuf },

    /// The requested or detected platform has no update channel.
    #[error("platform {requested} is not supported (supported: {supported})")]
    UnsupportedPlatform { requested: String, supported: String },

    /// The configured download directory does not exist.
    #[error("download directory {} does not exist", .0.display())]
    DownloadDirMissing(PathBuf),

    /// Failed to read a file or directory.
    #[error("failed to read {}: {source}", path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file.
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// Failed to remove a file or directory.
    #[error("failed to remove {}: {source}", path.display())]
    RemoveFailed { path: PathBuf, source: io::Error },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl UpdateError {
    /// Short label of the pipeline stage the error belongs to.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Resolution { .. } => "resolution",
            Self::Transfer { .. } | Self::DownloadDirMissing(_) => "transfer",
            Self::ChecksumMismatch { .. } => "integrity",
            Self::Extraction { .. } => "extraction",
            Self::ConfirmationDeclined { .. } => "confirmation",
            Self::UnsupportedPlatform { .. } => "platform",
            Self::ReadFailed { .. }
            | Self::WriteFailed { .. }
            | Self::CreateDirFailed { .. }
            | Self::RemoveFailed { .. } => "io",
            Self::InvalidConfig(_) => "config",
        }
    }

    pub(crate) fn extraction(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
