//! Archive download and verification.
//!
//! This module provides:
//! - Single file downloads that resume from a `.partial` file (`http`)
//! - SHA-256 checksum calculation and verification (`checksum`)
//!
//! # Resumption
//!
//! The partial file on disk is the only download state. A download writes to
//! `<dest>.partial`, asks the server for the missing tail with a `Range`
//! header on the next attempt, and renames the partial file onto `<dest>` once
//! the body has been fully streamed.
//!
//! ```text
//! windsurf-1.5.0.tar.gz.partial  ──(complete)──>  windsurf-1.5.0.tar.gz
//!        ▲        │
//!        └────────┘ interrupted: kept for the next run
//! ```

mod checksum;
mod http;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub use checksum::{calculate_file_checksum, verify_checksum};
pub use http::HttpDownloader;

use crate::error::UpdateResult;

/// Progress callback for downloads.
///
/// Arguments: (bytes written so far including resumed bytes, total size or 0
/// when the server did not report a length).
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Suffix appended to in-flight downloads.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Downloads a remote resource to a local path.
pub trait PackageDownloader {
    /// Download `url` to `dest`, resuming a previous partial transfer when
    /// possible.
    ///
    /// Returns the size of the completed file in bytes.
    fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressCallback>,
    ) -> UpdateResult<u64>;
}

/// Path of the in-flight download for `dest` (`<dest>.partial`).
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Archive file name for a release version.
pub fn archive_filename(version: &str) -> String {
    format!("windsurf-{version}.tar.gz")
}
