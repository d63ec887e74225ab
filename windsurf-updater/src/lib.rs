//! Windsurf Updater - resumable, checksum-verified tarball updates
//!
//! This library provides the core pipeline for keeping a local Windsurf
//! installation current:
//!
//! - [`release`]: resolves the latest release from the update API
//! - [`download`]: resumable HTTP downloads and SHA-256 verification
//! - [`extractor`]: confined `.tar.gz` extraction with wrapper stripping
//! - [`updater`]: the orchestrator sequencing a full update run
//!
//! # Example
//!
//! ```no_run
//! use windsurf_updater::download::HttpDownloader;
//! use windsurf_updater::platform::Platform;
//! use windsurf_updater::release::{HttpReleaseSource, DEFAULT_API_BASE};
//! use windsurf_updater::updater::{AssumeYes, UpdateRequest, Updater};
//!
//! # fn main() -> Result<(), windsurf_updater::UpdateError> {
//! let updater = Updater::new(
//!     HttpReleaseSource::new(DEFAULT_API_BASE)?,
//!     HttpDownloader::new()?,
//! );
//! let request = UpdateRequest {
//!     platform: Platform::select(None)?,
//!     download_dir: "/home/me/Downloads".into(),
//!     install_dir: "/home/me/apps/windsurf".into(),
//!     force: false,
//! };
//! let outcome = updater.run(&request, &AssumeYes, None)?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod download;
pub mod error;
pub mod extractor;
pub mod logging;
pub mod platform;
pub mod release;
pub mod updater;
pub mod version;

pub use error::{UpdateError, UpdateResult};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User agent sent with every HTTP request.
pub const USER_AGENT: &str = concat!("windsurf-updater/", env!("CARGO_PKG_VERSION"));
