//! Version ordering and the installed-version marker.
//!
//! Release versions are plain dot-separated numbers (`1.5.0`, `1.12`). They
//! are compared component by component, with the shorter side padded with
//! zeros, so `1.2` and `1.2.0` are the same release.

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{UpdateError, UpdateResult};

/// Name of the marker file stored directly under the installation root.
pub const MARKER_FILE: &str = ".windsurf-release";

/// Compare two dot-separated version strings.
///
/// Components that are not numbers count as `0`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left = parse_components(a);
    let right = parse_components(b);
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn parse_components(version: &str) -> Vec<u64> {
    version
        .trim()
        .split('.')
        .map(|part| part.trim().parse().unwrap_or(0))
        .collect()
}

/// The file recording which version is installed.
#[derive(Debug, Clone)]
pub struct VersionMarker {
    path: PathBuf,
}

impl VersionMarker {
    /// Marker for an installation root.
    pub fn new(install_dir: &Path) -> Self {
        Self {
            path: install_dir.join(MARKER_FILE),
        }
    }

    /// Path of the marker file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the installed version.
    ///
    /// A missing, unreadable or empty marker means the installed version is
    /// unknown and yields `None`.
    pub fn read(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let version = content.trim();
                if version.is_empty() {
                    debug!(path = %self.path.display(), "Version marker is empty");
                    None
                } else {
                    Some(version.to_string())
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No version marker found");
                None
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read version marker");
                None
            }
        }
    }

    /// Record `version` as installed.
    ///
    /// The version is written to a temporary sibling first and renamed over
    /// the marker, so readers never observe a half-written file.
    pub fn write(&self, version: &str) -> UpdateResult<()> {
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        fs::write(&tmp, version.trim()).map_err(|e| UpdateError::WriteFailed {
            path: tmp.clone(),
            source: e,
        })?;

        fs::rename(&tmp, &self.path).map_err(|e| UpdateError::WriteFailed {
            path: self.path.clone(),
            source: e,
        })
    }
}
