//! Archive extraction for installation.
//!
//! Release archives are gzip-compressed tarballs whose entries all live under
//! a single wrapper directory (`Windsurf/`). Extraction streams the archive
//! entry by entry, strips that wrapper and materializes the payload directly
//! under the destination root.
//!
//! Every entry name is checked for confinement before it is joined onto the
//! destination, both as written in the archive and after stripping. Before
//! anything is written the on-disk location is resolved as well, so symlinks
//! created by earlier entries cannot redirect a write outside the root.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::{Archive, Entry, EntryType};
use tracing::{debug, warn};

use crate::error::{UpdateError, UpdateResult};

/// Name of the top-level directory inside release archives.
pub const ARCHIVE_WRAPPER: &str = "Windsurf";

/// Counts of what an extraction produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    /// Regular files written.
    pub files: usize,
    /// Directories created.
    pub directories: usize,
    /// Symbolic links recreated.
    pub symlinks: usize,
    /// Entries ignored (hard links, devices, FIFOs, ...).
    pub skipped: usize,
}

/// Extracts a downloaded archive into a directory.
pub trait ArchiveExtractor {
    /// Extract `archive` under `dest`, creating `dest` if needed.
    fn extract(&self, archive: &Path, dest: &Path) -> UpdateResult<ExtractionStats>;
}

/// Streaming `.tar.gz` extractor that strips the archive wrapper directory.
#[derive(Debug, Clone)]
pub struct TarGzExtractor {
    wrapper: String,
}

impl Default for TarGzExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TarGzExtractor {
    /// Create an extractor for the standard `Windsurf/` wrapper.
    pub fn new() -> Self {
        Self::with_wrapper(ARCHIVE_WRAPPER)
    }

    /// Create an extractor that strips a different leading component.
    pub fn with_wrapper(wrapper: impl Into<String>) -> Self {
        Self {
            wrapper: wrapper.into(),
        }
    }

    /// Remove the wrapper from an entry name, if it is the first component.
    fn strip_wrapper(&self, name: &Path) -> PathBuf {
        let mut components = name
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .peekable();

        if let Some(Component::Normal(first)) = components.peek() {
            if first.to_str() == Some(self.wrapper.as_str()) {
                components.next();
            }
        }

        components.collect()
    }

    fn extract_entry<R: io::Read>(
        &self,
        entry: &mut Entry<'_, R>,
        archive: &Path,
        dest: &Path,
        root: &Path,
        stats: &mut ExtractionStats,
    ) -> UpdateResult<()> {
        let raw = entry
            .path()
            .map_err(|e| UpdateError::extraction(archive, format!("unreadable entry name: {e}")))?
            .into_owned();

        if !is_local(&raw) {
            return Err(UpdateError::extraction(
                &raw,
                "entry escapes the destination directory",
            ));
        }

        let relative = self.strip_wrapper(&raw);
        if relative.as_os_str().is_empty() {
            debug!(entry = %raw.display(), "Skipping wrapper directory entry");
            return Ok(());
        }
        if !is_local(&relative) {
            return Err(UpdateError::extraction(
                &raw,
                "entry escapes the destination directory",
            ));
        }

        let target = dest.join(&relative);
        let entry_type = entry.header().entry_type();

        let confine = |path: &Path| {
            ensure_confined(root, path).map_err(|reason| UpdateError::extraction(&raw, reason))
        };

        match entry_type {
            EntryType::Directory => {
                confine(&target)?;
                create_dir(&target)?;
                stats.directories += 1;
            }
            EntryType::Regular | EntryType::Continuous => {
                confine(&target)?;
                if let Some(parent) = target.parent() {
                    create_dir(parent)?;
                }
                let mode = entry.header().mode().unwrap_or(0o644);
                write_file(entry, &target, mode)?;
                stats.files += 1;
            }
            EntryType::Symlink => {
                let link = entry
                    .link_name()
                    .map_err(|e| UpdateError::extraction(&raw, format!("unreadable link: {e}")))?
                    .ok_or_else(|| UpdateError::extraction(&raw, "symlink without a target"))?
                    .into_owned();

                check_link(&relative, &link)
                    .map_err(|reason| UpdateError::extraction(&raw, reason))?;

                if let Some(parent) = target.parent() {
                    confine(parent)?;
                    create_dir(parent)?;
                }
                create_symlink(&link, &target)?;
                stats.symlinks += 1;
            }
            other => {
                warn!(
                    entry = %raw.display(),
                    kind = ?other,
                    "Skipping unsupported archive entry"
                );
                stats.skipped += 1;
            }
        }

        Ok(())
    }
}

impl ArchiveExtractor for TarGzExtractor {
    fn extract(&self, archive: &Path, dest: &Path) -> UpdateResult<ExtractionStats> {
        let file = File::open(archive).map_err(|e| UpdateError::ReadFailed {
            path: archive.to_path_buf(),
            source: e,
        })?;

        create_dir(dest)?;
        let root = fs::canonicalize(dest).map_err(|e| UpdateError::ReadFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;

        let mut tar = Archive::new(GzDecoder::new(BufReader::new(file)));
        let entries = tar
            .entries()
            .map_err(|e| UpdateError::extraction(archive, e.to_string()))?;

        let mut stats = ExtractionStats::default();
        for entry in entries {
            let mut entry = entry.map_err(|e| UpdateError::extraction(archive, e.to_string()))?;
            self.extract_entry(&mut entry, archive, dest, &root, &mut stats)?;
        }

        debug!(
            files = stats.files,
            directories = stats.directories,
            symlinks = stats.symlinks,
            skipped = stats.skipped,
            "Archive extracted"
        );
        Ok(stats)
    }
}

/// Whether a relative path stays inside the directory it is joined onto.
///
/// The check is purely lexical: absolute paths, drive prefixes and empty
/// names are rejected, and a `..` component may never climb above the start.
pub fn is_local(path: &Path) -> bool {
    if path.as_os_str().is_empty() {
        return false;
    }

    let mut depth: usize = 0;
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => return false,
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            Component::Normal(_) => depth += 1,
        }
    }
    true
}

/// Validate a symlink target relative to the link's own location.
fn check_link(relative: &Path, link: &Path) -> Result<(), String> {
    if link.as_os_str().is_empty() {
        return Err("symlink has an empty target".to_string());
    }
    if link.is_absolute() || link.has_root() {
        return Err(format!("absolute symlink target {}", link.display()));
    }

    let base = relative.parent().unwrap_or_else(|| Path::new(""));
    let resolved = base.join(link);
    if !is_local(&resolved) {
        return Err(format!(
            "symlink target {} escapes the destination directory",
            link.display()
        ));
    }
    Ok(())
}

/// Require the deepest existing ancestor of `path` (itself included) to
/// resolve inside `root`, which must already be canonical.
///
/// Components below that ancestor do not exist yet, so creating them cannot
/// follow a link.
fn ensure_confined(root: &Path, path: &Path) -> Result<(), String> {
    for ancestor in path.ancestors() {
        if fs::symlink_metadata(ancestor).is_err() {
            continue;
        }
        let resolved = fs::canonicalize(ancestor)
            .map_err(|e| format!("cannot resolve {}: {e}", ancestor.display()))?;
        if resolved.starts_with(root) {
            return Ok(());
        }
        return Err(format!(
            "{} resolves outside the destination directory",
            ancestor.display()
        ));
    }
    Err(format!("{} has no existing ancestor", path.display()))
}

fn create_dir(path: &Path) -> UpdateResult<()> {
    fs::create_dir_all(path).map_err(|e| UpdateError::CreateDirFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_file<R: io::Read>(entry: &mut R, target: &Path, mode: u32) -> UpdateResult<()> {
    let write_error = |e: io::Error| UpdateError::WriteFailed {
        path: target.to_path_buf(),
        source: e,
    };

    let mut file = File::create(target).map_err(write_error)?;
    io::copy(entry, &mut file)
        .map_err(|e| UpdateError::extraction(target, format!("failed to copy entry: {e}")))?;
    set_mode(&file, mode).map_err(write_error)?;
    Ok(())
}

#[cfg(unix)]
fn set_mode(file: &File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
fn set_mode(_file: &File, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn create_symlink(link: &Path, target: &Path) -> UpdateResult<()> {
    std::os::unix::fs::symlink(link, target).map_err(|e| UpdateError::WriteFailed {
        path: target.to_path_buf(),
        source: e,
    })
}

#[cfg(not(unix))]
fn create_symlink(link: &Path, target: &Path) -> UpdateResult<()> {
    warn!(
        link = %target.display(),
        points_to = %link.display(),
        "Symlinks are not recreated on this platform"
    );
    Ok(())
}
