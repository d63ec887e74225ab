//! Update orchestration.
//!
//! This module sequences a full update run:
//! 1. Resolve the latest release for the selected platform
//! 2. Compare it against the installed version marker
//! 3. Download the archive (or reuse a verified one already on disk)
//! 4. Verify its SHA-256 digest
//! 5. Confirm replacement of the existing installation
//! 6. Extract into a staging directory and swap it into place
//! 7. Record the installed version
//!
//! Nothing under the installation root is touched before the archive has been
//! verified and the replacement confirmed.

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::download::{archive_filename, verify_checksum, PackageDownloader, ProgressCallback};
use crate::error::{UpdateError, UpdateResult};
use crate::extractor::{ArchiveExtractor, ExtractionStats, TarGzExtractor};
use crate::platform::Platform;
use crate::release::{ReleaseDescriptor, ReleaseSource};
use crate::version::{compare_versions, VersionMarker};

/// Stage callback for update runs.
///
/// # Arguments
///
/// * `stage` - Stage being entered
/// * `message` - Human-readable message
pub type StageCallback = Box<dyn Fn(UpdateStage, &str) + Send + Sync>;

/// Ordering used to decide whether a release is newer than the installed one.
pub type VersionOrdering = fn(&str, &str) -> Ordering;

/// Stages of an update run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStage {
    /// Querying the update API.
    ResolvingRelease,
    /// Reading the installed version marker.
    CheckingLocalVersion,
    /// Downloading the archive, or looking for one already on disk.
    AwaitingDownload,
    /// Checking the archive digest.
    VerifyingIntegrity,
    /// Asking whether the existing installation may be replaced.
    ConfirmingReplacement,
    /// Extracting the archive into the staging directory.
    Extracting,
    /// Swapping the staging directory into place.
    ReplacingInstall,
    /// Writing the version marker.
    RecordingVersion,
    /// Run finished.
    Done,
}

impl UpdateStage {
    /// Get a human-readable name for the stage.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ResolvingRelease => "Resolving release",
            Self::CheckingLocalVersion => "Checking installed version",
            Self::AwaitingDownload => "Downloading",
            Self::VerifyingIntegrity => "Verifying",
            Self::ConfirmingReplacement => "Confirming replacement",
            Self::Extracting => "Extracting",
            Self::ReplacingInstall => "Replacing installation",
            Self::RecordingVersion => "Recording version",
            Self::Done => "Done",
        }
    }
}

/// Decides whether an existing installation may be removed.
pub trait ConfirmReplacement {
    /// Return `true` to allow `install_dir` to be replaced.
    fn confirm(&self, install_dir: &Path) -> bool;
}

/// Confirmation that always allows replacement.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl ConfirmReplacement for AssumeYes {
    fn confirm(&self, _install_dir: &Path) -> bool {
        true
    }
}

impl<F> ConfirmReplacement for F
where
    F: Fn(&Path) -> bool,
{
    fn confirm(&self, install_dir: &Path) -> bool {
        self(install_dir)
    }
}

/// Parameters of a single update run.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    /// Platform to fetch the release for.
    pub platform: Platform,
    /// Existing directory that receives the archive.
    pub download_dir: PathBuf,
    /// Installation root, replaced wholesale on update.
    pub install_dir: PathBuf,
    /// Install even when the installed version is not older.
    pub force: bool,
}

/// How an update run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The installed version is already current.
    UpToDate { installed: String, latest: String },
    /// A new version was extracted into the installation root.
    Installed {
        version: String,
        install_dir: PathBuf,
        stats: ExtractionStats,
    },
    /// The archive was downloaded and verified but must be installed by hand.
    ManualInstallRequired {
        version: String,
        archive_path: PathBuf,
    },
}

/// Update orchestrator.
///
/// Generic over the release source and downloader so the whole pipeline can
/// run against in-memory fakes.
pub struct Updater<S: ReleaseSource, D: PackageDownloader> {
    source: S,
    downloader: D,
    extractor: Box<dyn ArchiveExtractor>,
    ordering: VersionOrdering,
    on_stage: Option<StageCallback>,
}

impl<S: ReleaseSource, D: PackageDownloader> Updater<S, D> {
    /// Create an updater with the default extractor and version ordering.
    pub fn new(source: S, downloader: D) -> Self {
        Self {
            source,
            downloader,
            extractor: Box::new(TarGzExtractor::new()),
            ordering: compare_versions,
            on_stage: None,
        }
    }

    /// Use a different archive extractor.
    pub fn with_extractor(mut self, extractor: impl ArchiveExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    /// Use a different version ordering.
    pub fn with_ordering(mut self, ordering: VersionOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Report stage transitions to a callback.
    pub fn with_stage_callback(mut self, callback: StageCallback) -> Self {
        self.on_stage = Some(callback);
        self
    }

    fn enter(&self, stage: UpdateStage, message: &str) {
        debug!(stage = stage.name(), "{}", message);
        if let Some(ref cb) = self.on_stage {
            cb(stage, message);
        }
    }

    /// Run a full update.
    ///
    /// # Arguments
    ///
    /// * `request` - Platform and directories for this run
    /// * `confirm` - Asked before an existing installation is replaced
    /// * `progress` - Optional download progress callback
    pub fn run(
        &self,
        request: &UpdateRequest,
        confirm: &dyn ConfirmReplacement,
        progress: Option<ProgressCallback>,
    ) -> UpdateResult<UpdateOutcome> {
        // Stage 1: Resolve
        self.enter(
            UpdateStage::ResolvingRelease,
            &format!("Resolving latest release for {}", request.platform),
        );
        let release = self.source.latest(request.platform.token)?;
        info!(version = %release.version, url = %release.download_url, "Latest release resolved");

        // Stage 2: Compare against installed version
        self.enter(
            UpdateStage::CheckingLocalVersion,
            &format!("Latest version is {}", release.version),
        );
        if let Some(installed) = self.installed_version(request) {
            if (self.ordering)(&installed, &release.version) != Ordering::Less {
                info!(installed = %installed, latest = %release.version, "Already up to date");
                self.enter(UpdateStage::Done, "Already up to date");
                return Ok(UpdateOutcome::UpToDate {
                    installed,
                    latest: release.version,
                });
            }
            info!(installed = %installed, latest = %release.version, "Update available");
        }

        // Stages 3-4: Download and verify
        if !request.download_dir.is_dir() {
            return Err(UpdateError::DownloadDirMissing(request.download_dir.clone()));
        }
        let archive_path = request
            .download_dir
            .join(archive_filename(&release.version));
        self.acquire_archive(&release, &archive_path, progress)?;

        if !request.platform.is_auto_installable() {
            info!(
                platform = request.platform.key,
                archive = %archive_path.display(),
                "Platform requires manual installation"
            );
            self.enter(UpdateStage::Done, "Manual installation required");
            return Ok(UpdateOutcome::ManualInstallRequired {
                version: release.version,
                archive_path,
            });
        }

        // Stage 5: Confirm destructive replacement
        let install_dir = &request.install_dir;
        if install_dir.exists() {
            self.enter(
                UpdateStage::ConfirmingReplacement,
                &format!("{} will be replaced", install_dir.display()),
            );
            if !confirm.confirm(install_dir) {
                return Err(UpdateError::ConfirmationDeclined {
                    path: install_dir.clone(),
                });
            }
        }

        // Stage 6: Extract into staging, then swap
        let staging = staging_path(install_dir);
        self.enter(
            UpdateStage::Extracting,
            &format!("Extracting {}", archive_path.display()),
        );
        prepare_staging(&staging)?;
        let stats = self.extractor.extract(&archive_path, &staging)?;

        self.enter(
            UpdateStage::ReplacingInstall,
            &format!("Installing to {}", install_dir.display()),
        );
        replace_dir(&staging, install_dir)?;

        // Stage 7: Record version
        self.enter(
            UpdateStage::RecordingVersion,
            &format!("Recording version {}", release.version),
        );
        let marker = VersionMarker::new(install_dir);
        if let Err(e) = marker.write(&release.version) {
            warn!(error = %e, "Installed, but failed to record version marker");
        }

        info!(
            version = %release.version,
            files = stats.files,
            path = %install_dir.display(),
            "Update installed"
        );
        self.enter(UpdateStage::Done, "Update complete");

        Ok(UpdateOutcome::Installed {
            version: release.version,
            install_dir: install_dir.clone(),
            stats,
        })
    }

    /// Installed version, unless the run is forced or nothing is installed.
    fn installed_version(&self, request: &UpdateRequest) -> Option<String> {
        if request.force {
            debug!("Forced update, skipping version check");
            return None;
        }
        if !request.install_dir.exists() {
            return None;
        }
        VersionMarker::new(&request.install_dir).read()
    }

    /// Make sure a verified archive for `release` exists at `archive_path`.
    ///
    /// An archive already on disk is verified before it is trusted; one that
    /// fails verification is deleted and downloaded again.
    fn acquire_archive(
        &self,
        release: &ReleaseDescriptor,
        archive_path: &Path,
        progress: Option<ProgressCallback>,
    ) -> UpdateResult<()> {
        if archive_path.is_file() {
            self.enter(
                UpdateStage::VerifyingIntegrity,
                &format!("Verifying existing {}", archive_path.display()),
            );
            match verify_checksum(archive_path, &release.sha256) {
                Ok(()) => {
                    info!(archive = %archive_path.display(), "Reusing verified archive");
                    return Ok(());
                }
                Err(UpdateError::ChecksumMismatch { actual, .. }) => {
                    warn!(
                        archive = %archive_path.display(),
                        actual = %actual,
                        "Existing archive does not match, downloading again"
                    );
                    remove_file(archive_path)?;
                }
                Err(e) => return Err(e),
            }
        }

        self.enter(
            UpdateStage::AwaitingDownload,
            &format!("Downloading {}", release.download_url),
        );
        self.downloader
            .download(&release.download_url, archive_path, progress)?;

        self.enter(
            UpdateStage::VerifyingIntegrity,
            &format!("Verifying {}", archive_path.display()),
        );
        if let Err(e) = verify_checksum(archive_path, &release.sha256) {
            if matches!(e, UpdateError::ChecksumMismatch { .. }) {
                if let Err(remove) = remove_file(archive_path) {
                    warn!(error = %remove, "Failed to delete corrupt archive");
                }
            }
            return Err(e);
        }
        Ok(())
    }
}

/// Sibling directory the archive is extracted into before the swap.
pub fn staging_path(install_dir: &Path) -> PathBuf {
    let name = install_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "windsurf".to_string());
    let parent = install_dir.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!(".{name}.staging"))
}

fn prepare_staging(staging: &Path) -> UpdateResult<()> {
    if fs::symlink_metadata(staging).is_ok() {
        debug!(path = %staging.display(), "Removing stale staging directory");
        remove_tree(staging)?;
    }
    if let Some(parent) = staging.parent() {
        fs::create_dir_all(parent).map_err(|e| UpdateError::CreateDirFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Remove `install_dir` and move `staging` into its place.
fn replace_dir(staging: &Path, install_dir: &Path) -> UpdateResult<()> {
    if fs::symlink_metadata(install_dir).is_ok() {
        remove_tree(install_dir)?;
    }
    fs::rename(staging, install_dir).map_err(|e| UpdateError::WriteFailed {
        path: install_dir.to_path_buf(),
        source: e,
    })
}

fn remove_tree(path: &Path) -> UpdateResult<()> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    };
    result.map_err(|e| UpdateError::RemoveFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

fn remove_file(path: &Path) -> UpdateResult<()> {
    fs::remove_file(path).map_err(|e| UpdateError::RemoveFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use sha2::{Digest, Sha256};
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct FakeSource {
        release: ReleaseDescriptor,
    }

    impl ReleaseSource for FakeSource {
        fn latest(&self, _platform_token: &str) -> UpdateResult<ReleaseDescriptor> {
            Ok(self.release.clone())
        }
    }

    struct FakeDownloader {
        body: Vec<u8>,
        calls: Arc<AtomicUsize>,
    }

    impl PackageDownloader for FakeDownloader {
        fn download(
            &self,
            _url: &str,
            dest: &Path,
            progress: Option<ProgressCallback>,
        ) -> UpdateResult<u64> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            fs::write(dest, &self.body).unwrap();
            if let Some(cb) = progress {
                cb(self.body.len() as u64, self.body.len() as u64);
            }
            Ok(self.body.len() as u64)
        }
    }

    fn archive_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (name, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn sha256_hex(data: &[u8]) -> String {
        format!("{:x}", Sha256::digest(data))
    }

    struct Harness {
        temp: TempDir,
        body: Vec<u8>,
        calls: Arc<AtomicUsize>,
    }

    impl Harness {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            fs::create_dir(temp.path().join("downloads")).unwrap();
            Self {
                temp,
                body: archive_bytes(&[("Windsurf/bin/windsurf", &b"v1.5.0"[..])]),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn updater(&self, sha256: &str) -> Updater<FakeSource, FakeDownloader> {
            Updater::new(
                FakeSource {
                    release: ReleaseDescriptor {
                        download_url: "https://example.com/windsurf.tar.gz".to_string(),
                        version: "1.5.0".to_string(),
                        sha256: sha256.to_string(),
                    },
                },
                FakeDownloader {
                    body: self.body.clone(),
                    calls: Arc::clone(&self.calls),
                },
            )
        }

        fn valid_updater(&self) -> Updater<FakeSource, FakeDownloader> {
            self.updater(&sha256_hex(&self.body))
        }

        fn request(&self, platform: &str) -> UpdateRequest {
            UpdateRequest {
                platform: Platform::lookup(platform).unwrap(),
                download_dir: self.download_dir(),
                install_dir: self.install_dir(),
                force: false,
            }
        }

        fn download_dir(&self) -> PathBuf {
            self.temp.path().join("downloads")
        }

        fn install_dir(&self) -> PathBuf {
            self.temp.path().join("apps").join("windsurf")
        }

        fn archive_path(&self) -> PathBuf {
            self.download_dir().join("windsurf-1.5.0.tar.gz")
        }

        fn existing_install(&self, version: &str) {
            fs::create_dir_all(self.install_dir()).unwrap();
            fs::write(self.install_dir().join("old-file"), b"old").unwrap();
            VersionMarker::new(&self.install_dir()).write(version).unwrap();
        }

        fn downloads(&self) -> usize {
            self.calls.load(AtomicOrdering::SeqCst)
        }
    }

    #[test]
    fn test_update_stage_name() {
        assert_eq!(UpdateStage::ResolvingRelease.name(), "Resolving release");
        assert_eq!(UpdateStage::VerifyingIntegrity.name(), "Verifying");
        assert_eq!(UpdateStage::Done.name(), "Done");
    }

    #[test]
    fn test_staging_path() {
        assert_eq!(
            staging_path(Path::new("/opt/apps/windsurf")),
            PathBuf::from("/opt/apps/.windsurf.staging")
        );
    }

    #[test]
    fn test_fresh_install() {
        let h = Harness::new();
        let outcome = h
            .valid_updater()
            .run(&h.request("linux-amd64"), &AssumeYes, None)
            .unwrap();

        match outcome {
            UpdateOutcome::Installed {
                version, stats, ..
            } => {
                assert_eq!(version, "1.5.0");
                assert_eq!(stats.files, 1);
            }
            other => panic!("Expected Installed, got {other:?}"),
        }
        assert_eq!(
            fs::read(h.install_dir().join("bin/windsurf")).unwrap(),
            b"v1.5.0"
        );
        assert_eq!(
            VersionMarker::new(&h.install_dir()).read().as_deref(),
            Some("1.5.0")
        );
        assert!(!staging_path(&h.install_dir()).exists());
        assert_eq!(h.downloads(), 1);
    }

    #[test]
    fn test_replaces_older_install() {
        let h = Harness::new();
        h.existing_install("1.4.0");
        let asked = Cell::new(0);
        let confirm = |_: &Path| {
            asked.set(asked.get() + 1);
            true
        };

        let outcome = h
            .valid_updater()
            .run(&h.request("linux-amd64"), &confirm, None)
            .unwrap();

        assert!(matches!(outcome, UpdateOutcome::Installed { .. }));
        assert_eq!(asked.get(), 1);
        assert!(!h.install_dir().join("old-file").exists());
        assert_eq!(
            VersionMarker::new(&h.install_dir()).read().as_deref(),
            Some("1.5.0")
        );
    }

    #[test]
    fn test_up_to_date_short_circuits() {
        let h = Harness::new();
        h.existing_install("1.5.0");

        let outcome = h
            .valid_updater()
            .run(&h.request("linux-amd64"), &AssumeYes, None)
            .unwrap();

        assert_eq!(
            outcome,
            UpdateOutcome::UpToDate {
                installed: "1.5.0".to_string(),
                latest: "1.5.0".to_string(),
            }
        );
        assert_eq!(h.downloads(), 0);
        assert!(h.install_dir().join("old-file").exists());
    }

    #[test]
    fn test_newer_install_is_up_to_date() {
        let h = Harness::new();
        h.existing_install("1.10.0");

        let outcome = h
            .valid_updater()
            .run(&h.request("linux-amd64"), &AssumeYes, None)
            .unwrap();

        assert!(matches!(outcome, UpdateOutcome::UpToDate { .. }));
    }

    #[test]
    fn test_force_ignores_marker() {
        let h = Harness::new();
        h.existing_install("1.5.0");
        let mut request = h.request("linux-amd64");
        request.force = true;

        let outcome = h.valid_updater().run(&request, &AssumeYes, None).unwrap();

        assert!(matches!(outcome, UpdateOutcome::Installed { .. }));
        assert_eq!(h.downloads(), 1);
    }

    #[test]
    fn test_missing_marker_proceeds() {
        let h = Harness::new();
        fs::create_dir_all(h.install_dir()).unwrap();

        let outcome = h
            .valid_updater()
            .run(&h.request("linux-amd64"), &AssumeYes, None)
            .unwrap();

        assert!(matches!(outcome, UpdateOutcome::Installed { .. }));
    }

    #[test]
    fn test_injected_ordering_is_used() {
        let h = Harness::new();
        h.existing_install("0.0.1");

        let outcome = h
            .valid_updater()
            .with_ordering(|_, _| Ordering::Greater)
            .run(&h.request("linux-amd64"), &AssumeYes, None)
            .unwrap();

        assert!(matches!(outcome, UpdateOutcome::UpToDate { .. }));
    }

    #[test]
    fn test_declined_keeps_install() {
        let h = Harness::new();
        h.existing_install("1.4.0");

        let result = h
            .valid_updater()
            .run(&h.request("linux-amd64"), &|_: &Path| false, None);

        assert!(matches!(
            result,
            Err(UpdateError::ConfirmationDeclined { .. })
        ));
        assert!(h.install_dir().join("old-file").exists());
        assert_eq!(
            VersionMarker::new(&h.install_dir()).read().as_deref(),
            Some("1.4.0")
        );
    }

    #[test]
    fn test_existing_archive_skips_download() {
        let h = Harness::new();
        fs::write(h.archive_path(), &h.body).unwrap();

        h.valid_updater()
            .run(&h.request("linux-amd64"), &AssumeYes, None)
            .unwrap();

        assert_eq!(h.downloads(), 0);
        assert!(h.install_dir().join("bin/windsurf").exists());
    }

    #[test]
    fn test_corrupt_existing_archive_is_replaced() {
        let h = Harness::new();
        fs::write(h.archive_path(), b"truncated garbage").unwrap();

        h.valid_updater()
            .run(&h.request("linux-amd64"), &AssumeYes, None)
            .unwrap();

        assert_eq!(h.downloads(), 1);
        assert_eq!(fs::read(h.archive_path()).unwrap(), h.body);
    }

    #[test]
    fn test_checksum_mismatch_deletes_archive() {
        let h = Harness::new();
        let wrong = "0".repeat(64);

        let result = h
            .updater(&wrong)
            .run(&h.request("linux-amd64"), &AssumeYes, None);

        assert!(matches!(result, Err(UpdateError::ChecksumMismatch { .. })));
        assert!(!h.archive_path().exists());
        assert!(!h.install_dir().exists());
    }

    #[test]
    fn test_missing_download_dir() {
        let h = Harness::new();
        let mut request = h.request("linux-amd64");
        request.download_dir = h.temp.path().join("nope");

        let result = h.valid_updater().run(&request, &AssumeYes, None);

        assert!(matches!(result, Err(UpdateError::DownloadDirMissing(_))));
        assert_eq!(h.downloads(), 0);
    }

    #[test]
    fn test_non_linux_requires_manual_install() {
        let h = Harness::new();
        h.existing_install("1.4.0");
        let asked = Cell::new(false);
        let confirm = |_: &Path| {
            asked.set(true);
            true
        };

        let outcome = h
            .valid_updater()
            .run(&h.request("darwin-arm64"), &confirm, None)
            .unwrap();

        assert_eq!(
            outcome,
            UpdateOutcome::ManualInstallRequired {
                version: "1.5.0".to_string(),
                archive_path: h.archive_path(),
            }
        );
        assert!(!asked.get());
        assert!(h.install_dir().join("old-file").exists());
        assert!(h.archive_path().exists());
    }

    #[test]
    fn test_failed_extraction_keeps_old_install() {
        let mut h = Harness::new();
        h.body = b"not an archive".to_vec();
        h.existing_install("1.4.0");

        let result = h
            .valid_updater()
            .run(&h.request("linux-amd64"), &AssumeYes, None);

        assert!(matches!(result, Err(UpdateError::Extraction { .. })));
        assert!(h.install_dir().join("old-file").exists());
    }

    #[test]
    fn test_stage_callback_order() {
        let h = Harness::new();
        let stages = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&stages);

        h.valid_updater()
            .with_stage_callback(Box::new(move |stage, _| {
                recorded.lock().unwrap().push(stage);
            }))
            .run(&h.request("linux-amd64"), &AssumeYes, None)
            .unwrap();

        assert_eq!(
            *stages.lock().unwrap(),
            vec![
                UpdateStage::ResolvingRelease,
                UpdateStage::CheckingLocalVersion,
                UpdateStage::AwaitingDownload,
                UpdateStage::VerifyingIntegrity,
                UpdateStage::Extracting,
                UpdateStage::ReplacingInstall,
                UpdateStage::RecordingVersion,
                UpdateStage::Done,
            ]
        );
    }
}
