//! Download progress bar and stage lines.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use windsurf_updater::download::ProgressCallback;
use windsurf_updater::updater::{StageCallback, UpdateStage};

/// Progress bar fed by the downloader.
///
/// The bar stays hidden until the first bytes arrive and starts as a spinner
/// until the server reports a total size.
#[derive(Clone)]
pub struct DownloadProgress {
    bar: ProgressBar,
    started: Arc<AtomicBool>,
    sized: Arc<AtomicBool>,
}

impl Default for DownloadProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::hidden();
        bar.set_prefix("Downloading");
        Self {
            bar,
            started: Arc::new(AtomicBool::new(false)),
            sized: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Callback to hand to the downloader.
    pub fn callback(&self) -> ProgressCallback {
        let progress = self.clone();
        Box::new(move |done, total| progress.update(done, total))
    }

    fn update(&self, done: u64, total: u64) {
        if !self.started.swap(true, Ordering::SeqCst) {
            self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
            self.bar.set_style(spinner_style());
            self.bar.enable_steady_tick(std::time::Duration::from_millis(120));
        }
        if total > 0 && !self.sized.swap(true, Ordering::SeqCst) {
            self.bar.set_style(bar_style());
            self.bar.set_length(total);
        }
        self.bar.set_position(done);
    }

    /// Remove the bar from the terminal once the transfer is over.
    pub fn finish(&self) {
        if self.started.load(Ordering::SeqCst) && !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(
            "{prefix:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸━")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{prefix:.bold} {spinner:.cyan} {bytes} ({bytes_per_sec})")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Stage callback printing one styled line per stage.
///
/// Clears the download bar as soon as the pipeline moves past the transfer.
pub fn stage_reporter(progress: DownloadProgress) -> StageCallback {
    Box::new(move |stage, message| {
        if stage != UpdateStage::AwaitingDownload {
            progress.finish();
        }
        if stage == UpdateStage::Done {
            return;
        }
        eprintln!("{} {}", style(format!("{:>12}", stage_label(stage))).cyan().bold(), message);
    })
}

fn stage_label(stage: UpdateStage) -> &'static str {
    match stage {
        UpdateStage::ResolvingRelease => "Resolving",
        UpdateStage::CheckingLocalVersion => "Checking",
        UpdateStage::AwaitingDownload => "Fetching",
        UpdateStage::VerifyingIntegrity => "Verifying",
        UpdateStage::ConfirmingReplacement => "Confirming",
        UpdateStage::Extracting => "Extracting",
        UpdateStage::ReplacingInstall => "Installing",
        UpdateStage::RecordingVersion => "Recording",
        UpdateStage::Done => "Done",
    }
}
