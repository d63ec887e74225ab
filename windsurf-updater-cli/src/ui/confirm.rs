//! Interactive confirmation before an installation is replaced.

use std::path::Path;

use console::{style, Term};
use dialoguer::Confirm;
use tracing::warn;
use windsurf_updater::updater::ConfirmReplacement;

/// Asks on the terminal before removing the existing installation.
///
/// Without a terminal there is nobody to ask, so replacement is declined;
/// `--yes` is the way to run unattended.
#[derive(Debug, Default)]
pub struct InteractiveConfirm;

impl ConfirmReplacement for InteractiveConfirm {
    fn confirm(&self, install_dir: &Path) -> bool {
        if !Term::stderr().is_term() {
            warn!("Not a terminal, declining replacement (use --yes to skip the prompt)");
            return false;
        }

        eprintln!(
            "{} {} will be deleted and replaced with the new release.",
            style("warning:").yellow().bold(),
            style(install_dir.display()).bold()
        );

        Confirm::new()
            .with_prompt("Continue?")
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}
