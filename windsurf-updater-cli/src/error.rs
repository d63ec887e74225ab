//! CLI error type.

use thiserror::Error;
use windsurf_updater::UpdateError;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Failure inside the update pipeline or library.
    #[error(transparent)]
    Update(#[from] UpdateError),

    /// Invalid configuration or command-line input.
    #[error("{0}")]
    Config(String),
}

impl CliError {
    /// Short label printed in front of the error message.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Update(e) => e.category(),
            Self::Config(_) => "config",
        }
    }

    /// Whether the user cancelled rather than something failing.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Update(UpdateError::ConfirmationDeclined { .. })
        )
    }
}
