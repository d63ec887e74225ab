//! Logging setup.
//!
//! Installs a `tracing` subscriber with a compact stderr layer and, when a
//! log file is configured, a non-blocking file layer with local timestamps.
//! `RUST_LOG` takes precedence over the configured level.

use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{UpdateError, UpdateResult};

/// Keeps the file writer alive; dropping it flushes pending log lines.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug, Default)]
pub struct LoggingGuard {
    file: Option<WorkerGuard>,
}

impl LoggingGuard {
    /// Flush and stop the file writer now instead of on drop.
    ///
    /// Needed before `std::process::exit`, which skips destructors.
    pub fn shutdown(&mut self) {
        self.file.take();
    }

    /// Whether a file writer is still attached.
    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }
}

/// Install the global subscriber.
///
/// Calling this more than once is harmless; later calls keep the first
/// subscriber.
pub fn init_logging(level: &str, file: Option<&Path>) -> UpdateResult<LoggingGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(level)));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact();

    let (file_layer, guard) = match file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(LocalTime::rfc_3339());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    Ok(LoggingGuard { file: guard })
}

fn file_writer(
    path: &Path,
) -> UpdateResult<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let name = path.file_name().ok_or_else(|| {
        UpdateError::InvalidConfig(format!("log file {} has no file name", path.display()))
    })?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    fs::create_dir_all(dir).map_err(|e| UpdateError::CreateDirFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let appender = tracing_appender::rolling::never(dir, name);
    Ok(tracing_appender::non_blocking(appender))
}

/// Filter directives for a level: our crates at `level`, dependencies at `warn`.
pub fn filter_directives(level: &str) -> String {
    format!("warn,windsurf_updater={level},windsurf_updater_cli={level}")
}

/// Level selected by `-v` flags, falling back to the configured level.
pub fn level_for_verbosity(verbose: u8, configured: &str) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "info".to_string(),
        _ => "debug".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_filter_directives() {
        assert_eq!(
            filter_directives("debug"),
            "warn,windsurf_updater=debug,windsurf_updater_cli=debug"
        );
        assert!(EnvFilter::try_new(filter_directives("info")).is_ok());
    }

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for_verbosity(0, "warn"), "warn");
        assert_eq!(level_for_verbosity(1, "warn"), "info");
        assert_eq!(level_for_verbosity(3, "warn"), "debug");
    }

    #[test]
    fn test_init_with_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("logs").join("updater.log");

        let guard = init_logging("info", Some(&path)).unwrap();
        tracing::info!("logging initialized");
        drop(guard);

        assert!(temp.path().join("logs").is_dir());
    }

    #[test]
    fn test_shutdown_releases_file_writer() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("updater.log");

        let mut guard = init_logging("info", Some(&path)).unwrap();
        assert!(guard.has_file());

        guard.shutdown();
        assert!(!guard.has_file());
        guard.shutdown();
    }

    #[test]
    fn test_file_without_name_is_rejected() {
        let result = init_logging("info", Some(Path::new("/")));
        assert!(matches!(result, Err(UpdateError::InvalidConfig(_))));
    }
}
