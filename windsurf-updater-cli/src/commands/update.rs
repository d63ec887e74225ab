//! The update command.
//!
//! Settings are layered: command-line flags override `config.ini`, which
//! overrides the built-in defaults.

use clap::Args;
use console::style;
use windsurf_updater::config::{ConfigFile, ConfigKey};
use windsurf_updater::download::HttpDownloader;
use windsurf_updater::platform::Platform;
use windsurf_updater::release::HttpReleaseSource;
use windsurf_updater::updater::{
    AssumeYes, ConfirmReplacement, UpdateOutcome, UpdateRequest, Updater,
};

use crate::error::CliError;
use crate::ui::{stage_reporter, DownloadProgress, InteractiveConfirm};

/// Flags of the update command.
#[derive(Debug, Clone, Default, Args)]
pub struct UpdateArgs {
    /// Directory for downloaded archives (must exist) [default: ~/Downloads]
    #[arg(long, value_name = "DIR")]
    pub download_path: Option<String>,

    /// Installation directory, replaced on update [default: ~/apps/windsurf]
    #[arg(long, value_name = "DIR")]
    pub install_path: Option<String>,

    /// Platform to update for, e.g. linux-amd64 (see `platforms`)
    #[arg(long, value_name = "PLATFORM")]
    pub platform: Option<String>,

    /// Install even if the installed version is current
    #[arg(long)]
    pub force_update: bool,

    /// Replace the existing installation without asking
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Base URL of the update API
    #[arg(long, value_name = "URL")]
    pub api_base: Option<String>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct UpdateSettings {
    pub request: UpdateRequest,
    pub api_base: String,
    pub effective: ConfigFile,
}

/// Merge flags over the loaded configuration.
pub fn resolve(args: &UpdateArgs, config: &ConfigFile) -> Result<UpdateSettings, CliError> {
    let mut effective = config.clone();

    let overrides = [
        (ConfigKey::PathsDownloadDir, &args.download_path),
        (ConfigKey::PathsInstallDir, &args.install_path),
        (ConfigKey::UpdaterApiBase, &args.api_base),
    ];
    for (key, value) in overrides {
        if let Some(value) = value {
            key.set(&mut effective, value)?;
        }
    }

    let platform =
        Platform::select(args.platform.as_deref().or(effective.updater.platform.as_deref()))?;

    Ok(UpdateSettings {
        request: UpdateRequest {
            platform,
            download_dir: effective.paths.download_dir.clone(),
            install_dir: effective.paths.install_dir.clone(),
            force: args.force_update,
        },
        api_base: effective.updater.api_base.clone(),
        effective,
    })
}

/// Run an update.
pub fn run(args: UpdateArgs, config: &ConfigFile) -> Result<(), CliError> {
    let settings = resolve(&args, config)?;
    tracing::info!(
        platform = %settings.request.platform,
        download_dir = %settings.request.download_dir.display(),
        install_dir = %settings.request.install_dir.display(),
        "Starting update"
    );

    let source = HttpReleaseSource::new(settings.api_base.clone())?;
    let downloader = HttpDownloader::with_timeouts(
        settings.effective.connect_timeout(),
        settings.effective.request_timeout(),
    )?;

    let progress = DownloadProgress::new();
    let updater =
        Updater::new(source, downloader).with_stage_callback(stage_reporter(progress.clone()));

    let confirm: Box<dyn ConfirmReplacement> = if args.yes {
        Box::new(AssumeYes)
    } else {
        Box::new(InteractiveConfirm)
    };

    let result = updater.run(
        &settings.request,
        confirm.as_ref(),
        Some(progress.callback()),
    );
    progress.finish();

    report(&result?);
    Ok(())
}

fn report(outcome: &UpdateOutcome) {
    match outcome {
        UpdateOutcome::UpToDate { installed, latest } => {
            println!(
                "{} Windsurf {} is up to date (latest: {})",
                style("✓").green().bold(),
                installed,
                latest
            );
        }
        UpdateOutcome::Installed {
            version,
            install_dir,
            stats,
        } => {
            println!(
                "{} Installed Windsurf {} to {}",
                style("✓").green().bold(),
                style(version).bold(),
                install_dir.display()
            );
            if stats.skipped > 0 {
                println!(
                    "  {} unsupported archive entries were skipped",
                    stats.skipped
                );
            }
        }
        UpdateOutcome::ManualInstallRequired {
            version,
            archive_path,
        } => {
            println!(
                "{} Downloaded Windsurf {} to {}",
                style("!").yellow().bold(),
                style(version).bold(),
                archive_path.display()
            );
            println!("  Automatic installation is only available on Linux; install it manually.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args_for(platform: &str) -> UpdateArgs {
        UpdateArgs {
            platform: Some(platform.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_config_values_used_without_flags() {
        let mut config = ConfigFile::default();
        config.paths.install_dir = PathBuf::from("/srv/windsurf");

        let settings = resolve(&args_for("linux-amd64"), &config).unwrap();

        assert_eq!(settings.request.install_dir, PathBuf::from("/srv/windsurf"));
        assert_eq!(settings.request.download_dir, config.paths.download_dir);
        assert!(!settings.request.force);
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = ConfigFile::default();
        config.paths.install_dir = PathBuf::from("/srv/windsurf");
        config.updater.platform = Some("windows-amd64".to_string());

        let args = UpdateArgs {
            install_path: Some("/opt/windsurf".to_string()),
            platform: Some("linux-x64".to_string()),
            api_base: Some("http://127.0.0.1:8080".to_string()),
            force_update: true,
            ..Default::default()
        };
        let settings = resolve(&args, &config).unwrap();

        assert_eq!(settings.request.install_dir, PathBuf::from("/opt/windsurf"));
        assert_eq!(settings.request.platform.key, "linux-amd64");
        assert_eq!(settings.api_base, "http://127.0.0.1:8080");
        assert!(settings.request.force);
    }

    #[test]
    fn test_config_platform_used_without_flag() {
        let mut config = ConfigFile::default();
        config.updater.platform = Some("darwin-arm64".to_string());

        let settings = resolve(&UpdateArgs::default(), &config).unwrap();

        assert_eq!(settings.request.platform.token, "darwin-arm64-dmg");
    }

    #[test]
    fn test_tilde_in_flag_is_expanded() {
        let args = UpdateArgs {
            download_path: Some("~/archives".to_string()),
            ..args_for("linux-amd64")
        };
        let settings = resolve(&args, &ConfigFile::default()).unwrap();
        assert!(!settings.request.download_dir.starts_with("~"));
        assert!(settings.request.download_dir.ends_with("archives"));
    }

    #[test]
    fn test_unknown_platform_is_rejected() {
        let result = resolve(&args_for("beos-x86"), &ConfigFile::default());
        assert_eq!(result.unwrap_err().category(), "platform");
    }

    #[test]
    fn test_bad_api_base_is_rejected() {
        let args = UpdateArgs {
            api_base: Some("windsurf.example.com".to_string()),
            ..args_for("linux-amd64")
        };
        let result = resolve(&args, &ConfigFile::default());
        assert_eq!(result.unwrap_err().category(), "config");
    }
}
