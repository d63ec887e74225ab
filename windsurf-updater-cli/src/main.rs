//! Windsurf updater - command-line interface
//!
//! Running the binary without a subcommand performs an update, so
//! `windsurf-updater --yes` and `windsurf-updater update --yes` are
//! equivalent.

mod commands;
mod error;
mod ui;

use std::process::ExitCode;
use std::sync::{Arc, Mutex, PoisonError};

use clap::{ArgAction, Parser, Subcommand};
use console::style;
use windsurf_updater::config::ConfigFile;
use windsurf_updater::logging::{init_logging, level_for_verbosity, LoggingGuard};

use commands::config::ConfigCommands;
use commands::update::UpdateArgs;
use error::CliError;

/// Exit status used when interrupted, matching shell convention for SIGINT.
const INTERRUPTED_EXIT: i32 = 130;

#[derive(Debug, Parser)]
#[command(
    name = "windsurf-updater",
    about = "Keep a tarball installation of the Windsurf editor up to date",
    version,
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    update: UpdateArgs,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download, verify and install the latest release (default)
    Update(UpdateArgs),

    /// List supported platforms
    Platforms,

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_cancelled() => {
            eprintln!("{} {}", style("Update cancelled:").yellow().bold(), e);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!(
                "{} {}: {}",
                style("error").red().bold(),
                style(format!("[{}]", e.category())).dim(),
                e
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    // Config commands must work on a broken file so it can be located and fixed.
    let config = match (ConfigFile::load(), &cli.command) {
        (Ok(config), _) => config,
        (Err(_), Some(Commands::Config { .. })) => ConfigFile::default(),
        (Err(e), _) => return Err(e.into()),
    };

    let level = level_for_verbosity(cli.verbose, &config.logging.level);
    let logging = Arc::new(Mutex::new(init_logging(
        &level,
        config.logging.file.as_deref(),
    )?));

    let handler_logging = Arc::clone(&logging);
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!(
            "{} partial download kept, run again to resume",
            style("Interrupted:").yellow().bold()
        );
        // exit() skips destructors, so flush the log file here.
        shutdown_logging(&handler_logging);
        std::process::exit(INTERRUPTED_EXIT);
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let result = match cli.command {
        Some(Commands::Update(args)) => commands::update::run(args, &config),
        Some(Commands::Platforms) => commands::platforms::run(),
        Some(Commands::Config { command }) => commands::config::run(command),
        None => commands::update::run(cli.update, &config),
    };

    // The handler keeps its clone alive, so the guard is never dropped on its own.
    shutdown_logging(&logging);
    result
}

fn shutdown_logging(logging: &Mutex<LoggingGuard>) {
    logging
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .shutdown();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_shutdown_logging_releases_file_writer() {
        let temp = tempfile::TempDir::new().unwrap();
        let guard = init_logging("info", Some(&temp.path().join("cli.log"))).unwrap();
        let logging = Mutex::new(guard);

        shutdown_logging(&logging);
        assert!(!logging.lock().unwrap().has_file());

        shutdown_logging(&logging);
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bare_flags_run_update() {
        let cli = Cli::try_parse_from(["windsurf-updater", "--yes", "--platform", "linux-x64"])
            .unwrap();
        assert!(cli.command.is_none());
        assert!(cli.update.yes);
        assert_eq!(cli.update.platform.as_deref(), Some("linux-x64"));
    }

    #[test]
    fn test_update_subcommand() {
        let cli = Cli::try_parse_from([
            "windsurf-updater",
            "-vv",
            "update",
            "--force-update",
            "--install-path",
            "/opt/windsurf",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Some(Commands::Update(args)) => {
                assert!(args.force_update);
                assert_eq!(args.install_path.as_deref(), Some("/opt/windsurf"));
            }
            other => panic!("Expected update command, got {other:?}"),
        }
    }

    #[test]
    fn test_config_subcommand() {
        let cli =
            Cli::try_parse_from(["windsurf-updater", "config", "get", "paths.install_dir"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                command: ConfigCommands::Get { .. }
            })
        ));
    }

    #[test]
    fn test_update_flags_conflict_with_subcommand() {
        let result = Cli::try_parse_from(["windsurf-updater", "--yes", "platforms"]);
        assert!(result.is_err());
    }
}
