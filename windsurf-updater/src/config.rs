//! Configuration file handling.
//!
//! Settings live in an INI file at `~/.config/windsurf-updater/config.ini`
//! (platform config directory via `dirs`):
//!
//! ```ini
//! [paths]
//! download_dir = ~/Downloads
//! install_dir = ~/apps/windsurf
//!
//! [updater]
//! platform = linux-amd64
//! api_base = https://windsurf-stable.codeium.com
//!
//! [network]
//! timeout = 0
//! connect_timeout = 30
//!
//! [logging]
//! level = warn
//! file =
//! ```
//!
//! Command-line flags override these values; a missing file means defaults.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;

use crate::error::{UpdateError, UpdateResult};
use crate::platform::{supported_keys, Platform};
use crate::release::DEFAULT_API_BASE;

/// Directory name under the platform config directory.
const APP_DIR: &str = "windsurf-updater";

/// Config file name.
const CONFIG_FILE: &str = "config.ini";

/// Accepted values for `logging.level`.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Where downloaded archives are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSettings {
    pub download_dir: PathBuf,
    pub install_dir: PathBuf,
}

/// Release selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdaterSettings {
    /// Platform override; `None` means the host platform.
    pub platform: Option<String>,
    pub api_base: String,
}

/// HTTP timeouts in seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    /// Whole-request timeout for archive downloads, 0 for none.
    pub timeout: u64,
    pub connect_timeout: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
    pub file: Option<PathBuf>,
}

/// Contents of `config.ini`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub paths: PathSettings,
    pub updater: UpdaterSettings,
    pub network: NetworkSettings,
    pub logging: LoggingSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            paths: PathSettings {
                download_dir: default_download_dir(),
                install_dir: default_install_dir(),
            },
            updater: UpdaterSettings {
                platform: None,
                api_base: DEFAULT_API_BASE.to_string(),
            },
            network: NetworkSettings {
                timeout: 0,
                connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            },
            logging: LoggingSettings {
                level: "warn".to_string(),
                file: None,
            },
        }
    }
}

impl ConfigFile {
    /// Load the config file from its default location.
    ///
    /// Returns defaults when the file does not exist.
    pub fn load() -> UpdateResult<Self> {
        let path = config_file_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load a config file from a specific path.
    pub fn load_from(path: &Path) -> UpdateResult<Self> {
        let ini = Ini::load_from_file(path).map_err(|e| {
            UpdateError::InvalidConfig(format!("failed to parse {}: {e}", path.display()))
        })?;

        let mut config = Self::default();
        for key in ConfigKey::all() {
            if let Some(value) = ini.get_from(Some(key.section()), key.key_name()) {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Save to the default location.
    pub fn save(&self) -> UpdateResult<()> {
        self.save_to(&config_file_path())
    }

    /// Save to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> UpdateResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| UpdateError::CreateDirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            ini.with_section(Some(key.section()))
                .set(key.key_name(), key.get(self));
        }

        ini.write_to_file(path)
            .map_err(|e| UpdateError::WriteFailed {
                path: path.to_path_buf(),
                source: e,
            })
    }

    /// Whole-request timeout for downloads, if one is configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.network.timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Connect timeout for all HTTP requests.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.network.connect_timeout)
    }
}

/// A settable configuration key, addressed as `section.key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    PathsDownloadDir,
    PathsInstallDir,
    UpdaterPlatform,
    UpdaterApiBase,
    NetworkTimeout,
    NetworkConnectTimeout,
    LoggingLevel,
    LoggingFile,
}

impl ConfigKey {
    /// Every key, in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            Self::PathsDownloadDir,
            Self::PathsInstallDir,
            Self::UpdaterPlatform,
            Self::UpdaterApiBase,
            Self::NetworkTimeout,
            Self::NetworkConnectTimeout,
            Self::LoggingLevel,
            Self::LoggingFile,
        ]
    }

    /// Full dotted name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PathsDownloadDir => "paths.download_dir",
            Self::PathsInstallDir => "paths.install_dir",
            Self::UpdaterPlatform => "updater.platform",
            Self::UpdaterApiBase => "updater.api_base",
            Self::NetworkTimeout => "network.timeout",
            Self::NetworkConnectTimeout => "network.connect_timeout",
            Self::LoggingLevel => "logging.level",
            Self::LoggingFile => "logging.file",
        }
    }

    /// INI section name.
    pub fn section(&self) -> &'static str {
        self.name().split('.').next().unwrap_or_default()
    }

    /// Key name within the section.
    pub fn key_name(&self) -> &'static str {
        self.name().split('.').nth(1).unwrap_or_default()
    }

    /// Current value as a string; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            Self::PathsDownloadDir => config.paths.download_dir.display().to_string(),
            Self::PathsInstallDir => config.paths.install_dir.display().to_string(),
            Self::UpdaterPlatform => config.updater.platform.clone().unwrap_or_default(),
            Self::UpdaterApiBase => config.updater.api_base.clone(),
            Self::NetworkTimeout => config.network.timeout.to_string(),
            Self::NetworkConnectTimeout => config.network.connect_timeout.to_string(),
            Self::LoggingLevel => config.logging.level.clone(),
            Self::LoggingFile => config
                .logging
                .file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Validate and store a value.
    ///
    /// An empty value resets optional keys to unset and other keys to their
    /// default.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> UpdateResult<()> {
        let value = value.trim();
        let defaults = ConfigFile::default();

        match self {
            Self::PathsDownloadDir => {
                config.paths.download_dir = if value.is_empty() {
                    defaults.paths.download_dir
                } else {
                    expand_tilde(value)
                };
            }
            Self::PathsInstallDir => {
                config.paths.install_dir = if value.is_empty() {
                    defaults.paths.install_dir
                } else {
                    expand_tilde(value)
                };
            }
            Self::UpdaterPlatform => {
                if value.is_empty() {
                    config.updater.platform = None;
                } else {
                    let platform = Platform::lookup(value).ok_or_else(|| {
                        self.invalid(value, &format!("one of {}", supported_keys().join(", ")))
                    })?;
                    config.updater.platform = Some(platform.key.to_string());
                }
            }
            Self::UpdaterApiBase => {
                if value.is_empty() {
                    config.updater.api_base = defaults.updater.api_base;
                } else if value.starts_with("http://") || value.starts_with("https://") {
                    config.updater.api_base = value.trim_end_matches('/').to_string();
                } else {
                    return Err(self.invalid(value, "an http:// or https:// URL"));
                }
            }
            Self::NetworkTimeout => {
                config.network.timeout = self.parse_secs(value, defaults.network.timeout)?;
            }
            Self::NetworkConnectTimeout => {
                let secs = self.parse_secs(value, defaults.network.connect_timeout)?;
                if secs == 0 {
                    return Err(self.invalid(value, "a positive number of seconds"));
                }
                config.network.connect_timeout = secs;
            }
            Self::LoggingLevel => {
                if value.is_empty() {
                    config.logging.level = defaults.logging.level;
                } else {
                    let level = value.to_ascii_lowercase();
                    if !LOG_LEVELS.contains(&level.as_str()) {
                        return Err(self.invalid(value, &format!("one of {}", LOG_LEVELS.join(", "))));
                    }
                    config.logging.level = level;
                }
            }
            Self::LoggingFile => {
                config.logging.file = if value.is_empty() {
                    None
                } else {
                    Some(expand_tilde(value))
                };
            }
        }
        Ok(())
    }

    fn parse_secs(&self, value: &str, default: u64) -> UpdateResult<u64> {
        if value.is_empty() {
            return Ok(default);
        }
        value
            .parse()
            .map_err(|_| self.invalid(value, "a whole number of seconds"))
    }

    fn invalid(&self, value: &str, expected: &str) -> UpdateError {
        UpdateError::InvalidConfig(format!(
            "{} = '{}' is invalid, expected {}",
            self.name(),
            value,
            expected
        ))
    }
}

impl FromStr for ConfigKey {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::all()
            .iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| UpdateError::InvalidConfig(format!("unknown configuration key '{s}'")))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Directory holding the config file.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Full path of the config file.
pub fn config_file_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Default download directory (`~/Downloads`).
pub fn default_download_dir() -> PathBuf {
    expand_tilde("~/Downloads")
}

/// Default installation root (`~/apps/windsurf`).
pub fn default_install_dir() -> PathBuf {
    expand_tilde("~/apps/windsurf")
}
