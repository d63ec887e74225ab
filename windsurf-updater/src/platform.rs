//! Mapping from host platforms to update API platform tokens.
//!
//! The update API names its platforms differently from Rust's
//! `std::env::consts` values. The table below is the single source of truth
//! for which (OS, architecture) pairs have an update channel.

use std::fmt;

use crate::error::{UpdateError, UpdateResult};

/// A supported platform and its update API token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// Human-facing key, `<os>-<arch>` (e.g. `linux-amd64`).
    pub key: &'static str,
    /// Operating system identifier.
    pub os: &'static str,
    /// Architecture identifier.
    pub arch: &'static str,
    /// Token understood by the update API (e.g. `linux-x64`).
    pub token: &'static str,
}

/// Every platform the update API publishes releases for.
pub const SUPPORTED_PLATFORMS: &[Platform] = &[
    Platform {
        key: "darwin-arm64",
        os: "darwin",
        arch: "arm64",
        token: "darwin-arm64-dmg",
    },
    Platform {
        key: "darwin-amd64",
        os: "darwin",
        arch: "amd64",
        token: "darwin-x64-dmg",
    },
    Platform {
        key: "linux-amd64",
        os: "linux",
        arch: "amd64",
        token: "linux-x64",
    },
    Platform {
        key: "windows-amd64",
        os: "windows",
        arch: "amd64",
        token: "win32-x64",
    },
];

impl Platform {
    /// Find the platform for an (OS, architecture) pair.
    pub fn from_pair(os: &str, arch: &str) -> Option<Self> {
        SUPPORTED_PLATFORMS
            .iter()
            .find(|p| p.os == os && p.arch == arch)
            .copied()
    }

    /// The platform of the running host, if it has an update channel.
    pub fn current() -> Option<Self> {
        Self::from_pair(
            host_os(std::env::consts::OS),
            host_arch(std::env::consts::ARCH),
        )
    }

    /// Look up a platform by key (`linux-amd64`) or API token (`linux-x64`).
    pub fn lookup(name: &str) -> Option<Self> {
        let name = name.trim();
        SUPPORTED_PLATFORMS
            .iter()
            .find(|p| p.key.eq_ignore_ascii_case(name) || p.token.eq_ignore_ascii_case(name))
            .copied()
    }

    /// Select the platform to update for.
    ///
    /// An explicit override always wins; otherwise the host platform is used.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::UnsupportedPlatform`] listing the supported keys
    /// when neither the override nor the host maps to a known platform.
    pub fn select(override_name: Option<&str>) -> UpdateResult<Self> {
        let found = match override_name {
            Some(name) => Self::lookup(name),
            None => Self::current(),
        };

        found.ok_or_else(|| UpdateError::UnsupportedPlatform {
            requested: override_name
                .map(str::to_string)
                .unwrap_or_else(host_key),
            supported: supported_keys().join(", "),
        })
    }

    /// Whether archives for this platform are extracted automatically.
    ///
    /// Only the Linux tarball is installed in place; every other platform
    /// ships an installer the user has to run.
    pub fn is_auto_installable(&self) -> bool {
        self.token.starts_with("linux-")
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.key, self.token)
    }
}

/// Keys of all supported platforms, in table order.
pub fn supported_keys() -> Vec<&'static str> {
    SUPPORTED_PLATFORMS.iter().map(|p| p.key).collect()
}

/// `<os>-<arch>` of the running host in table notation.
pub fn host_key() -> String {
    format!(
        "{}-{}",
        host_os(std::env::consts::OS),
        host_arch(std::env::consts::ARCH)
    )
}

fn host_os(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

fn host_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    }
}
