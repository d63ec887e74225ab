//! Release resolution against the update API.
//!
//! The update API answers `GET {base}/api/update/{platform}/stable/latest` with
//! a JSON document describing the newest build. Only the download URL, the
//! version and the SHA-256 digest matter to the pipeline; the remaining fields
//! are parsed for logging and otherwise ignored.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::error::{UpdateError, UpdateResult};

/// Base URL of the public update API.
pub const DEFAULT_API_BASE: &str = "https://windsurf-stable.codeium.com";

/// Release channel queried by the updater.
pub const RELEASE_CHANNEL: &str = "stable";

/// Default timeout for metadata requests in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Normalized description of the latest release for a platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDescriptor {
    /// Where the archive can be downloaded.
    pub download_url: String,
    /// Version string of the release (e.g. `1.5.0`).
    pub version: String,
    /// Expected SHA-256 digest of the archive, lowercase hex.
    pub sha256: String,
}

/// Raw update API response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub product_version: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    pub sha256_hash: String,
    #[serde(default)]
    pub supports_fast_update: Option<bool>,
    pub windsurf_version: String,
}

impl ReleaseInfo {
    /// Validate the response and reduce it to the fields the pipeline uses.
    pub fn into_descriptor(self) -> Result<ReleaseDescriptor, String> {
        if self.url.trim().is_empty() {
            return Err("response has an empty download url".to_string());
        }
        let version = self.windsurf_version.trim();
        if version.is_empty() {
            return Err("response has an empty version".to_string());
        }
        if !is_plain_version(version) {
            return Err(format!("response has an invalid version '{version}'"));
        }
        let sha256 = self.sha256_hash.trim().to_ascii_lowercase();
        if sha256.len() != 64 || !sha256.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("response has an invalid sha256 digest '{sha256}'"));
        }

        Ok(ReleaseDescriptor {
            download_url: self.url.trim().to_string(),
            version: version.to_string(),
            sha256,
        })
    }
}

/// Whether a version can be embedded in a file name as-is.
///
/// The version ends up in the archive file name, so only ASCII
/// alphanumerics and `.+-_` are accepted and it must not be a bare dot path.
fn is_plain_version(version: &str) -> bool {
    version != "."
        && version != ".."
        && version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-' | '_'))
}

/// Source of release metadata.
pub trait ReleaseSource {
    /// Resolve the latest release for an update API platform token.
    fn latest(&self, platform_token: &str) -> UpdateResult<ReleaseDescriptor>;
}

/// Update API client using blocking `reqwest`.
#[derive(Debug)]
pub struct HttpReleaseSource {
    client: Client,
    api_base: String,
}

impl HttpReleaseSource {
    /// Create a client for the given API base URL.
    pub fn new(api_base: impl Into<String>) -> UpdateResult<Self> {
        Self::with_timeout(api_base, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(api_base: impl Into<String>, timeout: Duration) -> UpdateResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|e| {
                UpdateError::InvalidConfig(format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            api_base: api_base.into(),
        })
    }

    /// URL of the latest-release endpoint for a platform token.
    pub fn endpoint(&self, platform_token: &str) -> String {
        format!(
            "{}/api/update/{}/{}/latest",
            self.api_base.trim_end_matches('/'),
            platform_token,
            RELEASE_CHANNEL
        )
    }
}

impl ReleaseSource for HttpReleaseSource {
    fn latest(&self, platform_token: &str) -> UpdateResult<ReleaseDescriptor> {
        let url = self.endpoint(platform_token);
        let resolution_error = |reason: String| UpdateError::Resolution {
            url: url.clone(),
            reason,
        };

        debug!(url = %url, "Fetching release metadata");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| resolution_error(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(resolution_error(format!("API returned status {status}")));
        }

        let body = response
            .bytes()
            .map_err(|e| resolution_error(format!("failed to read response: {e}")))?;
        let info: ReleaseInfo = serde_json::from_slice(&body)
            .map_err(|e| resolution_error(format!("malformed response: {e}")))?;

        debug!(
            name = ?info.name,
            product_version = ?info.product_version,
            timestamp = ?info.timestamp,
            "Release metadata received"
        );

        info.into_descriptor().map_err(resolution_error)
    }
}
