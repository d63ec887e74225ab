//! HTTP-based file downloader with resume support.
//!
//! This module provides the core HTTP download functionality:
//! - Resumable downloads via HTTP Range requests
//! - A single fallback to a full download when the server ignores the range
//! - Progress callbacks for UI updates

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use super::{partial_path, PackageDownloader, ProgressCallback};
use crate::error::{UpdateError, UpdateResult};

/// Default connect timeout in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Buffer size for reading/writing during downloads (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// HTTP-based archive downloader.
///
/// Implements the `PackageDownloader` trait with support for:
/// - Range requests for resuming `.partial` downloads
/// - Falling back to a fresh download when ranges are unsupported
/// - Progress reporting
#[derive(Debug)]
pub struct HttpDownloader {
    client: Client,
    pub(crate) timeout: Option<Duration>,
}

impl HttpDownloader {
    /// Create a new HTTP downloader with default settings.
    ///
    /// Only the connection phase is bounded; large archives may take as long
    /// as they need to stream.
    pub fn new() -> UpdateResult<Self> {
        Self::with_timeouts(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS), None)
    }

    /// Create a new HTTP downloader that bounds each whole request.
    pub fn with_timeout(connect_timeout: Duration, timeout: Duration) -> UpdateResult<Self> {
        Self::with_timeouts(connect_timeout, Some(timeout))
    }

    /// Create a new HTTP downloader with explicit timeouts.
    ///
    /// `timeout` of `None` leaves the transfer itself unbounded.
    pub fn with_timeouts(
        connect_timeout: Duration,
        timeout: Option<Duration>,
    ) -> UpdateResult<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|e| {
                UpdateError::InvalidConfig(format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self { client, timeout })
    }

    /// Download a file with resumption support.
    ///
    /// Bytes are written to `<dest>.partial`. If that file already exists its
    /// length is used as the resume offset. On success the partial file is
    /// renamed onto `dest`; on failure it is left in place for the next run.
    fn download_with_resume(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressCallback>,
    ) -> UpdateResult<u64> {
        let partial = partial_path(dest);
        let mut start_offset = existing_size(&partial);

        if start_offset > 0 {
            info!(offset = start_offset, "Resuming download from offset");
        }

        let mut response = self.send(url, start_offset)?;

        // Server ignored or mangled the range: start over exactly once
        if start_offset > 0 && !resumed_at(&response, start_offset) {
            warn!(
                status = %response.status(),
                "Server does not support range requests, restarting download"
            );
            drop(response);
            remove_partial(&partial)?;
            start_offset = 0;
            response = self.send(url, 0)?;
        }

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
            return Err(UpdateError::Transfer {
                url: url.to_string(),
                reason: format!("GET request failed with status {}", status),
            });
        }

        let file = open_partial(&partial, start_offset)?;
        let total_size = response
            .content_length()
            .map(|len| len + start_offset)
            .unwrap_or(0);

        let downloaded = self.stream_download(
            url,
            response,
            file,
            &partial,
            start_offset,
            total_size,
            progress,
        )?;

        fs::rename(&partial, dest).map_err(|e| UpdateError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;

        info!(bytes = downloaded, path = %dest.display(), "Download complete");
        Ok(downloaded)
    }

    /// Issue the GET request, with a `Range` header when resuming.
    fn send(&self, url: &str, start_byte: u64) -> UpdateResult<Response> {
        let mut request = self.client.get(url);
        if start_byte > 0 {
            request = request.header(RANGE, format!("bytes={}-", start_byte));
        }

        request.send().map_err(|e| self.transfer_error(url, &e))
    }

    fn transfer_error(&self, url: &str, error: &reqwest::Error) -> UpdateError {
        let reason = match self.timeout {
            Some(timeout) if error.is_timeout() => {
                format!("request timed out after {}s", timeout.as_secs())
            }
            _ => error.to_string(),
        };
        UpdateError::Transfer {
            url: url.to_string(),
            reason,
        }
    }

    /// Stream the response body to the partial file.
    #[allow(clippy::too_many_arguments)]
    fn stream_download(
        &self,
        url: &str,
        mut response: Response,
        file: File,
        partial: &Path,
        start_byte: u64,
        total_size: u64,
        progress: Option<ProgressCallback>,
    ) -> UpdateResult<u64> {
        let write_error = |e: io::Error| UpdateError::WriteFailed {
            path: partial.to_path_buf(),
            source: e,
        };

        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut downloaded = start_byte;

        if let Some(ref cb) = progress {
            cb(downloaded, total_size);
        }

        loop {
            let bytes_read =
                response
                    .read(&mut buffer)
                    .map_err(|e| UpdateError::Transfer {
                        url: url.to_string(),
                        reason: format!("read error: {}", e),
                    })?;

            if bytes_read == 0 {
                break;
            }

            writer.write_all(&buffer[..bytes_read]).map_err(write_error)?;

            downloaded += bytes_read as u64;

            if let Some(ref cb) = progress {
                cb(downloaded, total_size);
            }
        }

        writer.flush().map_err(write_error)?;
        writer.get_ref().sync_all().map_err(write_error)?;

        debug!(bytes = downloaded, "Response body streamed");
        Ok(downloaded)
    }
}

impl PackageDownloader for HttpDownloader {
    fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressCallback>,
    ) -> UpdateResult<u64> {
        self.download_with_resume(url, dest, progress)
    }
}

/// Size of an existing partial file, or 0.
fn existing_size(partial: &Path) -> u64 {
    fs::metadata(partial).map(|m| m.len()).unwrap_or(0)
}

/// Whether a response honours a range request starting at `offset`.
///
/// Requires `206 Partial Content`; when the server names the range it must
/// start where the partial file ends.
fn resumed_at(response: &Response, offset: u64) -> bool {
    if response.status() != StatusCode::PARTIAL_CONTENT {
        return false;
    }

    match response
        .headers()
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
    {
        Some(range) => content_range_start(range) == Some(offset),
        None => true,
    }
}

/// Parse the first byte position of a `Content-Range: bytes a-b/c` header.
fn content_range_start(value: &str) -> Option<u64> {
    value
        .trim()
        .strip_prefix("bytes")?
        .trim_start()
        .split('-')
        .next()?
        .trim()
        .parse()
        .ok()
}

/// Open the partial file for appending or create it fresh.
fn open_partial(partial: &Path, start_offset: u64) -> UpdateResult<File> {
    let result = if start_offset > 0 {
        OpenOptions::new().append(true).open(partial)
    } else {
        File::create(partial)
    };

    result.map_err(|e| UpdateError::WriteFailed {
        path: partial.to_path_buf(),
        source: e,
    })
}

fn remove_partial(partial: &Path) -> UpdateResult<()> {
    match fs::remove_file(partial) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(UpdateError::RemoveFailed {
            path: partial.to_path_buf(),
            source: e,
        }),
    }
}
