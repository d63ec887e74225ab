//! SHA-256 checksum calculation for archive verification.
//!
//! Archives are hashed in fixed-size chunks so that multi-hundred-megabyte
//! downloads never have to be held in memory.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{UpdateError, UpdateResult};

/// Chunk size used while hashing (1 MiB).
const CHUNK_SIZE: usize = 1024 * 1024;

/// Calculate the SHA-256 checksum of a file.
///
/// # Returns
///
/// The lowercase hexadecimal SHA-256 hash of the file contents.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn calculate_file_checksum(path: &Path) -> UpdateResult<String> {
    let mut file = File::open(path).map_err(|e| UpdateError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| UpdateError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Verify that a file matches an expected SHA-256 checksum.
///
/// The comparison ignores case so digests published in uppercase hex still
/// match.
pub fn verify_checksum(path: &Path, expected: &str) -> UpdateResult<()> {
    let actual = calculate_file_checksum(path)?;
    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(UpdateError::ChecksumMismatch {
            filename: path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}
