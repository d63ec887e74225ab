//! Common test utilities for integration tests.
//!
//! The library uses blocking `reqwest`, which must not run inside an async
//! context. [`TestServer`] therefore owns its own tokio runtime, drives the
//! `wiremock` server with `block_on`, and leaves the blocking calls to the
//! test body.

#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use tokio::runtime::Runtime;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// A `wiremock` server usable from synchronous tests.
pub struct TestServer {
    server: MockServer,
    rt: Runtime,
}

impl TestServer {
    pub fn start() -> Self {
        let rt = Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        Self { server, rt }
    }

    pub fn mount(&self, mock: Mock) {
        self.rt.block_on(mock.mount(&self.server));
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.server.uri(), path)
    }

    /// Requests received so far whose path equals `path`.
    pub fn requests_to(&self, path: &str) -> Vec<Request> {
        self.rt
            .block_on(self.server.received_requests())
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == path)
            .collect()
    }
}

/// Serves a fixed body and honours `Range: bytes=N-` requests.
pub struct RangeResponder {
    pub body: Vec<u8>,
}

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let len = self.body.len();
        match range_start(request) {
            Some(start) if start < len => ResponseTemplate::new(206)
                .insert_header(
                    "content-range",
                    format!("bytes {}-{}/{}", start, len - 1, len),
                )
                .set_body_bytes(self.body[start..].to_vec()),
            Some(_) => ResponseTemplate::new(416)
                .insert_header("content-range", format!("bytes */{}", len)),
            None => ResponseTemplate::new(200).set_body_bytes(self.body.clone()),
        }
    }
}

/// Serves a fixed body and ignores any `Range` header.
pub struct FullResponder {
    pub body: Vec<u8>,
}

impl Respond for FullResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_bytes(self.body.clone())
    }
}

/// Answers range requests with `206` but always from byte 0.
pub struct MisalignedRangeResponder {
    pub body: Vec<u8>,
}

impl Respond for MisalignedRangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let len = self.body.len();
        match range_start(request) {
            Some(_) => ResponseTemplate::new(206)
                .insert_header("content-range", format!("bytes 0-{}/{}", len - 1, len))
                .set_body_bytes(self.body.clone()),
            None => ResponseTemplate::new(200).set_body_bytes(self.body.clone()),
        }
    }
}

/// Start offset of a `Range: bytes=N-` header.
pub fn range_start(request: &Request) -> Option<usize> {
    request
        .headers
        .get("range")?
        .to_str()
        .ok()?
        .strip_prefix("bytes=")?
        .trim_end_matches('-')
        .parse()
        .ok()
}

/// Deterministic, non-repeating-looking payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 251) % 256) as u8).collect()
}

pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Build a release archive with every file under the `Windsurf/` wrapper.
pub fn release_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    let mut wrapper = tar::Header::new_gnu();
    wrapper.set_entry_type(tar::EntryType::Directory);
    wrapper.set_mode(0o755);
    wrapper.set_size(0);
    builder
        .append_data(&mut wrapper, "Windsurf/", std::io::empty())
        .unwrap();

    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o755);
        builder
            .append_data(&mut header, format!("Windsurf/{name}"), *data)
            .unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}

/// JSON body of the latest-release endpoint.
pub fn release_json(url: &str, version: &str, sha256: &str) -> serde_json::Value {
    serde_json::json!({
        "url": url,
        "name": version,
        "version": "0123456789abcdef",
        "productVersion": "1.94.0",
        "hash": "0123456789abcdef",
        "timestamp": 1_735_000_000_i64,
        "sha256Hash": sha256,
        "supportsFastUpdate": true,
        "windsurfVersion": version,
    })
}
