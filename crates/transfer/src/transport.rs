//! Single-chunk HTTP transport.
//!
//! `ChunkTransport` is the seam between the upload engine and the network.
//! [`HttpTransport`] is the production implementation on top of a shared
//! blocking `reqwest` client; tests substitute recording mocks.

use std::io;

use reqwest::blocking::Client;
use reqwest::header::{
    CONTENT_DISPOSITION, CONTENT_RANGE, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue,
};
use reqwest::{Method, Url};
use tracing::debug;

use crate::TransferError;

/// Header carrying the per-upload session ID.
pub const SESSION_HEADER: &str = "session-id";

/// Everything needed to send one chunk.
#[derive(Debug, Clone, Copy)]
pub struct ChunkRequest<'r> {
    pub method: &'r Method,
    pub url: &'r str,
    pub session_id: &'r str,
    pub body: &'r [u8],
    pub content_range: &'r str,
    pub file_name: &'r str,
    pub headers: &'r [(String, String)],
}

/// Status and fully drained body of a chunk response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkResponse {
    pub status: u16,
    pub body: String,
}

impl ChunkResponse {
    /// `true` for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

/// Sends one chunk and returns the server's answer.
///
/// Network-level failures are `Err`; any received response, whatever its
/// status, is `Ok`.
pub trait ChunkTransport: Send + Sync {
    fn send(&self, request: &ChunkRequest<'_>) -> Result<ChunkResponse, TransferError>;
}

/// [`ChunkTransport`] over a blocking `reqwest` client.
///
/// The client is a connection pool and may be shared by any number of
/// uploaders; cloning it is cheap.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl ChunkTransport for HttpTransport {
    fn send(&self, request: &ChunkRequest<'_>) -> Result<ChunkResponse, TransferError> {
        send_chunk(&self.client, request)
    }
}

/// Issues one chunk request through `client` and drains the response body.
pub fn send_chunk(
    client: &Client,
    request: &ChunkRequest<'_>,
) -> Result<ChunkResponse, TransferError> {
    let headers = build_headers(request)?;

    let response = client
        .request(request.method.clone(), request.url)
        .headers(headers)
        .body(request.body.to_vec())
        .send()?;

    let status = response.status().as_u16();
    debug!(content_range = request.content_range, status, "chunk response");

    let body = response
        .bytes()
        .map_err(|e| TransferError::Io(io::Error::other(e)))?;
    let body = String::from_utf8_lossy(&body).into_owned();
    debug!(body = %body, "chunk response body");

    Ok(ChunkResponse { status, body })
}

/// Builds the header set for one chunk.
///
/// Caller-supplied headers are applied last and replace standard headers
/// of the same name.
pub fn build_headers(request: &ChunkRequest<'_>) -> Result<HeaderMap, TransferError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(
        CONTENT_DISPOSITION,
        header_value(&format!("attachment; filename=\"{}\"", request.file_name))?,
    );
    headers.insert(CONTENT_RANGE, header_value(request.content_range)?);
    headers.insert(
        HeaderName::from_static(SESSION_HEADER),
        header_value(request.session_id)?,
    );

    for (name, value) in request.headers {
        headers.insert(header_name(name)?, header_value(value)?);
    }

    Ok(headers)
}

/// Checks that `url` and every caller header can form a request.
pub(crate) fn validate_target(url: &str, headers: &[(String, String)]) -> Result<(), TransferError> {
    Url::parse(url).map_err(|e| TransferError::InvalidUrl(format!("{url}: {e}")))?;
    for (name, value) in headers {
        header_name(name)?;
        header_value(value)?;
    }
    Ok(())
}

fn header_name(name: &str) -> Result<HeaderName, TransferError> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| TransferError::InvalidHeader(format!("name {name:?}")))
}

fn header_value(value: &str) -> Result<HeaderValue, TransferError> {
    HeaderValue::from_str(value)
        .map_err(|_| TransferError::InvalidHeader(format!("value {value:?}")))
}
