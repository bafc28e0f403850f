//! Chunked HTTP upload engine.
//!
//! Splits a file or byte stream into fixed-size chunks and sends each one
//! as its own request carrying a `Content-Range` header and a per-upload
//! `Session-ID`. Chunks go out strictly in order, each with a bounded
//! number of attempts; progress is published through a [`StatusHandle`]
//! that can be polled from another thread while the upload runs.

mod logger;
mod progress;
mod range;
mod retry;
mod session;
mod source;
mod status;
mod transport;
mod uploader;

pub use logger::{LogSink, LoggerConfig, UploadLogger};
pub use progress::SpeedCalculator;
pub use range::{
    ContentRange, parse_accepted_range, part_size, reconcile_transferred_size, total_parts,
};
pub use retry::{MAX_ATTEMPTS, retry, send_with_retry};
pub use session::generate_session_id;
pub use source::{ChunkReader, PayloadSource};
pub use status::{StatusHandle, UploadState, UploadStatus};
pub use transport::{
    ChunkRequest, ChunkResponse, ChunkTransport, HttpTransport, SESSION_HEADER, build_headers,
    send_chunk,
};
pub use uploader::Uploader;

pub use reqwest::Method;

/// One mebibyte.
pub const MB: usize = 1024 * 1024;

/// Default chunk size: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = MB;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("cannot open upload source {path}: {source}")]
    Init {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server rejected chunk with status {status}: {body}")]
    ServerRejected { status: u16, body: String },

    #[error("malformed accepted range: {0}")]
    Parse(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("upload already failed to start: {0}")]
    StartFailed(String),
}
