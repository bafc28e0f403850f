//! Upload engine.
//!
//! Drives one payload through `Pending -> Running -> {Succeeded, Failed}`,
//! sending chunks strictly in ascending order, one at a time.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Method;
use tracing::info_span;

use crate::logger::UploadLogger;
use crate::range::{self, ContentRange};
use crate::retry::{self, MAX_ATTEMPTS};
use crate::session::generate_session_id;
use crate::source::{ChunkReader, PayloadSource};
use crate::status::{StatusHandle, UploadState, UploadStatus};
use crate::transport::{self, ChunkRequest, ChunkTransport};
use crate::{DEFAULT_CHUNK_SIZE, TransferError};

/// Uploads one file or stream as a sequence of `Content-Range` requests.
///
/// ```no_run
/// use std::sync::Arc;
/// use bigupload_transfer::{HttpTransport, Method, Uploader, MB};
///
/// let transport = Arc::new(HttpTransport::new(reqwest::blocking::Client::new()));
/// let mut uploader = Uploader::from_file(Method::PUT, "http://host/upload", "big.iso", transport)
///     .with_chunk_size(8 * MB)
///     .with_header("Authorization", "Bearer token");
/// uploader.init()?;
/// assert!(!uploader.status().failed());
/// # Ok::<(), bigupload_transfer::TransferError>(())
/// ```
pub struct Uploader<'a> {
    source: PayloadSource<'a>,
    engine: Engine,
}

struct Engine {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    chunk_size: usize,
    file_name: String,
    transport: Arc<dyn ChunkTransport>,
    logger: UploadLogger,
    session_id: String,
    status: StatusHandle,
    /// Set when `init` failed before the first chunk.
    start_error: Option<String>,
}

/// One chunk in flight. Built per index and dropped once its request completes.
struct Chunk {
    index: u64,
    range: ContentRange,
    data: Vec<u8>,
}

impl<'a> Uploader<'a> {
    /// Creates an uploader for `source`.
    pub fn new(
        method: Method,
        url: impl Into<String>,
        source: PayloadSource<'a>,
        transport: Arc<dyn ChunkTransport>,
    ) -> Self {
        let file_name = source
            .path()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            source,
            engine: Engine {
                method,
                url: url.into(),
                headers: Vec::new(),
                chunk_size: DEFAULT_CHUNK_SIZE,
                file_name,
                transport,
                logger: UploadLogger::default(),
                session_id: generate_session_id(),
                status: StatusHandle::new(),
                start_error: None,
            },
        }
    }

    /// Uploads the file at `path`; its size is taken from the file system.
    pub fn from_file(
        method: Method,
        url: impl Into<String>,
        path: impl Into<PathBuf>,
        transport: Arc<dyn ChunkTransport>,
    ) -> Self {
        Self::new(method, url, PayloadSource::file(path), transport)
    }

    /// Uploads `size` bytes read from `reader`.
    pub fn from_reader<R: Read + Send + 'a>(
        method: Method,
        url: impl Into<String>,
        reader: R,
        size: u64,
        transport: Arc<dyn ChunkTransport>,
    ) -> Self {
        Self::new(method, url, PayloadSource::reader(reader, size), transport)
    }

    /// Adds caller headers sent with every chunk.
    pub fn with_headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.engine
            .headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_headers([(name.into(), value.into())])
    }

    /// Sets the chunk size in bytes. `0` selects [`DEFAULT_CHUNK_SIZE`].
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.engine.chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        self
    }

    /// Overrides the name sent in `Content-Disposition`.
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.engine.file_name = file_name.into();
        self
    }

    pub fn with_logger(mut self, logger: UploadLogger) -> Self {
        self.engine.logger = logger;
        self
    }

    /// Correlation token sent with every chunk of this upload.
    pub fn session_id(&self) -> &str {
        &self.engine.session_id
    }

    pub fn chunk_size(&self) -> usize {
        self.engine.chunk_size
    }

    /// Snapshot of the current status.
    pub fn status(&self) -> UploadStatus {
        self.engine.status.snapshot()
    }

    /// Handle for reading the status from another thread while [`init`](Self::init) runs.
    pub fn status_handle(&self) -> StatusHandle {
        self.engine.status.clone()
    }

    /// Runs the whole upload to completion.
    ///
    /// Returns an error only if the upload could not start (unreadable
    /// source, unusable URL or header). Failures after the first chunk is
    /// attempted end in a `Failed` status instead; check [`status`](Self::status).
    /// A file-backed source is closed before this returns, on every path.
    ///
    /// The upload runs at most once. Calling `init` again after it failed to
    /// start returns [`TransferError::StartFailed`]; after any other terminal
    /// state it returns `Ok(())` without sending anything.
    pub fn init(&mut self) -> Result<(), TransferError> {
        let Self { source, engine } = self;
        let span = info_span!("upload", session = %engine.session_id);
        let _enter = span.enter();
        engine.run(source)
    }
}

impl Engine {
    fn run(&mut self, source: &mut PayloadSource<'_>) -> Result<(), TransferError> {
        if let Some(reason) = &self.start_error {
            return Err(TransferError::StartFailed(reason.clone()));
        }
        if self.status.is_done() {
            self.logger
                .debug(format_args!("upload {} already finished", self.session_id));
            return Ok(());
        }

        if let Err(e) = transport::validate_target(&self.url, &self.headers) {
            self.abort(&e);
            return Err(e);
        }

        let mut reader = match source.open() {
            Ok(reader) => reader,
            Err(e) => {
                self.abort(&e);
                return Err(e);
            }
        };

        let total_size = reader.size();
        let total_parts = range::total_parts(total_size, self.chunk_size);
        self.status.begin(total_size, total_parts);
        self.logger.debug(format_args!(
            "upload {}: {total_size} bytes in {total_parts} parts of {} bytes",
            self.session_id, self.chunk_size
        ));

        let mut index = 0;
        while !self.status.is_done() {
            self.upload_chunk(index, total_parts, &mut reader);
            index += 1;
        }

        self.close(reader);
        self.logger.info("Done");
        Ok(())
    }

    fn upload_chunk(&mut self, index: u64, total_parts: u64, reader: &mut ChunkReader<'_>) {
        if index == total_parts {
            self.logger
                .info(format_args!("Upload {}: done", self.session_id));
            self.status.finish(false);
            return;
        }

        if self.status.state() == UploadState::Failed {
            self.logger.error("transfer already failed");
            return;
        }

        if let Err(e) = self.transfer_part(index, reader) {
            self.logger.error(format_args!("part {index}: {e}"));
            self.logger.error("Upload process done by exception");
            self.status.finish(true);
        }

        let s = self.status.snapshot();
        self.logger.debug(format_args!(
            "Part: {} of: {}",
            s.transferred_parts, s.total_parts
        ));
    }

    /// Reads, sends and accounts for one part.
    fn transfer_part(
        &mut self,
        index: u64,
        reader: &mut ChunkReader<'_>,
    ) -> Result<(), TransferError> {
        let status = self.status.snapshot();
        let part_size = range::part_size(index, self.chunk_size, status.total_size);
        if part_size == 0 {
            // Only reachable on a part-count mismatch; nothing to send.
            return Ok(());
        }

        let chunk = self.read_chunk(index, part_size, status.total_size, reader)?;
        let content_range = chunk.range.to_string();
        let request = ChunkRequest {
            method: &self.method,
            url: &self.url,
            session_id: &self.session_id,
            body: &chunk.data,
            content_range: &content_range,
            file_name: &self.file_name,
            headers: &self.headers,
        };

        let response = retry::send_with_retry(
            self.transport.as_ref(),
            &request,
            MAX_ATTEMPTS,
            &mut self.logger,
        )?;

        let delta = range::reconcile_transferred_size(&response.body, part_size, &status)?;
        self.status.record_part(chunk.index, delta);
        Ok(())
    }

    fn read_chunk(
        &mut self,
        index: u64,
        part_size: u64,
        total_size: u64,
        reader: &mut ChunkReader<'_>,
    ) -> Result<Chunk, TransferError> {
        // part_size never exceeds chunk_size, which is a usize.
        let data = reader.read_exact(part_size as usize)?;
        self.logger.debug(format_args!(
            "Read {} bytes, {} of {total_size}",
            data.len(),
            reader.offset()
        ));
        Ok(Chunk {
            index,
            range: ContentRange::for_part(index, self.chunk_size, part_size, total_size),
            data,
        })
    }

    fn abort(&mut self, err: &TransferError) {
        self.start_error = Some(err.to_string());
        self.logger.error(err);
        self.logger.error("Upload process done by exception");
        self.status.finish(true);
    }

    fn close(&mut self, reader: ChunkReader<'_>) {
        self.logger
            .debug(format_args!("Close uploader {}", self.session_id));
        if let Some(path) = reader.path() {
            self.logger
                .debug(format_args!("Close file {}", path.display()));
        }
        drop(reader);
    }
}
