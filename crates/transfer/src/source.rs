use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::TransferError;

/// Where the upload payload comes from.
pub enum PayloadSource<'a> {
    /// A file opened when the upload starts and closed when it ends.
    File(PathBuf),
    /// A caller-supplied stream of `size` bytes.
    ///
    /// The caller keeps ownership of what the stream wraps; pass `&mut r`
    /// to get `r` back untouched after the upload.
    Reader {
        reader: Box<dyn Read + Send + 'a>,
        size: u64,
    },
}

impl<'a> PayloadSource<'a> {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn reader<R: Read + Send + 'a>(reader: R, size: u64) -> Self {
        Self::Reader {
            reader: Box::new(reader),
            size,
        }
    }

    /// Path of a file-backed source.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Reader { .. } => None,
        }
    }

    /// Resolves the source into a sequential reader and its total size.
    ///
    /// File sources are stat'ed and opened here; the handle lives exactly
    /// as long as the returned [`ChunkReader`].
    pub fn open(&mut self) -> Result<ChunkReader<'_>, TransferError> {
        match self {
            Self::File(path) => {
                let init_err = |source: io::Error| TransferError::Init {
                    path: path.display().to_string(),
                    source,
                };

                let meta = std::fs::metadata(&*path).map_err(init_err)?;
                if meta.is_dir() {
                    return Err(init_err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "is a directory",
                    )));
                }
                let file = File::open(&*path).map_err(init_err)?;

                Ok(ChunkReader {
                    inner: Box::new(file),
                    size: meta.len(),
                    offset: 0,
                    path: Some(path.clone()),
                })
            }
            Self::Reader { reader, size } => Ok(ChunkReader {
                inner: Box::new(&mut **reader),
                size: *size,
                offset: 0,
                path: None,
            }),
        }
    }
}

/// Sequential reader handing out exactly-sized chunks.
pub struct ChunkReader<'s> {
    inner: Box<dyn Read + 's>,
    size: u64,
    offset: u64,
    path: Option<PathBuf>,
}

impl ChunkReader<'_> {
    /// Reads exactly `n` bytes.
    ///
    /// Fails with [`TransferError::ShortRead`] if the stream ends first.
    pub fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, TransferError> {
        let mut buf = Vec::with_capacity(n);
        let read = (&mut self.inner).take(n as u64).read_to_end(&mut buf)?;
        if read < n {
            return Err(TransferError::ShortRead {
                expected: n,
                actual: read,
            });
        }
        self.offset += read as u64;
        Ok(buf)
    }

    /// Declared or stat'ed payload size.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Bytes handed out so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Path of the opened file, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
