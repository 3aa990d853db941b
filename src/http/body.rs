//! Response payloads.
//!
//! [`Body`] is a closed set of representations. The [`Sender`](super::Sender)
//! matches on it to pick between one buffered write and a bounded copy loop,
//! and content negotiation wraps it in [`Body::Compressed`].

use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use super::response::ResponseError;

/// Content type reported by text bodies.
///
/// Not the registered `text/plain` token; kept byte-for-byte for wire
/// compatibility with existing clients of this server.
pub const TEXT_CONTENT_TYPE: &str = "plain/text";

/// Content type reported by file bodies, regardless of extension.
pub const FILE_CONTENT_TYPE: &str = "application/octet-stream";

/// Read size used while draining a file into the gzip encoder.
const COMPRESS_CHUNK_SIZE: usize = 8 * 1024;

/// A response payload.
#[derive(Debug)]
pub enum Body {
    /// An in-memory string, written in one go.
    Text(String),
    /// An open file, streamed through a bounded buffer.
    File(FileBody),
    /// A fully buffered gzip rendering of another body.
    Compressed(CompressedBody),
}

impl Body {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Opens `path` as a file body.
    ///
    /// # Errors
    ///
    /// [`ResponseError::ResourceUnavailable`] if the file cannot be opened.
    pub async fn file(path: impl AsRef<Path>) -> Result<Self, ResponseError> {
        FileBody::open(path).await.map(Self::File)
    }

    /// Returns the `Content-Type` this body is sent with.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Text(_) => TEXT_CONTENT_TYPE,
            Self::File(_) => FILE_CONTENT_TYPE,
            Self::Compressed(compressed) => compressed.content_type(),
        }
    }

    /// Returns the byte length of the body, or `None` if it cannot be known
    /// before the body is streamed.
    ///
    /// File bodies stat their handle on every call.
    pub async fn content_length(&self) -> Result<Option<u64>, ResponseError> {
        match self {
            Self::Text(text) => Ok(Some(text.len() as u64)),
            Self::File(file) => file.len().await.map(Some),
            Self::Compressed(compressed) => Ok(Some(compressed.len() as u64)),
        }
    }

    /// Replaces this body with its gzip rendering.
    ///
    /// The origin is drained completely before this returns. A body that is
    /// already compressed is returned as is.
    pub async fn compress(self) -> Result<Self, ResponseError> {
        match self {
            Self::Compressed(_) => Ok(self),
            origin => CompressedBody::from_origin(origin).await.map(Self::Compressed),
        }
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

/// An open file handle served as `application/octet-stream`.
///
/// Reads are sequential; the handle is closed when the body is dropped.
#[derive(Debug)]
pub struct FileBody {
    file: File,
    path: PathBuf,
}

impl FileBody {
    /// Opens `path` for reading.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ResponseError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .await
            .map_err(ResponseError::unavailable(format!("open {}", path.display())))?;
        Ok(Self { file, path })
    }

    /// Returns the file size as reported by `fstat` right now.
    pub async fn len(&self) -> Result<u64, ResponseError> {
        self.file
            .metadata()
            .await
            .map(|meta| meta.len())
            .map_err(ResponseError::unavailable(format!("stat {}", self.path.display())))
    }

    /// Reads the next chunk into `buf`. Returns `0` once the file is exhausted.
    pub async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, ResponseError> {
        self.file
            .read(buf)
            .await
            .map_err(ResponseError::unavailable(format!("read {}", self.path.display())))
    }
}

/// A gzip-compressed copy of another body, held entirely in memory.
#[derive(Debug)]
pub struct CompressedBody {
    content_type: &'static str,
    data: Bytes,
}

impl CompressedBody {
    /// Drains `origin` through a gzip encoder and keeps the finished stream.
    ///
    /// The origin's content type is carried over; only the representation changes.
    pub async fn from_origin(origin: Body) -> Result<Self, ResponseError> {
        let content_type = origin.content_type();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());

        match origin {
            Body::Text(text) => encoder
                .write_all(text.as_bytes())
                .map_err(ResponseError::CompressionFailure)?,
            Body::File(mut file) => {
                let mut chunk = vec![0u8; COMPRESS_CHUNK_SIZE];
                loop {
                    let n = file.read_chunk(&mut chunk).await?;
                    if n == 0 {
                        break;
                    }
                    encoder
                        .write_all(&chunk[..n])
                        .map_err(ResponseError::CompressionFailure)?;
                }
            }
            Body::Compressed(compressed) => return Ok(compressed),
        }

        let data = encoder.finish().map_err(ResponseError::CompressionFailure)?;
        tracing::debug!(content_type, compressed_len = data.len(), "body compressed");

        Ok(Self {
            content_type,
            data: Bytes::from(data),
        })
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// Size of the compressed stream in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The complete gzip stream.
    pub fn data(&self) -> &Bytes {
        &self.data
    }
}
