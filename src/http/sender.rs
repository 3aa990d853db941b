//! Wire serialization of a finished response.
//!
//! The status line and header block go out in a single buffered write, then
//! the body follows: text and compressed bodies in one write, file bodies
//! through a bounded copy loop so large files never sit in memory.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::body::{Body, FileBody};
use super::response::ResponseError;
use super::{Headers, Request, StatusCode};

/// Size of the intermediate buffer used to stream file bodies.
pub const COPY_BUFFER_SIZE: usize = 1024;

/// Writes responses onto an output stream.
///
/// One `Sender` serves one connection. It remembers whether any byte has
/// been handed to the stream, so the caller can tell whether a `500` can
/// still be sent after a failure.
#[derive(Debug)]
pub struct Sender<W> {
    writer: W,
    committed: bool,
    chunk_size: usize,
}

impl<W> Sender<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            committed: false,
            chunk_size: COPY_BUFFER_SIZE,
        }
    }

    /// Overrides the file copy buffer size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Returns `true` once any part of a response has been written.
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Serializes and writes a complete response.
    ///
    /// Negotiates gzip against `request`, then rewrites `Content-Type`,
    /// `Content-Length` and `Content-Encoding` in `headers` to describe the
    /// body that is actually transmitted. A missing body is sent as empty text.
    ///
    /// # Errors
    ///
    /// - [`ResponseError::ResourceUnavailable`]: a file body could not be
    ///   stat'ed or read, or the stream rejected a write.
    /// - [`ResponseError::CompressionFailure`]: the gzip encoder failed.
    pub async fn send_all(
        &mut self,
        request: &Request,
        status: StatusCode,
        headers: &mut Headers,
        body: Option<Body>,
    ) -> Result<(), ResponseError> {
        let mut body = body.unwrap_or_else(|| Body::text(""));

        if request.accepts_encoding("gzip") {
            body = body.compress().await?;
            headers.set("Content-Encoding", "gzip");
        }

        debug!(path = %request.path(), "sending response");
        self.write_response(status, headers, body).await
    }

    /// Writes a plain-text response without consulting any request.
    ///
    /// Used when no [`Request`] is available (unparseable input) or the
    /// regular response failed before anything was written.
    pub async fn send_error(
        &mut self,
        status: StatusCode,
        message: &str,
    ) -> Result<(), ResponseError> {
        let mut headers = Headers::new();
        self.write_response(status, &mut headers, Body::text(message))
            .await
    }

    async fn write_response(
        &mut self,
        status: StatusCode,
        headers: &mut Headers,
        body: Body,
    ) -> Result<(), ResponseError> {
        headers.set("Content-Type", body.content_type());
        match body.content_length().await? {
            Some(len) => headers.set("Content-Length", len.to_string()),
            None => {
                headers.remove("content-length");
            }
        }

        let headers_text = headers.to_string();
        let mut head = BytesMut::with_capacity(32 + headers_text.len());
        head.put(format!("HTTP/1.1 {status}\r\n").as_bytes());
        head.put(headers_text.as_bytes());
        head.put(&b"\r\n"[..]);

        debug!(%status, "writing response");
        self.write(&head, "write response head").await?;

        match body {
            Body::Text(text) => self.write(text.as_bytes(), "write body").await?,
            Body::Compressed(compressed) => self.write(compressed.data(), "write body").await?,
            Body::File(mut file) => self.copy_file(&mut file).await?,
        }

        self.writer
            .flush()
            .await
            .map_err(ResponseError::unavailable("flush response"))
    }

    async fn copy_file(&mut self, file: &mut FileBody) -> Result<(), ResponseError> {
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = file.read_chunk(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            self.write(&buf[..n], "write file body").await?;
        }
    }

    // write_all retries short writes, so a region is either fully written or the
    // response is aborted.
    async fn write(&mut self, bytes: &[u8], context: &'static str) -> Result<(), ResponseError> {
        self.committed = true;
        self.writer
            .write_all(bytes)
            .await
            .map_err(ResponseError::unavailable(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use crate::config::Config;

    fn request(raw: &str) -> Request {
        Request::parse(raw.as_bytes(), Arc::new(Config::default())).unwrap()
    }

    async fn send(request: &Request, status: StatusCode, body: Option<Body>) -> Vec<u8> {
        let mut sender = Sender::new(Vec::new());
        let mut headers = Headers::new();
        sender
            .send_all(request, status, &mut headers, body)
            .await
            .unwrap();
        sender.into_inner()
    }

    /// Accepts at most three bytes per write call.
    struct Trickle(Vec<u8>);

    impl AsyncWrite for Trickle {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let n = buf.len().min(3);
            self.0.extend_from_slice(&buf[..n]);
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    struct Broken;

    impl AsyncWrite for Broken {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn text_response_wire_format() {
        let req = request("GET /echo/hello HTTP/1.1\r\n\r\n");
        let wire = send(&req, StatusCode::Ok, Some(Body::text("hello"))).await;
        assert_eq!(
            String::from_utf8(wire).unwrap(),
            "HTTP/1.1 200 OK\r\ncontent-type: plain/text\r\ncontent-length: 5\r\n\r\nhello"
        );
    }

    #[tokio::test]
    async fn missing_body_is_empty_text() {
        let req = request("GET / HTTP/1.1\r\n\r\n");
        let wire = send(&req, StatusCode::NotFound, None).await;
        assert_eq!(
            String::from_utf8(wire).unwrap(),
            "HTTP/1.1 404 Not Found\r\ncontent-type: plain/text\r\ncontent-length: 0\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn gzip_is_negotiated() {
        let req = request("GET /echo/foo HTTP/1.1\r\nAccept-Encoding: deflate, gzip\r\n\r\n");
        let mut sender = Sender::new(Vec::new());
        let mut headers = Headers::new();
        sender
            .send_all(&req, StatusCode::Ok, &mut headers, Some(Body::text("foo")))
            .await
            .unwrap();

        assert_eq!(headers.get("content-encoding"), "gzip");
        assert_eq!(headers.get("content-type"), "plain/text");

        let wire = sender.into_inner();
        let split = wire.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
        let body = &wire[split..];
        assert_eq!(headers.get("content-length"), body.len().to_string());

        let mut decoded = String::new();
        io::Read::read_to_string(&mut flate2::read::GzDecoder::new(body), &mut decoded).unwrap();
        assert_eq!(decoded, "foo");
    }

    #[tokio::test]
    async fn stale_content_length_is_replaced() {
        let req = request("GET / HTTP/1.1\r\n\r\n");
        let mut sender = Sender::new(Vec::new());
        let mut headers = Headers::new();
        headers.set("Content-Length", "999");
        sender
            .send_all(&req, StatusCode::Ok, &mut headers, Some(Body::text("abc")))
            .await
            .unwrap();
        assert_eq!(headers.get("content-length"), "3");
    }

    #[tokio::test]
    async fn file_body_is_streamed_in_chunks() {
        let contents: Vec<u8> = (0..5000u32).map(|i| (i % 256) as u8).collect();
        let path = std::env::temp_dir().join(format!("filedrop-send-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, &contents).await.unwrap();

        let req = request("GET /files/x HTTP/1.1\r\n\r\n");
        let mut sender = Sender::new(Trickle(Vec::new())).with_chunk_size(7);
        let mut headers = Headers::new();
        let body = Body::file(&path).await.unwrap();
        sender
            .send_all(&req, StatusCode::Ok, &mut headers, Some(body))
            .await
            .unwrap();

        let wire = sender.into_inner().0;
        let head = "HTTP/1.1 200 OK\r\ncontent-type: application/octet-stream\r\ncontent-length: 5000\r\n\r\n";
        assert_eq!(&wire[..head.len()], head.as_bytes());
        assert_eq!(&wire[head.len()..], &contents[..]);
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn write_failure_is_reported_and_committed() {
        let req = request("GET / HTTP/1.1\r\n\r\n");
        let mut sender = Sender::new(Broken);
        let mut headers = Headers::new();
        let err = sender
            .send_all(&req, StatusCode::Ok, &mut headers, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ResponseError::ResourceUnavailable { .. }));
        assert!(sender.is_committed());
    }

    #[tokio::test]
    async fn error_response_ignores_negotiation() {
        let mut sender = Sender::new(Vec::new());
        sender
            .send_error(StatusCode::BadRequest, "Bad Request: nope")
            .await
            .unwrap();
        assert!(sender.is_committed());
        assert_eq!(
            String::from_utf8(sender.into_inner()).unwrap(),
            "HTTP/1.1 400 Bad Request\r\ncontent-type: plain/text\r\ncontent-length: 17\r\n\r\nBad Request: nope"
        );
    }

    #[tokio::test]
    async fn identical_requests_give_identical_bytes() {
        let req = request("GET /echo/same HTTP/1.1\r\nAccept-Encoding: gzip\r\n\r\n");
        let first = send(&req, StatusCode::Ok, Some(Body::text("same"))).await;
        let second = send(&req, StatusCode::Ok, Some(Body::text("same"))).await;
        assert_eq!(first, second);
    }
}
