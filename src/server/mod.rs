//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and serves exactly one HTTP/1.1 request on each,
//! then closes it. Every connection runs in its own task; a failure or panic
//! in one of them is logged and never reaches the accept loop.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::http::{Request, Response, ResponseError, Sender, StatusCode};
use crate::router::Router;

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("timed out waiting for the request")]
    ReadTimeout,

    #[error(transparent)]
    Response(#[from] ResponseError),
}

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 1024;

/// Maximum number of headers inspected while framing a request.
const MAX_HEADERS: usize = 64;

/// The HTTP server.
///
/// # Examples
///
/// ```rust,no_run
/// use filedrop::config::Config;
/// use filedrop::server::Server;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default().with_port(4221).with_files_directory("/tmp");
///     let server = Server::bind(config).await?;
///     server.run().await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: Arc<Config>,
    router: Arc<Router>,
}

impl Server {
    /// Binds the server to the address named by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(config: Config) -> Result<Self, ServerError> {
        let addr = config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            config: Arc::new(config),
            router: Arc::new(Router::default()),
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections until the process is terminated.
    ///
    /// Accept errors are logged and skipped.
    pub async fn run(self) -> Result<(), ServerError> {
        info!(
            address = %self.local_addr,
            files_directory = ?self.config.files_directory(),
            "filedrop listening"
        );

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let config = Arc::clone(&self.config);
            let router = Arc::clone(&self.router);

            // The inner task isolates panics; the outer one reports them.
            tokio::spawn(async move {
                let worker = tokio::spawn(handle_connection(stream, peer_addr, config, router));
                match worker.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(peer = %peer_addr, error = %e, "connection closed with error");
                    }
                    Err(e) if e.is_panic() => {
                        error!(peer = %peer_addr, "connection task panicked");
                    }
                    Err(e) => {
                        warn!(peer = %peer_addr, error = %e, "connection task cancelled");
                    }
                }
            });
        }
    }
}

/// Serves one request on `stream` and closes it.
///
/// A response that fails before any byte is written is replaced by a `500`;
/// one that fails after that point leaves the stream truncated.
async fn handle_connection<S>(
    mut stream: S,
    peer_addr: SocketAddr,
    config: Arc<Config>,
    router: Arc<Router>,
) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let raw = read_request(&mut stream, &config).await?;
    if raw.is_empty() {
        debug!(peer = %peer_addr, "connection closed by peer before sending a request");
        return Ok(());
    }
    debug!(peer = %peer_addr, bytes = raw.len(), "request received");

    let mut sender = Sender::new(&mut stream);

    let request = match Request::parse(&raw, Arc::clone(&config)) {
        Ok(request) => request,
        Err(e) => {
            warn!(peer = %peer_addr, error = %e, "bad request, sending 400");
            sender
                .send_error(StatusCode::BadRequest, &format!("Bad Request: {e}"))
                .await?;
            stream.shutdown().await?;
            return Ok(());
        }
    };

    debug!(
        peer = %peer_addr,
        method = %request.method(),
        path = %request.path(),
        "dispatching request"
    );

    let outcome = {
        let mut response = Response::new(&request, &mut sender);
        let outcome = router.dispatch(&request, &mut response).await;
        debug!(peer = %peer_addr, status = %response.status_code(), "request handled");
        outcome
    };

    if let Err(e) = outcome {
        if sender.is_committed() {
            warn!(peer = %peer_addr, error = %e, "response failed after headers were sent, closing");
        } else {
            error!(peer = %peer_addr, error = %e, "response failed, sending 500");
            sender
                .send_error(StatusCode::InternalServerError, "Internal Server Error")
                .await?;
        }
    }

    stream.shutdown().await?;
    Ok(())
}

/// Reads until one request is framed, the peer stops sending, or the
/// configured cap is reached. Bytes beyond the cap are never read, so an
/// over-sized request reaches the parser truncated.
async fn read_request<R>(stream: &mut R, config: &Config) -> Result<BytesMut, ServerError>
where
    R: AsyncRead + Unpin,
{
    let max = config.max_request_bytes();
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE.min(max));

    while buf.len() < max {
        let remaining = max - buf.len();
        let mut window = (&mut buf).limit(remaining);
        let read = stream.read_buf(&mut window);
        let n = match config.read_timeout() {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| ServerError::ReadTimeout)??,
            None => read.await?,
        };

        if n == 0 || is_framed(&buf) {
            break;
        }
    }

    Ok(buf)
}

/// Returns `true` once `buf` holds a complete head plus `Content-Length` body bytes.
///
/// Anything else counts as framed as soon as the head terminator is present:
/// input `httparse` rejects, and input it still calls partial (it skips
/// leading blank lines). [`Request::parse`] then reports the actual problem.
fn is_framed(buf: &[u8]) -> bool {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut raw_req = httparse::Request::new(&mut headers);

    match raw_req.parse(buf) {
        Ok(httparse::Status::Complete(body_offset)) => {
            let content_length = raw_req
                .headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case("content-length"))
                .and_then(|h| std::str::from_utf8(h.value).ok())
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            buf.len() >= body_offset.saturating_add(content_length)
        }
        Ok(httparse::Status::Partial) | Err(_) => buf.windows(4).any(|w| w == b"\r\n\r\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exchange(config: Config, raw: &[u8]) -> Vec<u8> {
        let (mut client, server_side) = tokio::io::duplex(64 * 1024);
        client.write_all(raw).await.unwrap();
        handle_connection(
            server_side,
            SocketAddr::from(([127, 0, 0, 1], 40000)),
            Arc::new(config),
            Arc::new(Router::default()),
        )
        .await
        .unwrap();
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        out
    }

    fn status_lines(wire: &[u8]) -> usize {
        wire.windows(9).filter(|w| *w == b"HTTP/1.1 ").count()
    }

    // A files directory holding `broken`: it stats as an empty regular file
    // and opens fine, but every read fails with EIO.
    #[cfg(target_os = "linux")]
    async fn broken_file_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("filedrop-server-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::symlink("/proc/self/mem", dir.join("broken"))
            .await
            .unwrap();
        dir
    }

    // ── is_framed ─────────────────────────────────────────────────────────────

    #[test]
    fn partial_head_is_not_framed() {
        assert!(!is_framed(b"GET / HTTP/1.1\r\nHost: x"));
    }

    #[test]
    fn head_without_body_is_framed() {
        assert!(is_framed(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n"));
    }

    #[test]
    fn waits_for_content_length_bytes() {
        let head = b"POST /files/a HTTP/1.1\r\nContent-Length: 5\r\n\r\n";
        assert!(!is_framed(&[&head[..], b"123"].concat()));
        assert!(is_framed(&[&head[..], b"12345"].concat()));
    }

    #[test]
    fn unparseable_head_is_framed_at_terminator() {
        assert!(!is_framed(b"GET / HTTP/1.1\r\nbroken header"));
        assert!(is_framed(b"GET / HTTP/1.1\r\nbroken header\r\n\r\n"));
    }

    #[test]
    fn blank_head_is_framed_at_terminator() {
        assert!(!is_framed(b"\r\n"));
        assert!(is_framed(b"\r\n\r\n"));
        assert!(is_framed(b"\r\n\r\njunk"));
    }

    // ── handle_connection ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn blank_head_gets_bad_request() {
        let wire = exchange(Config::default(), b"\r\n\r\n").await;
        assert!(wire.starts_with(b"HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn request_is_answered_and_stream_closed() {
        let wire = exchange(Config::default(), b"GET /echo/duplex HTTP/1.1\r\n\r\n").await;
        assert!(wire.starts_with(b"HTTP/1.1 200 OK\r\n"));
        assert!(wire.ends_with(b"\r\n\r\nduplex"));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn failure_before_commit_becomes_500() {
        let dir = broken_file_dir().await;
        // gzip drains the file before the head is written.
        let wire = exchange(
            Config::default().with_files_directory(&dir),
            b"GET /files/broken HTTP/1.1\r\nAccept-Encoding: gzip\r\n\r\n",
        )
        .await;
        assert!(wire.starts_with(b"HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(wire.ends_with(b"\r\n\r\nInternal Server Error"));
        assert_eq!(status_lines(&wire), 1);
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn failure_after_commit_closes_without_second_status() {
        let dir = broken_file_dir().await;
        // Without gzip the head goes out before the first read fails.
        let wire = exchange(
            Config::default().with_files_directory(&dir),
            b"GET /files/broken HTTP/1.1\r\n\r\n",
        )
        .await;
        assert!(wire.starts_with(b"HTTP/1.1 200 OK\r\n"));
        assert!(wire.ends_with(b"\r\n\r\n"));
        assert_eq!(status_lines(&wire), 1);
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
