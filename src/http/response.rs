//! HTTP/1.1 response builder.
//!
//! A [`Response`] collects a status, headers and a [`Body`] and hands them to
//! its connection's [`Sender`] exactly once. After [`send`](Response::send)
//! the response is frozen: setters are ignored and a second send fails with
//! [`ResponseError::AlreadySent`].

use std::io;
use std::path::Path;

use thiserror::Error;
use tokio::io::AsyncWrite;
use tracing::warn;

use super::{Body, Headers, Request, Sender, StatusCode};

/// Errors that abort the in-flight response.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// A file could not be opened, stat'ed or read, or the connection refused a write.
    #[error("{context}: {source}")]
    ResourceUnavailable {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("gzip compression failed: {0}")]
    CompressionFailure(#[source] io::Error),

    /// `send` was called on a response that already went out.
    #[error("response was already sent")]
    AlreadySent,
}

impl ResponseError {
    /// Builds a `map_err` adapter tagging an I/O error with what was being attempted.
    pub(crate) fn unavailable(context: impl Into<String>) -> impl FnOnce(io::Error) -> Self {
        let context = context.into();
        move |source| Self::ResourceUnavailable { context, source }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Building,
    Sent,
}

/// A response under construction for one request.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use filedrop::config::Config;
/// use filedrop::http::{Request, Response, Sender};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let request = Request::parse(b"GET /echo/hi HTTP/1.1\r\n\r\n", Arc::new(Config::default()))?;
/// let mut sender = Sender::new(Vec::new());
///
/// Response::new(&request, &mut sender).status_ok().text("hi").await?;
///
/// let wire = String::from_utf8(sender.into_inner())?;
/// assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(wire.ends_with("\r\n\r\nhi"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Response<'a, W> {
    request: &'a Request,
    sender: &'a mut Sender<W>,
    status: StatusCode,
    headers: Headers,
    body: Option<Body>,
    state: State,
}

impl<'a, W> Response<'a, W>
where
    W: AsyncWrite + Unpin,
{
    /// Starts a `200 OK` response with no headers and no body.
    pub fn new(request: &'a Request, sender: &'a mut Sender<W>) -> Self {
        Self {
            request,
            sender,
            status: StatusCode::Ok,
            headers: Headers::new(),
            body: None,
            state: State::Building,
        }
    }

    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        if self.is_building("status") {
            self.status = status;
        }
        self
    }

    pub fn status_ok(&mut self) -> &mut Self {
        self.status(StatusCode::Ok)
    }

    pub fn status_created(&mut self) -> &mut Self {
        self.status(StatusCode::Created)
    }

    pub fn status_bad_request(&mut self) -> &mut Self {
        self.status(StatusCode::BadRequest)
    }

    pub fn status_not_found(&mut self) -> &mut Self {
        self.status(StatusCode::NotFound)
    }

    pub fn status_conflict(&mut self) -> &mut Self {
        self.status(StatusCode::Conflict)
    }

    pub fn status_internal_error(&mut self) -> &mut Self {
        self.status(StatusCode::InternalServerError)
    }

    pub fn status_not_implemented(&mut self) -> &mut Self {
        self.status(StatusCode::NotImplemented)
    }

    /// Sets a header. `Content-Type`, `Content-Length` and `Content-Encoding`
    /// are recomputed from the body at send time.
    pub fn set_header(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> &mut Self {
        if self.is_building("header") {
            self.headers.set(name, value);
        }
        self
    }

    pub fn set_body(&mut self, body: impl Into<Body>) -> &mut Self {
        if self.is_building("body") {
            self.body = Some(body.into());
        }
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn request(&self) -> &'a Request {
        self.request
    }

    pub fn is_sent(&self) -> bool {
        self.state == State::Sent
    }

    /// Writes the response to the connection. Terminal: the response is
    /// marked sent even if the write fails.
    ///
    /// # Errors
    ///
    /// [`ResponseError::AlreadySent`] on a second call; otherwise whatever
    /// [`Sender::send_all`] reports.
    pub async fn send(&mut self) -> Result<(), ResponseError> {
        if self.state == State::Sent {
            warn!(path = %self.request.path(), "send called on a response that was already sent");
            return Err(ResponseError::AlreadySent);
        }
        self.state = State::Sent;

        let body = self.body.take();
        self.sender
            .send_all(self.request, self.status, &mut self.headers, body)
            .await
    }

    /// Sets a text body and sends.
    pub async fn text(&mut self, text: impl Into<String>) -> Result<(), ResponseError> {
        self.set_body(Body::text(text));
        self.send().await
    }

    /// Opens `path` as a file body and sends.
    ///
    /// The caller is expected to have checked that the file exists; failing
    /// to open it is a [`ResponseError::ResourceUnavailable`].
    pub async fn local_file(&mut self, path: impl AsRef<Path>) -> Result<(), ResponseError> {
        if self.state == State::Sent {
            return self.send().await;
        }
        let body = Body::file(path).await?;
        self.set_body(body);
        self.send().await
    }

    fn is_building(&self, what: &'static str) -> bool {
        if self.state == State::Sent {
            warn!(what, path = %self.request.path(), "ignoring change to a response that was already sent");
            return false;
        }
        true
    }
}
