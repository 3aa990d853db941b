//! HTTP/1.1 request parsing.
//!
//! The parser works on one complete receive buffer: everything before the
//! first `\r\n\r\n` is the head, everything after it is the body, verbatim.
//! It never consults `Content-Length`; deciding how many bytes make up a
//! request is the connection handler's job.

use std::str;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;

use super::encoding::{self, AcceptedEncoding};
use super::{Headers, Method};
use crate::config::Config;

/// Separator between the request head and the body.
const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Errors that can occur while parsing an HTTP/1.1 request.
///
/// Both variants are per-request conditions: the connection answers
/// `400 Bad Request` and closes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("malformed request: {reason}")]
    MalformedRequest { reason: &'static str },

    #[error("malformed header line: {line:?}")]
    MalformedHeader { line: String },
}

/// A fully parsed HTTP/1.1 request.
///
/// Immutable once parsed. Carries a shared handle to the server [`Config`] so
/// route code can resolve things like the files directory.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use filedrop::config::Config;
/// use filedrop::http::Request;
///
/// let raw = b"GET /echo/hi HTTP/1.1\r\nHost: localhost\r\nAccept-Encoding: gzip\r\n\r\n";
/// let request = Request::parse(raw, Arc::new(Config::default())).unwrap();
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.path(), "/echo/hi");
/// assert_eq!(request.header("HOST"), "localhost");
/// assert!(request.accepts_encoding("gzip"));
/// assert!(request.body().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    headers: Headers,
    body: Bytes,
    config: Arc<Config>,
}

impl Request {
    /// Parses a raw request buffer.
    ///
    /// # Errors
    ///
    /// - [`RequestError::MalformedRequest`]: no blank line ends the head, the head
    ///   is not UTF-8, or the request line lacks a method or path.
    /// - [`RequestError::MalformedHeader`]: a header line has no colon or an empty name.
    pub fn parse(buf: &[u8], config: Arc<Config>) -> Result<Self, RequestError> {
        let split = find(buf, HEAD_TERMINATOR).ok_or(RequestError::MalformedRequest {
            reason: "missing blank line after the request head",
        })?;

        let head = str::from_utf8(&buf[..split]).map_err(|_| RequestError::MalformedRequest {
            reason: "request head is not valid UTF-8",
        })?;
        let body = Bytes::copy_from_slice(&buf[split + HEAD_TERMINATOR.len()..]);

        let mut lines = head.split("\r\n");
        let request_line = lines.next().unwrap_or_default();

        // METHOD SP PATH SP VERSION; the version is not retained.
        let mut tokens = request_line.split(' ');
        let method = tokens
            .next()
            .filter(|t| !t.is_empty())
            .ok_or(RequestError::MalformedRequest {
                reason: "request line has no method",
            })?;
        let path = tokens
            .next()
            .filter(|t| !t.is_empty())
            .ok_or(RequestError::MalformedRequest {
                reason: "request line has no path",
            })?;

        let mut headers = Headers::new();
        for line in lines {
            let (name, value) = line
                .split_once(':')
                .filter(|(name, _)| !name.trim().is_empty())
                .ok_or_else(|| RequestError::MalformedHeader {
                    line: line.to_owned(),
                })?;
            headers.set(name, value);
        }

        Ok(Self {
            method: Method::from(method),
            path: path.to_owned(),
            headers,
            body,
            config,
        })
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the raw request target, exactly as received.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Shorthand for `headers().get(name)`; empty when absent.
    pub fn header(&self, name: &str) -> &str {
        self.headers.get(name)
    }

    /// Returns the bytes that followed the blank line. Empty, never missing.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the server configuration this request was received under.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parses this request's `Accept-Encoding` header.
    pub fn accepted_encodings(&self) -> Vec<AcceptedEncoding> {
        encoding::parse_accepted_encodings(self.header("accept-encoding"))
    }

    /// Returns `true` if the client listed `name` in `Accept-Encoding`,
    /// judged under the configured [`EncodingGate`](encoding::EncodingGate).
    pub fn accepts_encoding(&self, name: &str) -> bool {
        encoding::accepts(
            &self.accepted_encodings(),
            name,
            self.config.encoding_gate(),
        )
    }

    /// Returns the `Content-Length` header parsed as a `usize`, if present and valid.
    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length").parse().ok()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
