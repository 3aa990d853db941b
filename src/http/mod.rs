//! HTTP/1.1 protocol engine.
//!
//! This module provides the core primitives:
//! [`Method`], [`StatusCode`], [`Headers`], [`Request`], the [`Body`] variants,
//! the [`Response`] builder and the [`Sender`] that puts it on the wire.

use std::fmt;

pub mod body;
pub mod encoding;
pub mod headers;
pub mod request;
pub mod response;
pub mod sender;

pub use body::Body;
pub use headers::Headers;
pub use request::{Request, RequestError};
pub use response::{Response, ResponseError};
pub use sender::Sender;

/// An HTTP response status code.
///
/// # Examples
///
/// ```
/// use filedrop::http::StatusCode;
///
/// let status = StatusCode::Conflict;
/// assert_eq!(status.as_u16(), 409);
/// assert_eq!(status.to_string(), "409 Conflict");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatusCode {
    // 2xx Success
    Ok = 200,
    Created = 201,

    // 4xx Client Error
    BadRequest = 400,
    NotFound = 404,
    Conflict = 409,

    // 5xx Server Error
    InternalServerError = 500,
    NotImplemented = 501,
}

impl StatusCode {
    /// Returns the numeric status code as a `u16`.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the canonical reason phrase for this status code.
    pub fn canonical_reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Created => "Created",
            Self::BadRequest => "Bad Request",
            Self::NotFound => "Not Found",
            Self::Conflict => "Conflict",
            Self::InternalServerError => "Internal Server Error",
            Self::NotImplemented => "Not Implemented",
        }
    }
}

/// Renders `{code} {reason}`, the tail of a status line.
impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> u16 {
        code.as_u16()
    }
}

/// An HTTP request method.
///
/// Standard methods are unit variants; anything else lands in `Custom`
/// untouched, so parsing a method never fails.
///
/// # Examples
///
/// ```
/// use filedrop::http::Method;
///
/// let method: Method = "POST".parse().unwrap();
/// assert_eq!(method, Method::Post);
/// assert_eq!(Method::from("BREW"), Method::Custom("BREW".to_owned()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    Connect,
    Trace,
    /// A non-standard extension method.
    Custom(String),
}

impl Method {
    /// Returns the method as a string slice.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch => "PATCH",
            Self::Connect => "CONNECT",
            Self::Trace => "TRACE",
            Self::Custom(s) => s.as_str(),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Method {
    fn from(s: &str) -> Self {
        match s {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            "PATCH" => Self::Patch,
            "CONNECT" => Self::Connect,
            "TRACE" => Self::Trace,
            other => Self::Custom(other.to_owned()),
        }
    }
}

impl std::str::FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_tail() {
        assert_eq!(StatusCode::Ok.to_string(), "200 OK");
        assert_eq!(StatusCode::NotImplemented.to_string(), "501 Not Implemented");
        assert_eq!(u16::from(StatusCode::Created), 201);
    }

    #[test]
    fn methods_are_case_sensitive() {
        assert_eq!(Method::from("GET"), Method::Get);
        assert_eq!(Method::from("get"), Method::Custom("get".to_owned()));
        assert_eq!(Method::from("get").as_str(), "get");
    }
}
