//! Server configuration.
//!
//! Built once at startup and shared read-only as `Arc<Config>` by the accept
//! loop, every connection task and every parsed [`Request`](crate::http::Request).

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::http::encoding::EncodingGate;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 4221;

/// Default cap on the bytes buffered for a single request (8 KiB).
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 8 * 1024;

/// Immutable server configuration.
///
/// # Examples
///
/// ```
/// use filedrop::config::Config;
///
/// let config = Config::default().with_port(8080).with_files_directory("/tmp");
/// assert_eq!(config.bind_address(), "0.0.0.0:8080");
/// assert!(config.files_directory().is_some());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    host: IpAddr,
    port: u16,
    files_directory: Option<PathBuf>,
    max_request_bytes: usize,
    read_timeout: Option<Duration>,
    encoding_gate: EncodingGate,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            files_directory: None,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            read_timeout: None,
            encoding_gate: EncodingGate::Literal,
        }
    }
}

impl Config {
    #[must_use]
    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the directory served and written by the `/files` endpoint.
    #[must_use]
    pub fn with_files_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.files_directory = Some(dir.into());
        self
    }

    /// Caps the bytes read for one request. Anything past the cap is truncated.
    #[must_use]
    pub fn with_max_request_bytes(mut self, max: usize) -> Self {
        self.max_request_bytes = max.max(1);
        self
    }

    /// Drops peers that stay silent longer than `timeout` while sending a request.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_encoding_gate(mut self, gate: EncodingGate) -> Self {
        self.encoding_gate = gate;
        self
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns `host:port`, suitable for [`Server::bind`](crate::server::Server::bind).
    pub fn bind_address(&self) -> String {
        match self.host {
            IpAddr::V4(v4) => format!("{v4}:{}", self.port),
            IpAddr::V6(v6) => format!("[{v6}]:{}", self.port),
        }
    }

    pub fn files_directory(&self) -> Option<&Path> {
        self.files_directory.as_deref()
    }

    pub fn max_request_bytes(&self) -> usize {
        self.max_request_bytes
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    pub fn encoding_gate(&self) -> EncodingGate {
        self.encoding_gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.port(), DEFAULT_PORT);
        assert_eq!(config.max_request_bytes(), DEFAULT_MAX_REQUEST_BYTES);
        assert!(config.files_directory().is_none());
        assert!(config.read_timeout().is_none());
        assert_eq!(config.encoding_gate(), EncodingGate::Literal);
    }

    #[test]
    fn ipv6_bind_address_is_bracketed() {
        let config = Config::default()
            .with_host(IpAddr::V6(Ipv6Addr::LOCALHOST))
            .with_port(9000);
        assert_eq!(config.bind_address(), "[::1]:9000");
    }

    #[test]
    fn zero_request_cap_is_raised_to_one() {
        assert_eq!(Config::default().with_max_request_bytes(0).max_request_bytes(), 1);
    }
}
