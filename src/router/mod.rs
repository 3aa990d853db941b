//! Request routing: map request paths to the server's endpoints.
//!
//! Two pattern styles are supported:
//!
//! | Pattern        | Example match        | Captured tail   |
//! |----------------|----------------------|-----------------|
//! | `/user-agent`  | `/user-agent`        | *(none)*        |
//! | `/echo/*`      | `/echo/abc`          | `abc`           |
//!
//! Paths are compared byte for byte against the raw request target; nothing is
//! unescaped or normalized. Routes are matched in registration order and the
//! first hit wins. Unmatched paths get an empty `404 Not Found`.

use tokio::io::AsyncWrite;

use crate::http::{Request, Response, ResponseError};

pub mod files;
pub mod handlers;

/// The endpoints a route can lead to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// `200 OK` with an empty body.
    Root,
    /// Echoes the captured tail as text.
    Echo,
    /// Reflects the `User-Agent` header as text.
    UserAgent,
    /// Downloads (`GET`) or uploads (`POST`) a file in the configured directory.
    Files,
}

// Compiled representation of a route pattern string.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    // Matches one exact path string, e.g. `/user-agent`.
    Exact(String),
    // Matches `{prefix}/{tail}` for any tail, e.g. `/files/*`.
    Wildcard(String),
}

impl Pattern {
    /// Parse a route pattern string.
    ///
    /// A pattern ending in `/*` compiles to [`Pattern::Wildcard`] over the part
    /// before it; anything else is an exact match.
    fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix("/*") {
            Some(prefix) => Pattern::Wildcard(prefix.to_owned()),
            None => Pattern::Exact(pattern.to_owned()),
        }
    }

    // Returns the captured tail on a match (empty for exact patterns).
    fn matches<'p>(&self, path: &'p str) -> Option<&'p str> {
        match self {
            Pattern::Exact(p) => (p == path).then_some(""),
            Pattern::Wildcard(prefix) => path.strip_prefix(prefix.as_str())?.strip_prefix('/'),
        }
    }
}

/// Maps request paths to [`Endpoint`]s and runs them.
///
/// # Examples
///
/// ```
/// use filedrop::router::{Endpoint, Router};
///
/// let router = Router::default();
/// assert_eq!(router.resolve("/echo/abc"), Some((Endpoint::Echo, "abc")));
/// assert_eq!(router.resolve("/user-agent"), Some((Endpoint::UserAgent, "")));
/// assert_eq!(router.resolve("/nope"), None);
/// ```
#[derive(Debug, Clone)]
pub struct Router {
    routes: Vec<(Pattern, Endpoint)>,
}

/// The server's standard route table.
impl Default for Router {
    fn default() -> Self {
        Self::new()
            .route("/", Endpoint::Root)
            .route("/echo/*", Endpoint::Echo)
            .route("/user-agent", Endpoint::UserAgent)
            .route("/files/*", Endpoint::Files)
    }
}

impl Router {
    /// Create a router with no routes.
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register `pattern` for `endpoint`.
    #[must_use]
    pub fn route(mut self, pattern: &str, endpoint: Endpoint) -> Self {
        self.routes.push((Pattern::parse(pattern), endpoint));
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the first route matching `path`, with the tail it captured.
    pub fn resolve<'p>(&self, path: &'p str) -> Option<(Endpoint, &'p str)> {
        self.routes
            .iter()
            .find_map(|(pattern, endpoint)| pattern.matches(path).map(|tail| (*endpoint, tail)))
    }

    /// Run the endpoint for `request`, writing its answer through `response`.
    ///
    /// If the endpoint finishes without sending, the response is sent as it stands.
    pub async fn dispatch<W>(
        &self,
        request: &Request,
        response: &mut Response<'_, W>,
    ) -> Result<(), ResponseError>
    where
        W: AsyncWrite + Unpin,
    {
        match self.resolve(request.path()) {
            Some((Endpoint::Root, _)) => handlers::root(response).await?,
            Some((Endpoint::Echo, tail)) => handlers::echo(tail, response).await?,
            Some((Endpoint::UserAgent, _)) => handlers::user_agent(request, response).await?,
            Some((Endpoint::Files, name)) => files::serve(name, request, response).await?,
            None => handlers::not_found(response).await?,
        }

        if !response.is_sent() {
            response.send().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::Config;
    use crate::http::Sender;

    async fn dispatch(raw: &str) -> String {
        let request = Request::parse(raw.as_bytes(), Arc::new(Config::default())).unwrap();
        let mut sender = Sender::new(Vec::new());
        {
            let mut response = Response::new(&request, &mut sender);
            Router::default()
                .dispatch(&request, &mut response)
                .await
                .unwrap();
        }
        String::from_utf8(sender.into_inner()).unwrap()
    }

    // ── Pattern ───────────────────────────────────────────────────────────────

    #[test]
    fn pattern_parse_exact() {
        assert_eq!(Pattern::parse("/"), Pattern::Exact("/".to_owned()));
        assert_eq!(
            Pattern::parse("/user-agent"),
            Pattern::Exact("/user-agent".to_owned())
        );
    }

    #[test]
    fn pattern_parse_wildcard() {
        assert_eq!(
            Pattern::parse("/files/*"),
            Pattern::Wildcard("/files".to_owned())
        );
    }

    #[test]
    fn pattern_exact_does_not_normalize() {
        let p = Pattern::parse("/user-agent");
        assert_eq!(p.matches("/user-agent"), Some(""));
        assert_eq!(p.matches("/user-agent/"), None);
    }

    #[test]
    fn pattern_wildcard_requires_segment_boundary() {
        let p = Pattern::parse("/files/*");
        assert_eq!(p.matches("/files/a.txt"), Some("a.txt"));
        assert_eq!(p.matches("/files/"), Some(""));
        assert_eq!(p.matches("/files"), None);
        assert_eq!(p.matches("/filesystem"), None);
    }

    #[test]
    fn pattern_wildcard_keeps_tail_verbatim() {
        let p = Pattern::parse("/echo/*");
        assert_eq!(p.matches("/echo/a/b%20c/"), Some("a/b%20c/"));
    }

    // ── Router ────────────────────────────────────────────────────────────────

    #[test]
    fn router_starts_empty() {
        assert!(Router::new().is_empty());
        assert_eq!(Router::default().len(), 4);
    }

    #[test]
    fn first_registered_route_wins() {
        let router = Router::new()
            .route("/echo/*", Endpoint::Echo)
            .route("/echo/*", Endpoint::Root);
        assert_eq!(router.resolve("/echo/x"), Some((Endpoint::Echo, "x")));
    }

    #[tokio::test]
    async fn root_is_empty_ok() {
        let wire = dispatch("GET / HTTP/1.1\r\n\r\n").await;
        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(wire.ends_with("content-length: 0\r\n\r\n"));
    }

    #[tokio::test]
    async fn echo_returns_tail() {
        let wire = dispatch("GET /echo/hello HTTP/1.1\r\n\r\n").await;
        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(!wire.contains("content-encoding"));
        assert!(wire.ends_with("\r\n\r\nhello"));
    }

    #[tokio::test]
    async fn user_agent_is_reflected() {
        let wire = dispatch("GET /user-agent HTTP/1.1\r\nUser-Agent: foobar/1.2.3\r\n\r\n").await;
        assert!(wire.ends_with("content-length: 12\r\n\r\nfoobar/1.2.3"));
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let wire = dispatch("GET /nowhere HTTP/1.1\r\n\r\n").await;
        assert!(wire.starts_with("HTTP/1.1 404 Not Found\r\n"));
    }
}
