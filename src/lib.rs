//! # filedrop
//!
//! A from-scratch async HTTP/1.1 server: raw request parsing, a small closed
//! set of response bodies, gzip negotiation and byte-exact serialization,
//! serving `/echo`, `/user-agent` and a flat `/files` directory.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use filedrop::config::Config;
//! use filedrop::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default().with_files_directory("/srv/files");
//!     let server = Server::bind(config).await?;
//!     println!("Listening on http://{}", server.local_addr());
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod http;
pub mod router;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use config::Config;
pub use http::{Body, Headers, Method, Request, Response, Sender, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
