use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use filedrop::config::{Config, DEFAULT_MAX_REQUEST_BYTES, DEFAULT_PORT};
use filedrop::http::encoding::EncodingGate;
use filedrop::server::Server;

#[derive(Debug, Parser)]
#[command(name = "filedrop")]
#[command(about = "HTTP/1.1 echo and file server", long_about = None)]
struct Cli {
    /// Directory with files for the /files endpoint
    #[arg(long)]
    directory: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Largest request accepted; longer requests are truncated
    #[arg(long, default_value_t = DEFAULT_MAX_REQUEST_BYTES)]
    max_request_bytes: usize,

    /// Drop clients that stay silent this long while sending a request
    #[arg(long)]
    read_timeout_ms: Option<u64>,

    /// Only compress when gzip is listed with a weight above zero
    #[arg(long)]
    quality_aware: bool,
}

impl Cli {
    fn into_config(self) -> Config {
        let mut config = Config::default()
            .with_host(self.host)
            .with_port(self.port)
            .with_max_request_bytes(self.max_request_bytes);

        if let Some(dir) = self.directory {
            config = config.with_files_directory(dir);
        }
        if let Some(ms) = self.read_timeout_ms {
            config = config.with_read_timeout(Duration::from_millis(ms));
        }
        if self.quality_aware {
            config = config.with_encoding_gate(EncodingGate::QualityAware);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("filedrop=info")),
        )
        .init();

    let config = Cli::parse().into_config();
    let server = Server::bind(config).await?;
    server.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_onto_config() {
        let cli = Cli::parse_from([
            "filedrop",
            "--directory",
            "/tmp/files",
            "--port",
            "8080",
            "--read-timeout-ms",
            "250",
            "--quality-aware",
        ]);
        let config = cli.into_config();
        assert_eq!(config.port(), 8080);
        assert_eq!(config.files_directory(), Some(std::path::Path::new("/tmp/files")));
        assert_eq!(config.read_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.encoding_gate(), EncodingGate::QualityAware);
    }

    #[test]
    fn defaults_match_config_defaults() {
        let config = Cli::parse_from(["filedrop"]).into_config();
        assert_eq!(config.bind_address(), format!("0.0.0.0:{DEFAULT_PORT}"));
        assert!(config.files_directory().is_none());
        assert_eq!(config.encoding_gate(), EncodingGate::Literal);
    }
}
