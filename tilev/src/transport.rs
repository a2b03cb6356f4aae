//! Tile transports: how raw tile bytes are obtained for a URL.
//!
//! The resolver is agnostic to where tiles live. It talks to a
//! [`TileTransport`], which answers each request with one of:
//!
//! - [`TransportResponse::Found`]: the tile image bytes.
//! - [`TransportResponse::NotFound`]: the server has no such resource; the
//!   body is kept so the fetcher can tell an empty-tile placeholder apart from
//!   a genuine miss.
//! - a [`TransportError`]: anything else.
//!
//! Two transports are provided: [`HttpTransport`] (feature `http`) and
//! [`FileTransport`] for tile pyramids on local disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::trace;

/// Upper bound (exclusive) on the size of a placeholder body.
pub const PLACEHOLDER_MAX_LEN: usize = 40;

/// Text that identifies an empty-tile placeholder body.
pub const PLACEHOLDER_MARKER: &str = "Tile not found";

/// Outcome of a successful transport round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportResponse {
    /// Tile image bytes.
    Found(Vec<u8>),
    /// The resource does not exist; carries the response body.
    NotFound(Vec<u8>),
}

/// Transport-level failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The request could not be completed (DNS, connect, timeout, ...).
    #[error("Request failed: {0}")]
    Request(String),

    /// The server answered with a status that is neither success nor 404.
    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    /// Local I/O failure.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Source of raw tile bytes.
#[async_trait]
pub trait TileTransport: Send + Sync {
    /// Retrieve the resource at `url`.
    async fn fetch(&self, url: &str) -> Result<TransportResponse, TransportError>;
}

/// Whether a not-found body is a known empty-tile placeholder.
///
/// Many elevation tile sets omit tiles that are entirely ocean and answer
/// with a short `Tile not found` body instead.
pub fn is_empty_tile_placeholder(body: &[u8]) -> bool {
    let marker = PLACEHOLDER_MARKER.as_bytes();
    body.len() < PLACEHOLDER_MAX_LEN && body.windows(marker.len()).any(|w| w == marker)
}

#[cfg(feature = "http")]
pub use http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use reqwest::StatusCode;
    use tracing::debug;

    use super::{TileTransport, TransportError, TransportResponse};

    /// Default request timeout in seconds.
    const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// User-Agent sent with every request; some tile servers reject requests
    /// without one.
    const DEFAULT_USER_AGENT: &str = concat!("tilev/", env!("CARGO_PKG_VERSION"));

    /// Tile transport backed by an async reqwest client.
    #[derive(Debug, Clone)]
    pub struct HttpTransport {
        client: reqwest::Client,
    }

    impl HttpTransport {
        /// Create a transport with the default timeout.
        pub fn new() -> Result<Self, TransportError> {
            Self::with_timeout(DEFAULT_TIMEOUT_SECS)
        }

        /// Create a transport with a custom request timeout.
        pub fn with_timeout(timeout_secs: u64) -> Result<Self, TransportError> {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .user_agent(DEFAULT_USER_AGENT)
                .build()
                .map_err(|e| {
                    TransportError::Request(format!("Failed to create HTTP client: {}", e))
                })?;

            Ok(Self { client })
        }

        /// Wrap an existing client.
        pub fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl TileTransport for HttpTransport {
        async fn fetch(&self, url: &str) -> Result<TransportResponse, TransportError> {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| TransportError::Request(e.to_string()))?;

            let status = response.status();
            debug!(url = %url, status = status.as_u16(), "tile response");

            if status != StatusCode::OK && status != StatusCode::NOT_FOUND {
                return Err(TransportError::Status(status.as_u16()));
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| TransportError::Request(format!("Failed to read response: {}", e)))?
                .to_vec();

            if status == StatusCode::NOT_FOUND {
                Ok(TransportResponse::NotFound(body))
            } else {
                Ok(TransportResponse::Found(body))
            }
        }
    }
}

/// Tile transport that reads a tile pyramid from a local directory.
///
/// The expanded template is treated as a path relative to the root, e.g.
/// `{z}/{x}/{y}.png`. A missing file is reported as an empty-tile
/// placeholder, so sparse pyramids resolve to sea level where tiles are
/// absent.
#[derive(Debug, Clone)]
pub struct FileTransport {
    root: PathBuf,
}

impl FileTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl TileTransport for FileTransport {
    async fn fetch(&self, url: &str) -> Result<TransportResponse, TransportError> {
        let path = self.root.join(url.trim_start_matches('/'));
        trace!(path = %path.display(), "reading tile file");

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(TransportResponse::Found(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TransportResponse::NotFound(
                PLACEHOLDER_MARKER.as_bytes().to_vec(),
            )),
            Err(e) => Err(TransportError::Io(format!("{}: {}", path.display(), e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_placeholder_recognition() {
        assert!(is_empty_tile_placeholder(b"Tile not found"));
        assert!(is_empty_tile_placeholder(b"Error: Tile not found\n"));
        assert!(!is_empty_tile_placeholder(b"Not Found"));
        assert!(!is_empty_tile_placeholder(b""));

        // A long error page mentioning the marker is not a placeholder
        let long = format!("<html><body>{}</body></html>", PLACEHOLDER_MARKER);
        assert!(long.len() >= PLACEHOLDER_MAX_LEN);
        assert!(!is_empty_tile_placeholder(long.as_bytes()));
    }

    #[tokio::test]
    async fn test_file_transport_found() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("12/10")).unwrap();
        std::fs::write(dir.path().join("12/10/20.png"), b"png bytes").unwrap();

        let transport = FileTransport::new(dir.path());
        let response = transport.fetch("12/10/20.png").await.unwrap();
        assert_eq!(response, TransportResponse::Found(b"png bytes".to_vec()));
    }

    #[tokio::test]
    async fn test_file_transport_missing_is_placeholder() {
        let dir = TempDir::new().unwrap();
        let transport = FileTransport::new(dir.path());

        match transport.fetch("/12/0/0.png").await.unwrap() {
            TransportResponse::NotFound(body) => assert!(is_empty_tile_placeholder(&body)),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_file_transport_io_error() {
        let dir = TempDir::new().unwrap();
        // A directory where a file is expected cannot be read as a tile
        std::fs::create_dir_all(dir.path().join("12/1/2.png")).unwrap();

        let transport = FileTransport::new(dir.path());
        let err = transport.fetch("12/1/2.png").await.unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
    }
}
