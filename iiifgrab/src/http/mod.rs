//! HTTP client abstraction for testability

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during HTTP operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HttpError {
    /// The request could not be sent or timed out.
    #[error("Request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status code.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The response body could not be read.
    #[error("Failed to read response: {0}")]
    Body(String),
}

/// Trait for HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests. Implementations must be
/// thread-safe so a single client can be shared across download workers.
pub trait HttpClient: Send + Sync {
    /// Performs an HTTP GET request and returns the response body.
    fn get(&self, url: &str) -> Result<Vec<u8>, HttpError>;
}

/// Real HTTP client implementation using reqwest.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

/// Default request timeout for manifest and tile fetches.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

impl ReqwestClient {
    /// Creates a new client with the default 30 second timeout.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Creates a new client with a custom request timeout.
    ///
    /// The timeout covers the whole request, so slow tile servers fail
    /// rather than stalling a download worker indefinitely.
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("iiifgrab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| HttpError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(HttpError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| HttpError::Body(e.to_string()))
    }
}
