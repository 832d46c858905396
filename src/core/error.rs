//! Error types for talking to the dashboard service.

use thiserror::Error;

/// Failure while fetching a resource from the dashboard API.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Server returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The service answered with an `{"status": "error"}` envelope.
    #[error("Service reported an error for {url}: {message}")]
    Api { url: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    /// True when the server answered but with a non-success status.
    pub fn is_status(&self, code: u16) -> bool {
        matches!(self, FetchError::Status { status, .. } if *status == code)
    }
}
