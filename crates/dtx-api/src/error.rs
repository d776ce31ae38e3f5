//! Error types for the dtx-api crate.

use thiserror::Error;

/// Result type for Dynatrace API operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Errors that can occur when talking to the Dynatrace API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be sent or the response could not be read.
    #[error("request to {url} failed: {source}")]
    Transport {
        /// The requested URL.
        url: String,
        /// The underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a status code the operation does not accept.
    #[error("unexpected response code {status}: {body}")]
    UnexpectedStatus {
        /// The HTTP status code.
        status: u16,
        /// The raw response body.
        body: String,
    },

    /// The API answered successfully but the body has an unexpected shape.
    #[error("unexpected response: {reason}")]
    UnexpectedResponse {
        /// What was wrong with the response.
        reason: String,
    },

    /// A request or response body could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The client could not be constructed from its configuration.
    #[error("invalid client configuration: {reason}")]
    InvalidConfig {
        /// The reason the configuration is invalid.
        reason: String,
    },
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
