//! Error types for the dtx-events crate.

use thiserror::Error;

/// Errors raised while decoding lifecycle events.
///
/// Backend failures never surface here: event forwarding is best effort and
/// only logs them.
#[derive(Debug, Error)]
pub enum EventError {
    /// The webhook body is not a valid lifecycle event envelope.
    #[error("failed to decode event request body: {0}")]
    MalformedBody(String),

    /// The envelope lacks the payload section its event kind requires.
    #[error("missing {section} in event")]
    MissingPayload {
        /// Name of the missing envelope section.
        section: &'static str,
    },
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedBody(err.to_string())
    }
}

/// Result type for event decoding.
pub type EventResult<T> = std::result::Result<T, EventError>;
