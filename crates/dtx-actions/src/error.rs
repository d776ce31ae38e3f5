//! Error types for the dtx-actions crate.

use dtx_api::ApiError;
use thiserror::Error;

/// Errors that abort an action.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The step configuration cannot be used.
    #[error("invalid action config: {reason}")]
    InvalidConfig {
        /// Why the config was rejected.
        reason: String,
    },

    /// The state handed back by the orchestrator cannot be decoded.
    #[error("invalid action state: {reason}")]
    InvalidState {
        /// Why the state was rejected.
        reason: String,
    },

    /// A Dynatrace call failed.
    #[error("{title}")]
    Backend {
        /// What the action tried to do.
        title: String,
        /// The underlying API failure.
        #[source]
        source: ApiError,
    },
}

impl ActionError {
    /// Wraps an API failure.
    #[must_use]
    pub fn backend(title: impl Into<String>, source: ApiError) -> Self {
        Self::Backend {
            title: title.into(),
            source,
        }
    }

    /// Short summary shown to the user.
    #[must_use]
    pub fn title(&self) -> String {
        match self {
            Self::Backend { title, .. } => title.clone(),
            other => other.to_string(),
        }
    }

    /// Underlying cause, if any.
    #[must_use]
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::Backend { source, .. } => Some(source.to_string()),
            Self::InvalidConfig { .. } | Self::InvalidState { .. } => None,
        }
    }

    /// Whether the caller sent something unusable.
    #[must_use]
    pub const fn is_bad_request(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. } | Self::InvalidState { .. })
    }
}

/// Result type for action operations.
pub type ActionResult<T> = std::result::Result<T, ActionError>;
