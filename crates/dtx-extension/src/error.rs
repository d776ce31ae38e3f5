//! Error types for the extension service.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dtx_actions::ActionError;
use dtx_events::EventError;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// Result type alias for extension operations.
pub type ExtensionResult<T> = Result<T, ExtensionError>;

/// Errors surfaced by the extension service.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(std::net::SocketAddr, std::io::Error),

    /// The server stopped with an I/O error.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    /// The service configuration is unusable.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong.
        reason: String,
    },

    /// A request body could not be decoded.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A webhook body is not a valid lifecycle event.
    #[error(transparent)]
    MalformedEvent(#[from] EventError),

    /// An action call failed.
    #[error(transparent)]
    Action(#[from] ActionError),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl ExtensionError {
    /// HTTP status reported for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::MalformedEvent(_) => StatusCode::BAD_REQUEST,
            Self::Action(err) if err.is_bad_request() => StatusCode::BAD_REQUEST,
            Self::BindFailed(_, _)
            | Self::Serve(_)
            | Self::InvalidConfig { .. }
            | Self::Action(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ExtensionError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Action(err) => ErrorResponse {
                title: err.title(),
                detail: err.detail(),
            },
            other => ErrorResponse {
                title: other.to_string(),
                detail: None,
            },
        };
        warn!(status = status.as_u16(), title = %body.title, "request failed");

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtx_api::ApiError;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_event_is_bad_request() {
        let err = ExtensionError::from(EventError::MissingPayload {
            section: "experimentExecution",
        });
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["title"].as_str().unwrap().contains("experimentExecution"));
        assert!(json.get("detail").is_none());
    }

    #[tokio::test]
    async fn test_backend_failure_carries_detail() {
        let err = ExtensionError::from(ActionError::backend(
            "Failed to create maintenance window.",
            ApiError::UnexpectedStatus {
                status: 403,
                body: "forbidden".to_string(),
            },
        ));
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["title"], "Failed to create maintenance window.");
        assert!(json["detail"].as_str().unwrap().contains("403"));
    }

    #[test]
    fn test_invalid_action_config_is_bad_request() {
        let err = ExtensionError::from(ActionError::InvalidConfig {
            reason: "missing field `duration`".to_string(),
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_undecodable_body_is_bad_request() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let response = ExtensionError::InvalidRequest(serde_err.to_string()).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["title"].as_str().unwrap().starts_with("invalid request:"));
    }
}
