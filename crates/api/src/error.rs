//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use topology::TopologyError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Pipeline error.
    Topology(TopologyError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Topology(err) => topology_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn topology_error_to_response(err: TopologyError) -> (StatusCode, String) {
    let status = match &err {
        TopologyError::MalformedKeyField { .. } | TopologyError::Codec(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        TopologyError::ShardUnavailable { .. }
        | TopologyError::StateStoreUnavailable { .. }
        | TopologyError::OutputClosed
        | TopologyError::Stopped => StatusCode::SERVICE_UNAVAILABLE,
        TopologyError::Changelog(_) => {
            tracing::error!(error = %err, "internal server error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}

impl From<TopologyError> for ApiError {
    fn from(err: TopologyError) -> Self {
        ApiError::Topology(err)
    }
}
