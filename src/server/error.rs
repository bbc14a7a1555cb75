//! API error types for the job status service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::job::RegistryError;
use crate::relay::RelayError;
use crate::upstream::UpstreamError;

/// Failures surfaced by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("job {0} not found")]
    JobNotFound(Uuid),

    #[error("job {0} is not ready for streaming")]
    JobNotReady(Uuid),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            ApiError::Upstream(UpstreamError::MissingCredentials) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "missing_credentials")
            }
            ApiError::Upstream(UpstreamError::Request { .. }) => {
                (StatusCode::BAD_GATEWAY, "upstream_request_error")
            }
            ApiError::Upstream(UpstreamError::Fetch { .. }) => {
                (StatusCode::BAD_GATEWAY, "upstream_fetch_error")
            }
            ApiError::Upstream(UpstreamError::MalformedResponse(_)) => {
                (StatusCode::BAD_GATEWAY, "malformed_upstream_response")
            }
            ApiError::Upstream(UpstreamError::Http(_)) => {
                (StatusCode::BAD_GATEWAY, "upstream_unreachable")
            }
            ApiError::Registry(RegistryError::AtCapacity) => {
                (StatusCode::TOO_MANY_REQUESTS, "too_many_jobs")
            }
            ApiError::Relay(_) => (StatusCode::BAD_GATEWAY, "relay_fetch_error"),
            ApiError::JobNotFound(_) => (StatusCode::NOT_FOUND, "job_not_found"),
            ApiError::JobNotReady(_) => (StatusCode::CONFLICT, "job_not_ready"),
        };

        let body = ErrorBody {
            error: error_code,
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
