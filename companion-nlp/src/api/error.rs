//! HTTP error responses for the gateway
//!
//! Body shape: `{ "error": { "code": ..., "message": ... } }`

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use companion_common::{Failure, FailureKind};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Address is not one of the NLP addresses (404)
    #[error("Unknown address: {0}")]
    UnknownAddress(String),

    /// Address known but nobody consumes it yet (503)
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Body could not be turned into a bus payload (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// No reply within the gateway timeout (504)
    #[error("Timed out waiting for reply from {0}")]
    Timeout(String),

    /// Consumer replied with an explicit failure
    #[error("{0}")]
    Failed(Failure),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<companion_common::Error> for ApiError {
    fn from(err: companion_common::Error) -> Self {
        use companion_common::Error;
        match err {
            Error::NoHandler(address) => ApiError::Unavailable(address),
            Error::Failed(failure) => ApiError::Failed(failure),
            Error::Codec(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

fn failure_status(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::NotFound => StatusCode::NOT_FOUND,
        FailureKind::Codec => StatusCode::BAD_REQUEST,
        FailureKind::Model | FailureKind::Index | FailureKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::UnknownAddress(address) => (
                StatusCode::NOT_FOUND,
                "UNKNOWN_ADDRESS",
                format!("No such address: {}", address),
            ),
            ApiError::Unavailable(address) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                format!("No consumer registered for {}", address),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Timeout(address) => (
                StatusCode::GATEWAY_TIMEOUT,
                "TIMEOUT",
                format!("No reply from {}", address),
            ),
            ApiError::Failed(failure) => (
                failure_status(failure.kind),
                failure.kind.as_str(),
                failure.message,
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kinds_map_to_status() {
        let cases = [
            (FailureKind::NotFound, StatusCode::NOT_FOUND),
            (FailureKind::Codec, StatusCode::BAD_REQUEST),
            (FailureKind::Index, StatusCode::INTERNAL_SERVER_ERROR),
            (FailureKind::Model, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (kind, status) in cases {
            let response = ApiError::Failed(Failure::new(kind, "x")).into_response();
            assert_eq!(response.status(), status);
        }
    }

    #[test]
    fn test_no_handler_is_unavailable() {
        let err: ApiError = companion_common::Error::NoHandler("nlp.tokens".into()).into();
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
