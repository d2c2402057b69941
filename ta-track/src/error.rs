//! Error types for ta-track
//!
//! [`LookupError`] is the taxonomy of the item lookup normalizer.
//! [`ApiError`] adds the HTTP-only failures and renders every error as
//! `{"error": message, "code": CODE}` with a matching status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Item lookup failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LookupError {
    /// Missing or malformed input (400)
    #[error("{0}")]
    BadRequest(String),

    /// Teaser main category absent from the catalog (404)
    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    /// Teaser sub-category absent from its main category (404)
    #[error("Sub-category not found: {0}")]
    SubCategoryNotFound(String),

    /// Upstream returned non-2xx or could not be reached (502)
    #[error("{0}")]
    UpstreamUnavailable(String),

    /// Upstream body was not the JSON we expected (502)
    #[error("{0}")]
    MalformedUpstreamResponse(String),

    /// Upstream JSON parsed but required fields were missing (502)
    #[error("{0}")]
    IncompleteUpstreamData(String),

    /// Required key or endpoint not configured (500)
    #[error("{0}")]
    ConfigurationError(String),
}

impl LookupError {
    pub fn status(&self) -> StatusCode {
        match self {
            LookupError::BadRequest(_) => StatusCode::BAD_REQUEST,
            LookupError::CategoryNotFound(_) | LookupError::SubCategoryNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            LookupError::UpstreamUnavailable(_)
            | LookupError::MalformedUpstreamResponse(_)
            | LookupError::IncompleteUpstreamData(_) => StatusCode::BAD_GATEWAY,
            LookupError::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            LookupError::BadRequest(_) => "BAD_REQUEST",
            LookupError::CategoryNotFound(_) => "CATEGORY_NOT_FOUND",
            LookupError::SubCategoryNotFound(_) => "SUB_CATEGORY_NOT_FOUND",
            LookupError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            LookupError::MalformedUpstreamResponse(_) => "MALFORMED_UPSTREAM_RESPONSE",
            LookupError::IncompleteUpstreamData(_) => "INCOMPLETE_UPSTREAM_DATA",
            LookupError::ConfigurationError(_) => "CONFIGURATION_ERROR",
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Lookup normalizer failure
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// Missing or rejected bearer token (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid request outside the lookup path (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Lookup(err) => (err.status(), err.code(), err.to_string()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        let body = Json(json!({
            "error": message,
            "code": error_code,
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
    fn test_status_mapping() {
        assert_eq!(
            LookupError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            LookupError::CategoryNotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            LookupError::IncompleteUpstreamData("x".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            LookupError::ConfigurationError("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response =
            ApiError::from(LookupError::CategoryNotFound("gems".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Category not found: gems");
        assert_eq!(body["code"], "CATEGORY_NOT_FOUND");
    }
}
