//! Mapping of engine outcomes to HTTP responses.
//!
//! - Invalid input → 400 with `{"error": ...}`
//! - Rate limited → 429 with `Retry-After` (whole seconds, rounded up)
//! - Unknown key → 404
//! - Deadline elapsed → 202 with the pending record (see server.rs)

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::dispatch::DispatchError;
use crate::security::ValidationError;

/// Error returned by API handlers.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    RateLimited { retry_after: Duration },
    NotFound(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::RateLimitExceeded { retry_after } => ApiError::RateLimited { retry_after },
        }
    }
}

/// Seconds for a `Retry-After` header; never 0 while a rejection stands.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::BadRequest(message) => (status, Json(json!({ "error": message }))).into_response(),
            ApiError::NotFound(key) => (
                status,
                Json(json!({ "error": format!("no dispatch for key {key}") })),
            )
                .into_response(),
            ApiError::RateLimited { retry_after } => {
                let secs = retry_after_secs(retry_after);
                let mut response = (
                    status,
                    Json(json!({
                        "error": "rate limit exceeded",
                        "retry_after_secs": secs,
                    })),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(secs));
                response
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(6_000)), 6);
        assert_eq!(retry_after_secs(Duration::from_millis(6_001)), 7);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }

    #[test]
    fn test_rate_limited_sets_header() {
        let response = ApiError::RateLimited {
            retry_after: Duration::from_millis(2_500),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "3");
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let response = ApiError::from(ValidationError::MissingKey).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
