//! Request parsing for the dispatch API.
//!
//! # Responsibilities
//! - Decode the send-email body
//! - Resolve the idempotency key (header first, then body)
//! - Read the request ID assigned by the request-id layer

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::dispatch::{EmailPayload, IdempotencyKey, InvalidKey};
use crate::security::ValidationError;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Body of `POST /send-email`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SendEmailRequest {
    pub to: String,
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl SendEmailRequest {
    /// Split into the payload and the resolved idempotency key.
    pub fn into_parts(
        self,
        headers: &HeaderMap,
    ) -> Result<(EmailPayload, IdempotencyKey), ValidationError> {
        let raw = match headers.get(IDEMPOTENCY_KEY_HEADER) {
            Some(value) => Some(
                value
                    .to_str()
                    .map_err(|_| InvalidKey::InvalidCharacters)?
                    .to_string(),
            ),
            None => self.idempotency_key,
        };
        let key = IdempotencyKey::new(raw.ok_or(ValidationError::MissingKey)?)?;

        let payload = EmailPayload {
            to: self.to,
            subject: self.subject,
            body: self.body,
        };
        Ok((payload, key))
    }
}

/// Request ID set by the request-id layer, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}
