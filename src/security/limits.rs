//! Payload limits.
//!
//! # Responsibilities
//! - Enforce a plausible recipient address
//! - Enforce subject presence and length
//! - Enforce maximum body size
//!
//! # Design Decisions
//! - Returns the first violation; callers answer 400 Bad Request
//! - Address check is structural only; delivery is the provider's concern

use thiserror::Error;

use crate::config::SecurityConfig;
use crate::dispatch::{EmailPayload, InvalidKey};

/// A request that the boundary refuses to hand to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("recipient address is invalid: {0:?}")]
    InvalidRecipient(String),

    #[error("subject must not be empty")]
    EmptySubject,

    #[error("subject exceeds {max} characters")]
    SubjectTooLong { max: usize },

    #[error("body exceeds {max} bytes")]
    BodyTooLarge { max: usize },

    #[error("missing idempotency key")]
    MissingKey,

    #[error(transparent)]
    InvalidKey(#[from] InvalidKey),
}

/// Check a payload against the configured limits.
pub fn validate_payload(payload: &EmailPayload, limits: &SecurityConfig) -> Result<(), ValidationError> {
    if !is_plausible_address(&payload.to) {
        return Err(ValidationError::InvalidRecipient(payload.to.clone()));
    }
    if payload.subject.trim().is_empty() {
        return Err(ValidationError::EmptySubject);
    }
    if payload.subject.chars().count() > limits.max_subject_len {
        return Err(ValidationError::SubjectTooLong {
            max: limits.max_subject_len,
        });
    }
    if payload.body.len() > limits.max_body_size {
        return Err(ValidationError::BodyTooLarge {
            max: limits.max_body_size,
        });
    }
    Ok(())
}

fn is_plausible_address(address: &str) -> bool {
    let address = address.trim();
    if address.chars().any(char::is_whitespace) {
        return false;
    }
    match address.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}
