//! Dispatch domain types and error definitions.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// The unit of work handed to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailPayload {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Message body.
    pub body: String,
}

/// Caller-supplied key that collapses repeated requests into one dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub const MAX_LENGTH: usize = 128;

    /// Validate and wrap a key. Surrounding whitespace is trimmed.
    pub fn new(key: impl Into<String>) -> Result<Self, InvalidKey> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(InvalidKey::Empty);
        }
        if key.len() > Self::MAX_LENGTH {
            return Err(InvalidKey::TooLong(Self::MAX_LENGTH));
        }
        if !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
        {
            return Err(InvalidKey::InvalidCharacters);
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = InvalidKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<IdempotencyKey> for String {
    fn from(key: IdempotencyKey) -> Self {
        key.0
    }
}

/// Reasons an idempotency key is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidKey {
    #[error("idempotency key cannot be empty")]
    Empty,

    #[error("idempotency key exceeds {0} characters")]
    TooLong(usize),

    #[error("idempotency key may only contain ASCII letters, digits, '-', '_', '.' and ':'")]
    InvalidCharacters,
}

/// Lifecycle state of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchState {
    Pending,
    Sent,
    Failed,
}

impl DispatchState {
    /// `Sent` and `Failed` are terminal; records never leave them.
    pub fn is_terminal(self) -> bool {
        !matches!(self, DispatchState::Pending)
    }
}

/// Lifecycle record for one idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub id: Uuid,
    pub state: DispatchState,
    pub attempts: u32,
    /// Name of the provider that delivered the message, once sent.
    pub provider: Option<String>,
    /// Unix timestamp (milliseconds) of the most recent try.
    pub last_attempt_at: Option<u64>,
    pub idempotency_key: IdempotencyKey,
}

impl DispatchRecord {
    /// A fresh record for a key seen for the first time.
    pub fn pending(key: IdempotencyKey) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: DispatchState::Pending,
            attempts: 0,
            provider: None,
            last_attempt_at: None,
            idempotency_key: key,
        }
    }
}

/// Milliseconds since the Unix epoch.
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// The only failure that crosses the engine boundary.
///
/// Provider exhaustion is not an error: it resolves to a `failed` record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("rate limit exceeded, retry after {}ms", retry_after.as_millis())]
    RateLimitExceeded { retry_after: Duration },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_validation() {
        assert_eq!(IdempotencyKey::new("  order-42 ").unwrap().as_str(), "order-42");
        assert_eq!(IdempotencyKey::new("   "), Err(InvalidKey::Empty));
        assert_eq!(
            IdempotencyKey::new("a".repeat(129)),
            Err(InvalidKey::TooLong(IdempotencyKey::MAX_LENGTH))
        );
        assert_eq!(
            IdempotencyKey::new("bad key"),
            Err(InvalidKey::InvalidCharacters)
        );
        assert!(IdempotencyKey::new("tenant:1.order_7-b").is_ok());
    }

    #[test]
    fn test_pending_record() {
        let key = IdempotencyKey::new("k1").unwrap();
        let record = DispatchRecord::pending(key.clone());
        assert_eq!(record.state, DispatchState::Pending);
        assert_eq!(record.attempts, 0);
        assert!(record.provider.is_none());
        assert!(record.last_attempt_at.is_none());
        assert_eq!(record.idempotency_key, key);
        assert!(!record.state.is_terminal());
    }

    #[test]
    fn test_record_serialization() {
        let mut record = DispatchRecord::pending(IdempotencyKey::new("k1").unwrap());
        record.state = DispatchState::Sent;
        record.provider = Some("provider-a".into());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["state"], "sent");
        assert_eq!(json["provider"], "provider-a");
        assert_eq!(json["idempotency_key"], "k1");

        let invalid = serde_json::json!({
            "id": record.id,
            "state": "pending",
            "attempts": 0,
            "provider": null,
            "last_attempt_at": null,
            "idempotency_key": "no spaces allowed",
        });
        assert!(serde_json::from_value::<DispatchRecord>(invalid).is_err());
    }

    #[test]
    fn test_error_display() {
        let err = DispatchError::RateLimitExceeded {
            retry_after: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "rate limit exceeded, retry after 1500ms");
    }
}
