//! Registry of keys that reached a successful terminal dispatch.
//!
//! This is only a fast short-circuit in front of the status tracker, which
//! holds the authoritative record for every key.

use std::sync::Arc;

use dashmap::DashSet;

use crate::dispatch::types::IdempotencyKey;

/// Thread-safe set of completed idempotency keys.
#[derive(Debug, Clone, Default)]
pub struct IdempotencyGuard {
    completed: Arc<DashSet<IdempotencyKey>>,
}

impl IdempotencyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember that `key` was delivered.
    pub fn register(&self, key: &IdempotencyKey) {
        self.completed.insert(key.clone());
    }

    /// Whether `key` is known to have been delivered.
    pub fn is_completed(&self, key: &IdempotencyKey) -> bool {
        self.completed.contains(key)
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let guard = IdempotencyGuard::new();
        let key = IdempotencyKey::new("welcome-mail-1").unwrap();

        assert!(!guard.is_completed(&key));
        assert!(guard.is_empty());

        guard.register(&key);
        guard.register(&key);
        assert!(guard.is_completed(&key));
        assert_eq!(guard.len(), 1);

        // Clones share the same registry.
        let other = guard.clone();
        assert!(other.is_completed(&key));
    }
}
