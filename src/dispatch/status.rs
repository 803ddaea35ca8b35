//! Status tracking for dispatch records.
//!
//! # Responsibilities
//! - Own exactly one `DispatchRecord` per idempotency key
//! - Create records atomically (insert-if-absent)
//! - Apply lifecycle updates in place until the record is terminal
//! - Let concurrent duplicates wait for a record to settle
//!
//! # Design Decisions
//! - One `watch` channel per key: readers clone the latest value, waiters
//!   are woken on every update
//! - The `DashMap` entry API makes check-and-create a single step per key
//! - Records are never removed during the process lifetime

use std::convert::Infallible;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;

use crate::dispatch::idempotency::IdempotencyGuard;
use crate::dispatch::types::{unix_millis, DispatchRecord, DispatchState, IdempotencyKey};

/// Outcome of `StatusTracker::record_if_new`.
#[derive(Debug)]
pub enum Registration {
    /// The key was unseen; a `pending` record now exists for it.
    Created(RecordHandle),
    /// A record already existed for the key.
    Existing(RecordHandle),
}

/// Read-only view of one record that can wait for it to settle.
#[derive(Debug, Clone)]
pub struct RecordHandle {
    rx: watch::Receiver<DispatchRecord>,
}

impl RecordHandle {
    /// Snapshot of the record as it is now.
    pub fn current(&self) -> DispatchRecord {
        self.rx.borrow().clone()
    }

    /// Wait until the record is `sent` or `failed` and return it.
    pub async fn settled(mut self) -> DispatchRecord {
        let settled = self
            .rx
            .wait_for(|record| record.state.is_terminal())
            .await
            .map(|record| record.clone());
        // The sender lives in the tracker map forever, so this only falls
        // back if the tracker itself was dropped.
        settled.unwrap_or_else(|_| self.rx.borrow().clone())
    }
}

/// Map of idempotency key to its latest `DispatchRecord`.
#[derive(Debug, Clone, Default)]
pub struct StatusTracker {
    records: Arc<DashMap<IdempotencyKey, watch::Sender<DispatchRecord>>>,
    guard: IdempotencyGuard,
}

impl StatusTracker {
    pub fn new(guard: IdempotencyGuard) -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            guard,
        }
    }

    /// Create a `pending` record for `key` unless one already exists.
    pub fn record_if_new(&self, key: &IdempotencyKey) -> Registration {
        match self.register_admitted(key, || Ok::<(), Infallible>(())) {
            Ok(registration) => registration,
            Err(never) => match never {},
        }
    }

    /// Like `record_if_new`, but a fresh key must first pass `admit`.
    ///
    /// `admit` runs while the key's shard is locked, so concurrent callers
    /// with the same key never both reach it. An existing record is returned
    /// without calling `admit`; a rejection leaves no record behind.
    pub fn register_admitted<E, F>(&self, key: &IdempotencyKey, admit: F) -> Result<Registration, E>
    where
        F: FnOnce() -> Result<(), E>,
    {
        match self.records.entry(key.clone()) {
            Entry::Occupied(entry) => Ok(Registration::Existing(RecordHandle {
                rx: entry.get().subscribe(),
            })),
            Entry::Vacant(entry) => {
                admit()?;
                let (tx, rx) = watch::channel(DispatchRecord::pending(key.clone()));
                entry.insert(tx);
                Ok(Registration::Created(RecordHandle { rx }))
            }
        }
    }

    /// Handle to an existing record.
    pub fn handle(&self, key: &IdempotencyKey) -> Option<RecordHandle> {
        self.records
            .get(key)
            .map(|tx| RecordHandle { rx: tx.subscribe() })
    }

    /// Read-only lookup for status queries.
    pub fn get(&self, key: &IdempotencyKey) -> Option<DispatchRecord> {
        self.records.get(key).map(|tx| tx.borrow().clone())
    }

    /// Count a new try and stamp its time. Returns the updated attempt count.
    pub fn begin_attempt(&self, key: &IdempotencyKey) -> Option<u32> {
        self.update(key, |record| {
            record.attempts += 1;
            record.last_attempt_at = Some(unix_millis());
        })
        .map(|record| record.attempts)
    }

    /// Transition to `sent`, stamp the provider and register the key as completed.
    pub fn mark_sent(&self, key: &IdempotencyKey, provider: &str) -> Option<DispatchRecord> {
        let record = self.update(key, |record| {
            record.state = DispatchState::Sent;
            record.provider = Some(provider.to_string());
        })?;
        if record.state == DispatchState::Sent {
            self.guard.register(key);
        }
        Some(record)
    }

    /// Transition to `failed`.
    pub fn mark_failed(&self, key: &IdempotencyKey) -> Option<DispatchRecord> {
        self.update(key, |record| record.state = DispatchState::Failed)
    }

    /// Whether the key is known to have been delivered.
    pub fn is_completed(&self, key: &IdempotencyKey) -> bool {
        self.guard.is_completed(key)
    }

    /// Number of tracked records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Apply `f` to a pending record. Terminal records are left untouched.
    fn update<F>(&self, key: &IdempotencyKey, f: F) -> Option<DispatchRecord>
    where
        F: FnOnce(&mut DispatchRecord),
    {
        let tx = self.records.get(key)?;
        tx.send_if_modified(|record| {
            if record.state.is_terminal() {
                return false;
            }
            f(record);
            true
        });
        let record = tx.borrow().clone();
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn key(s: &str) -> IdempotencyKey {
        IdempotencyKey::new(s).unwrap()
    }

    #[test]
    fn test_record_if_new_is_insert_if_absent() {
        let tracker = StatusTracker::default();
        let k = key("k1");

        let first = match tracker.record_if_new(&k) {
            Registration::Created(handle) => handle.current(),
            Registration::Existing(_) => panic!("first registration must create"),
        };
        assert_eq!(first.state, DispatchState::Pending);

        match tracker.record_if_new(&k) {
            Registration::Existing(handle) => assert_eq!(handle.current().id, first.id),
            Registration::Created(_) => panic!("second registration must not create"),
        }
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_admission_only_for_fresh_keys() {
        let tracker = StatusTracker::default();
        let k = key("k1");

        let rejected: Result<Registration, &str> = tracker.register_admitted(&k, || Err("full"));
        assert_eq!(rejected.unwrap_err(), "full");
        assert!(tracker.get(&k).is_none());

        let mut admitted = 0;
        let first = tracker
            .register_admitted(&k, || {
                admitted += 1;
                Ok::<(), &str>(())
            })
            .unwrap();
        assert!(matches!(first, Registration::Created(_)));

        // Known keys never reach the admission check, even one that rejects.
        let again = tracker.register_admitted(&k, || Err("full")).unwrap();
        assert!(matches!(again, Registration::Existing(_)));
        assert_eq!(admitted, 1);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_lifecycle_updates() {
        let tracker = StatusTracker::default();
        let k = key("k1");
        tracker.record_if_new(&k);

        assert_eq!(tracker.begin_attempt(&k), Some(1));
        assert_eq!(tracker.begin_attempt(&k), Some(2));

        let record = tracker.mark_sent(&k, "provider-b").unwrap();
        assert_eq!(record.state, DispatchState::Sent);
        assert_eq!(record.provider.as_deref(), Some("provider-b"));
        assert_eq!(record.attempts, 2);
        assert!(record.last_attempt_at.is_some());
        assert!(tracker.is_completed(&k));
    }

    #[test]
    fn test_terminal_records_are_immutable() {
        let tracker = StatusTracker::default();
        let k = key("k1");
        tracker.record_if_new(&k);
        tracker.mark_sent(&k, "provider-a");

        assert_eq!(tracker.begin_attempt(&k), Some(0));
        let record = tracker.mark_failed(&k).unwrap();
        assert_eq!(record.state, DispatchState::Sent);
        let record = tracker.mark_sent(&k, "provider-b").unwrap();
        assert_eq!(record.provider.as_deref(), Some("provider-a"));
    }

    #[test]
    fn test_failed_is_not_registered_as_completed() {
        let tracker = StatusTracker::default();
        let k = key("k1");
        tracker.record_if_new(&k);
        let record = tracker.mark_failed(&k).unwrap();
        assert_eq!(record.state, DispatchState::Failed);
        assert!(!tracker.is_completed(&k));
    }

    #[test]
    fn test_unknown_key() {
        let tracker = StatusTracker::default();
        let k = key("missing");
        assert!(tracker.get(&k).is_none());
        assert!(tracker.handle(&k).is_none());
        assert!(tracker.begin_attempt(&k).is_none());
        assert!(tracker.mark_sent(&k, "provider-a").is_none());
        assert!(tracker.mark_failed(&k).is_none());
    }

    #[tokio::test]
    async fn test_settled_waits_for_terminal_state() {
        let tracker = StatusTracker::default();
        let k = key("k1");
        tracker.record_if_new(&k);

        let handle = tracker.handle(&k).unwrap();
        let waiter = tokio::spawn(handle.settled());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        tracker.begin_attempt(&k);
        tracker.mark_failed(&k);

        let record = waiter.await.unwrap();
        assert_eq!(record.state, DispatchState::Failed);
        assert_eq!(record.attempts, 1);
    }
}
