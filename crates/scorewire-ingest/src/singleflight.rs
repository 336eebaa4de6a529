//! Per-key single-flight guard.
//!
//! At most one pipeline cycle runs per external key at a time. A second
//! poll for the same key while one is in flight is skipped, not queued;
//! the next scheduled poll carries fresher data anyway.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// The set of keys with a cycle currently in flight.
#[derive(Debug, Default)]
pub struct KeyLeases {
    in_flight: Mutex<HashSet<String>>,
}

impl KeyLeases {
    /// An empty lease set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take the lease for a key.
    ///
    /// Returns `None` when a cycle for the key is already in flight. The
    /// returned guard releases the lease on drop, including on panic and
    /// early return.
    pub fn try_acquire(self: &Arc<Self>, key: &str) -> Option<KeyLease> {
        let mut held = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if held.insert(key.to_owned()) {
            Some(KeyLease {
                leases: Arc::clone(self),
                key: key.to_owned(),
            })
        } else {
            None
        }
    }
}

/// RAII lease on one key. Dropping it releases the key.
#[derive(Debug)]
pub struct KeyLease {
    leases: Arc<KeyLeases>,
    key: String,
}

impl Drop for KeyLease {
    fn drop(&mut self) {
        let mut held = self
            .leases
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        held.remove(&self.key);
    }
}
