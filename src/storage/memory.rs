//! In-memory last-action store (no persistence)
//!
//! A single coarse `RwLock` guards the map. Writes happen once per recovery
//! attempt rather than once per tick, so unrelated targets never contend in
//! practice while health checks read concurrently.
//!
//! ## Limitations
//!
//! - **No persistence**: all records are lost on restart

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::trace;

use super::backend::LastActionStore;

/// In-memory store backed by a `RwLock<HashMap>`
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Timestamps keyed by lowercased target name
    entries: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of targets with a recorded attempt
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panicking writer cannot leave a half-written timestamp behind, so a
    // poisoned lock still holds consistent data.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl LastActionStore for MemoryStore {
    fn get(&self, name: &str) -> Option<DateTime<Utc>> {
        self.read().get(&key(name)).copied()
    }

    fn upsert(&self, name: &str, at: DateTime<Utc>) {
        trace!("recording last action for {name} at {at}");
        self.write().insert(key(name), at);
    }

    fn remove(&self, name: &str) {
        self.write().remove(&key(name));
    }
}
