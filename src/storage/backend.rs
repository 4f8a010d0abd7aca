//! Store trait definition
//!
//! This module defines the `LastActionStore` trait every store
//! implementation must satisfy.

use chrono::{DateTime, Utc};

/// Concurrency-safe map from target name to the time of its last recovery attempt
///
/// ## Atomicity
///
/// - `upsert` is atomic with respect to concurrent `get`/`upsert` on any key:
///   a reader sees either the old or the new timestamp, never a torn value.
/// - Two concurrent `upsert` calls on the same key leave exactly one of the
///   two timestamps behind.
/// - `remove` is idempotent.
///
/// ## Keys
///
/// Keys are target names and must be compared case-insensitively.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` as they are shared by every
/// monitor task.
pub trait LastActionStore: Send + Sync {
    /// Time of the last recorded recovery attempt for `name`
    fn get(&self, name: &str) -> Option<DateTime<Utc>>;

    /// Record `at` as the last recovery attempt for `name`, replacing any previous value
    fn upsert(&self, name: &str, at: DateTime<Utc>);

    /// Forget `name`. Removing an absent key is a no-op.
    fn remove(&self, name: &str);
}
