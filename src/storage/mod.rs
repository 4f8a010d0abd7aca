//! Bookkeeping of recovery attempts shared by all target monitors
//!
//! This module provides a trait-based abstraction for the "time of last
//! recovery action" map, so monitors never reach for process-wide state and
//! tests can hand each monitor an isolated store.
//!
//! ## Design
//!
//! - **Trait-based**: `LastActionStore` allows swapping implementations
//! - **Synchronous**: operations are short map accesses, never held across `.await`
//! - **Case-insensitive keys**: target names are compared ignoring ASCII case
//!
//! ## Backends
//!
//! - **In-Memory** (default): `RwLock`-guarded map, cleared on process restart
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use chrono::Utc;
//! use service_guard::storage::{LastActionStore, memory::MemoryStore};
//!
//! let store: Arc<dyn LastActionStore> = Arc::new(MemoryStore::new());
//! store.upsert("nginx", Utc::now());
//! assert!(store.get("NGINX").is_some());
//! ```

pub mod backend;
pub mod memory;

pub use backend::LastActionStore;
pub use memory::MemoryStore;
