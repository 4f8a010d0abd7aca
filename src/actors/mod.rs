//! Actor-based watchdog
//!
//! Each watched target runs as an independent monitor actor on the Tokio
//! runtime. Timers share the runtime's worker pool rather than owning a
//! thread each, so ticks of different targets may run concurrently.
//!
//! ## Architecture Overview
//!
//! ```text
//!                 ┌────────────────────┐
//!                 │ MonitorSupervisor  │
//!                 └─────────┬──────────┘
//!                           │ spawns one per target
//!           ┌───────────────┼───────────────┐
//!           │               │               │
//!   ┌───────▼───────┐       │       ┌───────▼───────┐
//!   │ TargetMonitor │       │       │ TargetMonitor │
//!   │  (nginx)      │       │       │  (api)        │
//!   └───────┬───────┘       │       └───────┬───────┘
//!           │               │               │
//!           └───────────────┼───────────────┘
//!                           │ get / upsert
//!                 ┌─────────▼──────────┐
//!                 │  LastActionStore   │
//!                 └────────────────────┘
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: each monitor has an mpsc command channel (CheckNow, Shutdown)
//! 2. **Request/Response**: oneshot channels return tick outcomes
//! 3. **Shared state**: only the `LastActionStore`, passed in at construction

pub mod messages;
pub mod supervisor;
pub mod target_monitor;
