//! Message types for monitor communication
//!
//! ## Design Principles
//!
//! 1. **Commands**: control messages sent to a single monitor actor via mpsc
//! 2. **Outcomes**: every tick reports what it did, so callers and tests can
//!    observe the state machine without scraping logs

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

/// Commands that can be sent to a monitor actor
#[derive(Debug)]
pub enum MonitorCommand {
    /// Run a tick immediately, bypassing the interval timer
    CheckNow {
        /// Channel to send the outcome back
        respond_to: oneshot::Sender<TickOutcome>,
    },

    /// Stop the timer and exit
    ///
    /// A tick already in progress is allowed to finish.
    Shutdown,
}

/// Where a monitor currently is in its tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MonitorState {
    Idle = 0,
    Probing = 1,
    Recovering = 2,
}

impl From<u8> for MonitorState {
    fn from(value: u8) -> Self {
        match value {
            1 => MonitorState::Probing,
            2 => MonitorState::Recovering,
            _ => MonitorState::Idle,
        }
    }
}

/// What a recovery attempt consisted of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Stop (if needed) and start through the service manager
    NativeRestart,

    /// Run the configured rescue command
    RescueCommand,

    /// The configured rescue command does not exist on disk
    MissingRescueCommand,
}

/// Result of a single tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The previous tick for this target was still running
    Busy,

    /// The probe reported the target as running
    Healthy,

    /// Unhealthy, but the last recovery attempt is still inside the debounce window
    DebounceSkip { last_action: DateTime<Utc> },

    /// A recovery attempt was made and recorded
    Recovered {
        action: RecoveryAction,
        succeeded: bool,
    },
}

impl TickOutcome {
    pub fn attempted_recovery(&self) -> bool {
        matches!(self, TickOutcome::Recovered { .. })
    }
}
