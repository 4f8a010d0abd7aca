pub mod actors;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod probes;
pub mod storage;
pub mod util;

pub use actors::messages::{MonitorState, RecoveryAction, TickOutcome};
pub use actors::supervisor::{MonitorSupervisor, parse_target_list};
pub use actors::target_monitor::{MonitorHandle, TargetMonitor};
pub use config::{Config, DiagnosticType, Target};
pub use context::MonitorContext;
pub use error::{GuardError, GuardResult};
pub use executor::{BoundedExecutor, ExecOutcome};
pub use probes::{HealthResult, ProbeOutcome, Recovery, StatusProbe};
