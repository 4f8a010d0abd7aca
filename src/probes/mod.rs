//! Health probes
//!
//! A `StatusProbe` answers "is this target alive right now?". The variant is
//! chosen once when a target is set up, from its configured diagnostic type:
//!
//! - **NativeService**: service manager state, recovered by a native restart
//! - **ProcessName**: at least one process with the configured image name
//! - **HttpRequest**: GET on the configured URL answers 200 or 304
//!
//! The non-native variants cannot restart anything themselves and always
//! carry a rescue command.

pub mod http;
pub mod native;
pub mod process;

use std::path::{Path, PathBuf};

use crate::config::{DiagnosticType, Target};
use crate::context::MonitorContext;
use crate::error::{GuardError, GuardResult};

pub use http::HttpProbe;
pub use native::{NativeServiceProbe, ServiceManager, ServiceState, Systemctl};
pub use process::ProcessProbe;

/// Health of a target at the time of a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthResult {
    Running,
    Stopped,
    Unknown,
}

impl HealthResult {
    pub fn is_running(&self) -> bool {
        matches!(self, HealthResult::Running)
    }
}

/// Result of one probe call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub health: HealthResult,

    /// Recovery executable configured for the target, relative to the base directory
    pub rescue_cmd: Option<PathBuf>,
}

/// How an unhealthy target is brought back
#[derive(Debug, Clone, Copy)]
pub enum Recovery<'a> {
    /// Stop (if needed) and start through the service manager
    NativeRestart(&'a NativeServiceProbe),

    /// Run the rescue command, relative to the base directory
    RescueCommand(&'a Path),
}

#[derive(Debug, Clone)]
pub enum StatusProbe {
    NativeService(NativeServiceProbe),
    ProcessName {
        probe: ProcessProbe,
        rescue_cmd: PathBuf,
    },
    HttpRequest {
        probe: HttpProbe,
        rescue_cmd: PathBuf,
    },
}

impl StatusProbe {
    /// Pick and configure the probe for `target`
    ///
    /// Fails with `GuardError::Configuration` when a ProcessName or
    /// HttpRequest target lacks its diagnostic argument or rescue command.
    pub fn for_target(target: &Target, context: &MonitorContext) -> GuardResult<Self> {
        match target.kind {
            DiagnosticType::NativeService => {
                let service = target.argument.as_deref().unwrap_or(&target.name);
                Ok(StatusProbe::NativeService(NativeServiceProbe::new(
                    service,
                    context.services.clone(),
                )))
            }
            DiagnosticType::ProcessName => {
                let (image, rescue_cmd) = required_settings(target)?;
                Ok(StatusProbe::ProcessName {
                    probe: ProcessProbe::new(image),
                    rescue_cmd,
                })
            }
            DiagnosticType::HttpRequest => {
                let (url, rescue_cmd) = required_settings(target)?;
                Ok(StatusProbe::HttpRequest {
                    probe: HttpProbe::new(
                        &target.name,
                        &url,
                        context.http_timeout,
                        context.http.clone(),
                    )?,
                    rescue_cmd,
                })
            }
        }
    }

    pub fn kind(&self) -> DiagnosticType {
        match self {
            StatusProbe::NativeService(_) => DiagnosticType::NativeService,
            StatusProbe::ProcessName { .. } => DiagnosticType::ProcessName,
            StatusProbe::HttpRequest { .. } => DiagnosticType::HttpRequest,
        }
    }

    /// Recovery used for this probe's target, fixed at setup
    pub fn recovery(&self) -> Recovery<'_> {
        match self {
            StatusProbe::NativeService(probe) => Recovery::NativeRestart(probe),
            StatusProbe::ProcessName { rescue_cmd, .. }
            | StatusProbe::HttpRequest { rescue_cmd, .. } => Recovery::RescueCommand(rescue_cmd),
        }
    }

    fn rescue_cmd(&self) -> Option<&Path> {
        match self.recovery() {
            Recovery::NativeRestart(_) => None,
            Recovery::RescueCommand(path) => Some(path),
        }
    }

    pub async fn probe(&self) -> ProbeOutcome {
        let health = match self {
            StatusProbe::NativeService(probe) => probe.probe().await,
            StatusProbe::ProcessName { probe, .. } => probe.probe().await,
            StatusProbe::HttpRequest { probe, .. } => probe.probe().await,
        };

        ProbeOutcome {
            health,
            rescue_cmd: self.rescue_cmd().map(Path::to_path_buf),
        }
    }
}

fn required_settings(target: &Target) -> GuardResult<(String, PathBuf)> {
    let argument = target.argument.clone().ok_or_else(|| {
        GuardError::Configuration(format!(
            "target {}: diagnostic_argument is required for {:?} probes",
            target.name, target.kind
        ))
    })?;

    let rescue_cmd = target.rescue_cmd.clone().ok_or_else(|| {
        GuardError::Configuration(format!(
            "target {}: rescue_cmd_path is required for {:?} probes",
            target.name, target.kind
        ))
    })?;

    Ok((argument, rescue_cmd))
}
