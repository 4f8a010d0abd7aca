//! Native service manager access
//!
//! The `ServiceManager` trait is the seam to the operating system's service
//! control. `Systemctl` drives systemd; tests plug in their own implementation.

use std::process::Output;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{GuardError, GuardResult};

use super::HealthResult;

/// How often a pending state change is re-queried
const STATUS_POLL: Duration = Duration::from_millis(250);

/// State of a native service as reported by the service manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Running,
    Stopped,
    StartPending,
    StopPending,
    Unknown,
}

impl ServiceState {
    /// Map the output of `systemctl is-active`
    pub fn from_systemctl(active_state: &str) -> Self {
        match active_state.trim() {
            "active" => ServiceState::Running,
            "inactive" | "failed" => ServiceState::Stopped,
            "activating" | "reloading" => ServiceState::StartPending,
            "deactivating" => ServiceState::StopPending,
            _ => ServiceState::Unknown,
        }
    }
}

impl From<ServiceState> for HealthResult {
    fn from(state: ServiceState) -> Self {
        match state {
            ServiceState::Running => HealthResult::Running,
            ServiceState::Stopped => HealthResult::Stopped,
            _ => HealthResult::Unknown,
        }
    }
}

/// Operating system service control
#[async_trait]
pub trait ServiceManager: Send + Sync {
    /// Whether the service is known to the service manager
    async fn exists(&self, service: &str) -> GuardResult<bool>;

    async fn status(&self, service: &str) -> GuardResult<ServiceState>;

    /// Request a start; does not wait for the service to come up
    async fn start(&self, service: &str) -> GuardResult<()>;

    /// Request a stop; does not wait for the service to go down
    async fn stop(&self, service: &str) -> GuardResult<()>;
}

/// systemd backend driving `systemctl`
#[derive(Debug, Clone, Default)]
pub struct Systemctl {
    user: bool,
}

impl Systemctl {
    /// Talk to the system instance
    pub fn system() -> Self {
        Self { user: false }
    }

    /// Talk to the per-user instance (`systemctl --user`)
    pub fn user() -> Self {
        Self { user: true }
    }

    async fn systemctl(&self, args: &[&str]) -> GuardResult<Output> {
        let mut command = Command::new("systemctl");
        if self.user {
            command.arg("--user");
        }
        trace!("systemctl {}", args.join(" "));

        command.args(args).output().await.map_err(|e| {
            GuardError::ServiceControl(format!("failed to execute systemctl {}: {e}", args[0]))
        })
    }

    async fn control(&self, verb: &str, service: &str) -> GuardResult<()> {
        let output = self.systemctl(&[verb, service]).await?;

        if !output.status.success() {
            return Err(GuardError::ServiceControl(format!(
                "systemctl {verb} {service} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl ServiceManager for Systemctl {
    async fn exists(&self, service: &str) -> GuardResult<bool> {
        let output = self
            .systemctl(&["show", "--property=LoadState", "--value", service])
            .await?;
        let load_state = String::from_utf8_lossy(&output.stdout);
        let load_state = load_state.trim();

        Ok(output.status.success() && !load_state.is_empty() && load_state != "not-found")
    }

    async fn status(&self, service: &str) -> GuardResult<ServiceState> {
        // is-active exits non-zero for anything but "active", the text is what matters
        let output = self.systemctl(&["is-active", service]).await?;
        Ok(ServiceState::from_systemctl(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }

    async fn start(&self, service: &str) -> GuardResult<()> {
        self.control("start", service).await
    }

    async fn stop(&self, service: &str) -> GuardResult<()> {
        self.control("stop", service).await
    }
}

/// Poll `service` until it reports `desired` or `bound` has passed
pub async fn wait_for_status(
    manager: &dyn ServiceManager,
    service: &str,
    desired: ServiceState,
    bound: Duration,
) -> GuardResult<()> {
    let deadline = Instant::now() + bound;

    loop {
        let state = manager.status(service).await?;
        if state == desired {
            return Ok(());
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(GuardError::ServiceControl(format!(
                "{service} did not reach {desired:?} within {bound:?} (last seen {state:?})"
            )));
        }

        tokio::time::sleep(STATUS_POLL.min(deadline - now)).await;
    }
}

/// Restart a native service: stop it if needed, then start it
///
/// A failing stop aborts the procedure before anything is started.
#[instrument(skip(manager, wait))]
pub async fn restart_service(
    manager: &dyn ServiceManager,
    service: &str,
    wait: Duration,
) -> GuardResult<()> {
    let state = manager.status(service).await?;
    debug!("current state {state:?}");

    match state {
        ServiceState::Running => {
            info!("service {service} is running, stopping it");
            manager.stop(service).await?;
            wait_for_status(manager, service, ServiceState::Stopped, wait).await?;
        }
        ServiceState::StopPending => {
            wait_for_status(manager, service, ServiceState::Stopped, wait).await?;
        }
        ServiceState::StartPending => {
            warn!("service {service} is already starting, waiting for it");
            return wait_for_status(manager, service, ServiceState::Running, wait).await;
        }
        ServiceState::Stopped | ServiceState::Unknown => {}
    }

    info!("starting service {service}");
    manager.start(service).await?;
    wait_for_status(manager, service, ServiceState::Running, wait).await?;
    info!("service {service} restarted");

    Ok(())
}

/// Probe asking the service manager for the state of one service
#[derive(Clone)]
pub struct NativeServiceProbe {
    service: String,
    manager: Arc<dyn ServiceManager>,
}

impl NativeServiceProbe {
    pub fn new(service: impl Into<String>, manager: Arc<dyn ServiceManager>) -> Self {
        Self {
            service: service.into(),
            manager,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn manager(&self) -> &dyn ServiceManager {
        self.manager.as_ref()
    }

    pub async fn probe(&self) -> HealthResult {
        match self.manager.status(&self.service).await {
            Ok(state) => state.into(),
            Err(e) => {
                warn!("could not query {}: {e}", self.service);
                HealthResult::Unknown
            }
        }
    }
}

impl std::fmt::Debug for NativeServiceProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeServiceProbe")
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}
