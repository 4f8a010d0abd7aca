//! MonitorSupervisor - one monitor per configured target
//!
//! Fans a target list out into `TargetMonitor` actors and starts/stops them
//! as a group. Setup problems of one target never affect the others.

use std::collections::HashSet;

use futures::future::join_all;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::{Config, DiagnosticType};
use crate::context::MonitorContext;
use crate::error::GuardResult;

use super::target_monitor::{MonitorHandle, TargetMonitor};

/// Split a target list on whitespace, ',' and ';'
pub fn parse_target_list(list: &str) -> Vec<String> {
    list.split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct MonitorSupervisor {
    config: Config,
    target_list: String,
    default_duration_ms: f64,
    context: MonitorContext,
    monitors: Vec<MonitorHandle>,
}

impl MonitorSupervisor {
    pub fn new(
        config: Config,
        target_list: impl Into<String>,
        default_duration_ms: f64,
        context: MonitorContext,
    ) -> Self {
        Self {
            config,
            target_list: target_list.into(),
            default_duration_ms,
            context,
            monitors: vec![],
        }
    }

    /// Names from the target list, in order
    pub fn targets(&self) -> Vec<String> {
        parse_target_list(&self.target_list)
    }

    pub fn monitors(&self) -> &[MonitorHandle] {
        &self.monitors
    }

    pub fn monitor(&self, name: &str) -> Option<&MonitorHandle> {
        self.monitors
            .iter()
            .find(|handle| handle.target_name().eq_ignore_ascii_case(name))
    }

    pub fn is_running(&self) -> bool {
        !self.monitors.is_empty()
    }

    pub fn context(&self) -> &MonitorContext {
        &self.context
    }

    /// Create and start one monitor per usable target
    ///
    /// Returns the number of running monitors.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> usize {
        if self.is_running() {
            warn!("monitors are already running");
            return self.monitors.len();
        }

        let mut seen = HashSet::new();
        for name in self.targets() {
            if !seen.insert(name.to_ascii_lowercase()) {
                debug!("{name} is listed more than once");
                continue;
            }

            match self.prepare(&name).await {
                Ok(Some(monitor)) => {
                    info!(
                        "watching {name} every {:?} ({:?})",
                        monitor.target().interval,
                        monitor.probe().kind()
                    );
                    self.monitors.push(MonitorHandle::spawn(monitor));
                }
                Ok(None) => {}
                Err(e) => error!("not watching {name}: {e}"),
            }
        }

        self.monitors.len()
    }

    async fn prepare(&self, name: &str) -> GuardResult<Option<TargetMonitor>> {
        let target = self
            .config
            .resolve_target(name, self.default_duration_ms);

        if target.kind == DiagnosticType::NativeService {
            let service = target.argument.as_deref().unwrap_or(name);
            match self.context.services.exists(service).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!("service {service} does not exist, skipping {name}");
                    return Ok(None);
                }
                Err(e) => {
                    warn!("could not look up service {service}, skipping {name}: {e}");
                    return Ok(None);
                }
            }
        }

        TargetMonitor::new(target, self.context.clone()).map(Some)
    }

    /// Stop all monitors and forget them
    ///
    /// Safe to call when nothing is running.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) {
        if self.monitors.is_empty() {
            trace!("no monitors to stop");
            return;
        }

        info!("stopping {} monitors", self.monitors.len());
        join_all(self.monitors.drain(..).map(MonitorHandle::shutdown)).await;
    }
}
