//! Dependencies shared by every target monitor
//!
//! Everything a monitor touches outside itself is passed in here at
//! construction time, so tests can hand each case an isolated store and a
//! scripted service manager.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::GuardResult;
use crate::executor::BoundedExecutor;
use crate::probes::http::build_client;
use crate::probes::native::{ServiceManager, Systemctl};
use crate::storage::{LastActionStore, MemoryStore};

#[derive(Clone)]
pub struct MonitorContext {
    /// Last recovery attempt per target
    pub store: Arc<dyn LastActionStore>,

    /// Native service control
    pub services: Arc<dyn ServiceManager>,

    pub executor: BoundedExecutor,

    /// Client shared by all HTTP probes
    pub http: reqwest::Client,

    pub http_timeout: Duration,

    /// Directory rescue command paths are resolved against
    pub base_dir: PathBuf,

    /// Time limit requested for rescue commands
    pub rescue_timeout: Duration,

    /// Bound on each native wait-for-status
    pub service_wait: Duration,
}

impl MonitorContext {
    /// Context with an in-memory store and the system's service manager
    pub fn new(config: &Config, base_dir: PathBuf) -> GuardResult<Self> {
        let services: Arc<dyn ServiceManager> = if config.user_services {
            Arc::new(Systemctl::user())
        } else {
            Arc::new(Systemctl::system())
        };

        Self::with_parts(config, base_dir, Arc::new(MemoryStore::new()), services)
    }

    /// Context built around the given store and service manager
    pub fn with_parts(
        config: &Config,
        base_dir: PathBuf,
        store: Arc<dyn LastActionStore>,
        services: Arc<dyn ServiceManager>,
    ) -> GuardResult<Self> {
        Ok(Self {
            store,
            services,
            executor: BoundedExecutor::new(),
            http: build_client()?,
            http_timeout: config.http_timeout(),
            base_dir,
            rescue_timeout: config.rescue_timeout(),
            service_wait: config.service_wait(),
        })
    }

    /// Replace the executor, e.g. with a lower minimum time limit
    pub fn with_executor(mut self, executor: BoundedExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_service_wait(mut self, wait: Duration) -> Self {
        self.service_wait = wait;
        self
    }

    pub fn with_rescue_timeout(mut self, timeout: Duration) -> Self {
        self.rescue_timeout = timeout;
        self
    }
}
