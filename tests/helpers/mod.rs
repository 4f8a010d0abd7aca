//! Test helpers and utilities for integration tests

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use service_guard::{
    BoundedExecutor, Config, DiagnosticType, GuardError, GuardResult, MonitorContext, Target,
    probes::native::{ServiceManager, ServiceState},
    storage::MemoryStore,
};

/// Service manager with scripted state
///
/// `stop` moves a service to Stopped (unless told to fail); `start` only
/// brings it up when `start_brings_up` is set, which lets tests model a
/// service that keeps failing.
#[derive(Default)]
pub struct FakeServiceManager {
    services: Mutex<HashMap<String, ServiceState>>,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    fail_stop: AtomicBool,
    start_brings_up: AtomicBool,
}

impl FakeServiceManager {
    pub fn new() -> Arc<Self> {
        let manager = Self::default();
        manager.start_brings_up.store(true, Ordering::SeqCst);
        Arc::new(manager)
    }

    pub fn with_service(self: Arc<Self>, name: &str, state: ServiceState) -> Arc<Self> {
        self.set_state(name, state);
        self
    }

    pub fn set_state(&self, name: &str, state: ServiceState) {
        self.services
            .lock()
            .unwrap()
            .insert(name.to_ascii_lowercase(), state);
    }

    pub fn state(&self, name: &str) -> Option<ServiceState> {
        self.services
            .lock()
            .unwrap()
            .get(&name.to_ascii_lowercase())
            .copied()
    }

    pub fn set_fail_stop(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::SeqCst);
    }

    pub fn set_start_brings_up(&self, brings_up: bool) {
        self.start_brings_up.store(brings_up, Ordering::SeqCst);
    }

    pub fn starts(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceManager for FakeServiceManager {
    async fn exists(&self, service: &str) -> GuardResult<bool> {
        Ok(self.state(service).is_some())
    }

    async fn status(&self, service: &str) -> GuardResult<ServiceState> {
        self.state(service)
            .ok_or_else(|| GuardError::ServiceControl(format!("unknown service {service}")))
    }

    async fn start(&self, service: &str) -> GuardResult<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if self.start_brings_up.load(Ordering::SeqCst) {
            self.set_state(service, ServiceState::Running);
        }
        Ok(())
    }

    async fn stop(&self, service: &str) -> GuardResult<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(GuardError::ServiceControl(format!(
                "access denied stopping {service}"
            )));
        }
        self.set_state(service, ServiceState::Stopped);
        Ok(())
    }
}

/// Context with an isolated store, short time limits and the given service manager
pub fn test_context(services: Arc<FakeServiceManager>, base_dir: &Path) -> MonitorContext {
    MonitorContext::with_parts(
        &Config::default(),
        base_dir.to_path_buf(),
        Arc::new(MemoryStore::new()),
        services,
    )
    .unwrap()
    .with_executor(BoundedExecutor::with_minimum_timeout(Duration::from_millis(500)))
    .with_rescue_timeout(Duration::from_secs(5))
    .with_service_wait(Duration::from_millis(100))
}

pub fn native_target(name: &str) -> Target {
    Target {
        name: name.to_string(),
        interval: Duration::from_millis(1000),
        kind: DiagnosticType::NativeService,
        argument: None,
        rescue_cmd: None,
        debounce: Duration::from_secs(10),
    }
}

pub fn http_target(name: &str, url: &str, rescue_cmd: &str) -> Target {
    Target {
        name: name.to_string(),
        interval: Duration::from_millis(1000),
        kind: DiagnosticType::HttpRequest,
        argument: Some(url.to_string()),
        rescue_cmd: Some(PathBuf::from(rescue_cmd)),
        debounce: Duration::from_secs(10),
    }
}

/// Write an executable shell script into `dir`
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Log lines written while a `LogCapture` is installed on the current thread
///
/// Only sees events from the current-thread runtime used by `#[tokio::test]`.
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Install a subscriber capturing this crate's events until the returned guard is dropped
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        use tracing_subscriber::layer::SubscriberExt;

        let capture = Self::default();
        let subscriber = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(capture.clone())
                    .with_ansi(false),
            )
            .with(
                tracing_subscriber::filter::Targets::new()
                    .with_target("service_guard", tracing::level_filters::LevelFilter::TRACE),
            );

        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }

    /// Captured lines containing every one of `needles`
    pub fn lines_with(&self, needles: &[&str]) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| needles.iter().all(|needle| line.contains(needle)))
            .map(str::to_string)
            .collect()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
