//! Monitor actor lifecycle
//!
//! These tests verify that:
//! - An actor whose handles are all dropped stops ticking
//! - Shutdown waits for a forced tick that is still recovering

use std::time::Duration;

use service_guard::probes::native::ServiceState;
use service_guard::{MonitorHandle, Target, TargetMonitor};

use crate::helpers::*;

/// Native target that is recovered on every tick while it stays down
fn flapping_target(name: &str, interval: Duration) -> Target {
    Target {
        interval,
        debounce: Duration::ZERO,
        ..native_target(name)
    }
}

#[tokio::test]
async fn test_dropped_handle_stops_actor() {
    let dir = tempfile::tempdir().unwrap();
    let services = FakeServiceManager::new().with_service("nginx", ServiceState::Stopped);
    services.set_start_brings_up(false);

    let monitor = TargetMonitor::new(
        flapping_target("nginx", Duration::from_secs(1)),
        test_context(services.clone(), dir.path()),
    )
    .unwrap();
    let handle = MonitorHandle::spawn(monitor);

    // first tick fires right away and fails to bring the service up
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(services.starts(), 1);

    drop(handle);
    tokio::time::sleep(Duration::from_millis(3500)).await;

    assert_eq!(services.starts(), 1);
}

#[tokio::test]
async fn test_shutdown_waits_for_forced_tick() {
    let dir = tempfile::tempdir().unwrap();
    let services = FakeServiceManager::new().with_service("nginx", ServiceState::Stopped);
    services.set_start_brings_up(false);

    let context = test_context(services.clone(), dir.path())
        .with_service_wait(Duration::from_millis(800));
    let store = context.store.clone();

    let monitor =
        TargetMonitor::new(flapping_target("nginx", Duration::from_secs(60)), context).unwrap();
    let handle = MonitorHandle::spawn(monitor);

    // let the timer's first tick run out its wait
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(services.starts(), 1);
    let first_attempt = store.get("nginx").unwrap();

    // send a forced tick without waiting for its outcome
    let pending = tokio::time::timeout(Duration::from_millis(100), handle.check_now()).await;
    assert!(pending.is_err());
    assert_eq!(services.starts(), 2);

    handle.shutdown().await;

    // the forced tick finished and recorded its attempt before shutdown returned
    let second_attempt = store.get("nginx").unwrap();
    assert!(second_attempt > first_attempt);
}
