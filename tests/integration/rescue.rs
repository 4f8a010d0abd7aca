//! Rescue commands triggered by HTTP probes
//!
//! These tests verify that:
//! - A failing HTTP check runs the rescue command in its own directory
//! - An overrunning rescue command is killed and still recorded
//! - Overlapping ticks for the same target are skipped

use std::time::Duration;

use chrono::Utc;
use service_guard::{RecoveryAction, TargetMonitor, TickOutcome};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

async fn server_answering(status: u16, delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(status).set_delay(delay))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_unavailable_service_runs_rescue_command() {
    let server = server_answering(503, Duration::ZERO).await;
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "rescue.sh", "echo rescued > marker.txt");

    let context = test_context(FakeServiceManager::new(), dir.path());
    let store = context.store.clone();
    let target = http_target("api", &format!("{}/health", server.uri()), "rescue.sh");
    let monitor = TargetMonitor::new(target, context).unwrap();

    let outcome = monitor.tick_at(Utc::now()).await;

    assert_eq!(
        outcome,
        TickOutcome::Recovered {
            action: RecoveryAction::RescueCommand,
            succeeded: true,
        }
    );
    assert!(dir.path().join("marker.txt").exists());
    assert!(store.get("api").is_some());
}

#[tokio::test]
async fn test_healthy_service_skips_rescue_command() {
    let server = server_answering(200, Duration::ZERO).await;
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "rescue.sh", "echo rescued > marker.txt");

    let context = test_context(FakeServiceManager::new(), dir.path());
    let store = context.store.clone();
    let target = http_target("api", &format!("{}/health", server.uri()), "rescue.sh");
    let monitor = TargetMonitor::new(target, context).unwrap();

    assert_eq!(monitor.tick_at(Utc::now()).await, TickOutcome::Healthy);
    assert!(!dir.path().join("marker.txt").exists());
    assert!(store.get("api").is_none());
}

#[tokio::test]
async fn test_hanging_rescue_command_is_killed_and_recorded() {
    let server = server_answering(500, Duration::ZERO).await;
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "hang.sh", "exec sleep 30");

    let context = test_context(FakeServiceManager::new(), dir.path())
        .with_rescue_timeout(Duration::from_millis(300));
    let store = context.store.clone();
    let target = http_target("api", &format!("{}/health", server.uri()), "hang.sh");
    let monitor = TargetMonitor::new(target, context).unwrap();

    let started = std::time::Instant::now();
    let outcome = monitor.tick_at(Utc::now()).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(
        outcome,
        TickOutcome::Recovered {
            action: RecoveryAction::RescueCommand,
            succeeded: false,
        }
    );
    assert!(store.get("api").is_some());
}

#[tokio::test]
async fn test_overlapping_ticks_are_skipped() {
    let server = server_answering(200, Duration::from_millis(500)).await;
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "rescue.sh", "true");

    let target = http_target("api", &format!("{}/health", server.uri()), "rescue.sh");
    let monitor =
        TargetMonitor::new(target, test_context(FakeServiceManager::new(), dir.path())).unwrap();

    let now = Utc::now();
    let (first, second) = tokio::join!(monitor.tick_at(now), monitor.tick_at(now));

    assert_eq!(first, TickOutcome::Healthy);
    assert_eq!(second, TickOutcome::Busy);
    assert!(!monitor.is_busy());
}
