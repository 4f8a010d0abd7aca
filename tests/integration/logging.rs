//! Severity of what the watchdog reports
//!
//! These tests verify that:
//! - A target with incomplete settings is excluded with an error while the others start
//! - A non-OK HTTP status is reported at info level together with the status code

use std::time::Duration;

use service_guard::probes::HttpProbe;
use service_guard::probes::http::build_client;
use service_guard::probes::native::ServiceState;
use service_guard::{Config, HealthResult, MonitorSupervisor};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_misconfigured_target_logged_and_others_started() {
    let (logs, _guard) = LogCapture::install();
    let dir = tempfile::tempdir().unwrap();
    let services = FakeServiceManager::new().with_service("sshd", ServiceState::Running);

    let config: Config = serde_json::from_value(serde_json::json!({
        "targets": {
            "worker": {
                "diagnostic_type": "process_name",
                "diagnostic_argument": "worker"
            }
        }
    }))
    .unwrap();

    let mut supervisor =
        MonitorSupervisor::new(config, "worker sshd", 1000.0, test_context(services, dir.path()));

    assert_eq!(supervisor.start().await, 1);
    assert!(supervisor.monitor("sshd").is_some());
    assert!(supervisor.monitor("worker").is_none());

    let errors = logs.lines_with(&["ERROR", "worker", "rescue_cmd_path"]);
    assert_eq!(errors.len(), 1, "logs:\n{}", logs.contents());

    supervisor.stop().await;
}

#[tokio::test]
async fn test_unavailable_status_logged_at_info() {
    let (logs, _guard) = LogCapture::install();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let probe = HttpProbe::new(
        "api",
        &format!("{}/health", server.uri()),
        Duration::from_secs(2),
        build_client().unwrap(),
    )
    .unwrap();

    assert_eq!(probe.probe().await, HealthResult::Stopped);

    let lines = logs.lines_with(&["INFO", "status=503"]);
    assert_eq!(lines.len(), 1, "logs:\n{}", logs.contents());
    assert!(logs.lines_with(&["ERROR"]).is_empty());
    assert!(logs.lines_with(&["WARN"]).is_empty());
}
