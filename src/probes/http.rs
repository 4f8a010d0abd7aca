//! HTTP liveness probe
//!
//! Issues a single uncached GET per check. 200 and 304 count as running;
//! any other status, transport failure or timeout counts as stopped.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{CACHE_CONTROL, CONNECTION};
use tracing::{info, trace, warn};

use crate::error::{GuardError, GuardResult};

use super::HealthResult;

pub const USER_AGENT: &str = "ServiceGuard/1.0 (HttpPing 1.0)";

/// Build the client shared by all HTTP probes
///
/// Connections are never kept alive between checks.
pub fn build_client() -> GuardResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .http1_only()
        .pool_max_idle_per_host(0)
        .build()
        .map_err(|e| GuardError::Configuration(format!("failed to build HTTP client: {e}")))
}

#[derive(Debug, Clone)]
pub struct HttpProbe {
    target: String,
    url: reqwest::Url,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(
        target: impl Into<String>,
        url: &str,
        timeout: Duration,
        client: reqwest::Client,
    ) -> GuardResult<Self> {
        let target = target.into();
        let url = reqwest::Url::parse(url).map_err(|e| {
            GuardError::Configuration(format!("target {target}: invalid URL '{url}': {e}"))
        })?;

        Ok(Self {
            target,
            url,
            timeout,
            client,
        })
    }

    pub fn url(&self) -> &reqwest::Url {
        &self.url
    }

    pub async fn probe(&self) -> HealthResult {
        trace!("pinging {}", self.url);

        let request = self
            .client
            .get(self.url.clone())
            .timeout(self.timeout)
            .header(CACHE_CONTROL, "no-cache")
            .header(CONNECTION, "close");

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status == StatusCode::OK || status == StatusCode::NOT_MODIFIED {
                    HealthResult::Running
                } else {
                    info!(
                        status = status.as_u16(),
                        "{} answered with {status}, treating it as stopped", self.target
                    );
                    HealthResult::Stopped
                }
            }
            Err(e) if e.is_timeout() => {
                info!(
                    "{} did not answer within {:?}, treating it as stopped",
                    self.target, self.timeout
                );
                HealthResult::Stopped
            }
            Err(e) if e.is_connect() || e.is_request() => {
                info!("could not reach {}: {e}", self.target);
                HealthResult::Stopped
            }
            Err(e) => {
                warn!("ping of {} failed: {e}", self.target);
                HealthResult::Stopped
            }
        }
    }
}
