use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tracing::trace;

/// Poll intervals below this are raised to it
pub const MIN_INTERVAL_MS: u64 = 1000;

/// Poll interval used when neither the target nor the command line sets one
pub const DEFAULT_DURATION_MS: f64 = 5000.0;

/// How a target's health is determined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticType {
    /// Ask the operating system's service manager
    #[default]
    #[serde(alias = "NativeService", alias = "ServiceController")]
    NativeService,

    /// Look for a running process with a given image name
    #[serde(alias = "ProcessName", alias = "Process")]
    ProcessName,

    /// Issue a GET request and inspect the status code
    #[serde(alias = "HttpRequest")]
    HttpRequest,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// Targets to watch, separated by whitespace, ',' or ';'
    pub service_name: Option<String>,

    /// Default poll interval in milliseconds
    pub duration: Option<f64>,

    /// Minimum seconds between two recovery attempts of the same target
    #[serde(default = "default_restart_seconds")]
    pub restart_seconds: u64,

    /// HTTP probe timeout in milliseconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout: u64,

    /// Seconds a rescue command may run before it is killed
    #[serde(default = "default_rescue_timeout")]
    pub rescue_timeout: u64,

    /// Upper bound for waiting on a native service state change
    #[serde(default = "default_service_wait_seconds")]
    pub service_wait_seconds: u64,

    /// Talk to the per-user service manager instead of the system one
    #[serde(default)]
    pub user_services: bool,

    #[serde(default)]
    pub targets: HashMap<String, TargetConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: None,
            duration: None,
            restart_seconds: default_restart_seconds(),
            http_timeout: default_http_timeout(),
            rescue_timeout: default_rescue_timeout(),
            service_wait_seconds: default_service_wait_seconds(),
            user_services: false,
            targets: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct TargetConfig {
    /// Poll interval in milliseconds
    pub duration: Option<f64>,

    #[serde(default)]
    pub diagnostic_type: DiagnosticType,

    /// Service name, process image name or URL depending on the diagnostic type
    pub diagnostic_argument: Option<String>,

    /// Recovery executable, relative to the base directory
    pub rescue_cmd_path: Option<PathBuf>,

    /// Overrides the global debounce window
    pub restart_seconds: Option<u64>,
}

/// A fully resolved watch target
///
/// Immutable for the lifetime of its monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub name: String,
    pub interval: Duration,
    pub kind: DiagnosticType,
    pub argument: Option<String>,
    pub rescue_cmd: Option<PathBuf>,
    pub debounce: Duration,
}

fn default_restart_seconds() -> u64 {
    10
}

fn default_http_timeout() -> u64 {
    2000
}

fn default_rescue_timeout() -> u64 {
    20
}

fn default_service_wait_seconds() -> u64 {
    60
}

impl Config {
    /// Look up the settings of a target, ignoring case
    pub fn target_config(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.get(name).or_else(|| {
            self.targets
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, target)| target)
        })
    }

    /// Default poll interval in milliseconds
    pub fn default_duration_ms(&self) -> f64 {
        self.duration.unwrap_or(DEFAULT_DURATION_MS)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout)
    }

    pub fn rescue_timeout(&self) -> Duration {
        Duration::from_secs(self.rescue_timeout)
    }

    pub fn service_wait(&self) -> Duration {
        Duration::from_secs(self.service_wait_seconds)
    }

    /// Resolve a target from its name, falling back to defaults for everything unset
    pub fn resolve_target(&self, name: &str, default_duration_ms: f64) -> Target {
        let settings = self.target_config(name).cloned().unwrap_or_default();

        let duration_ms = settings.duration.unwrap_or(default_duration_ms);

        Target {
            name: name.to_string(),
            interval: clamp_interval(duration_ms),
            kind: settings.diagnostic_type,
            argument: settings
                .diagnostic_argument
                .map(|arg| arg.trim().to_string())
                .filter(|arg| !arg.is_empty()),
            rescue_cmd: settings
                .rescue_cmd_path
                .filter(|path| !path.as_os_str().is_empty()),
            debounce: Duration::from_secs(
                settings.restart_seconds.unwrap_or(self.restart_seconds),
            ),
        }
    }
}

fn clamp_interval(duration_ms: f64) -> Duration {
    if !duration_ms.is_finite() || duration_ms < MIN_INTERVAL_MS as f64 {
        Duration::from_millis(MIN_INTERVAL_MS)
    } else {
        Duration::from_millis(duration_ms as u64)
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
