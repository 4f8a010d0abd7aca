//! Process-by-name probe

use std::ffi::OsStr;
use std::path::Path;

use sysinfo::{Process, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tracing::{error, trace};

use crate::error::{GuardError, GuardResult};

use super::HealthResult;

/// Probe looking for at least one running process with a given image name
#[derive(Debug, Clone)]
pub struct ProcessProbe {
    image: String,
}

impl ProcessProbe {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image_name(image.into()),
        }
    }

    pub async fn probe(&self) -> HealthResult {
        match self.count().await {
            Ok(0) => HealthResult::Stopped,
            Ok(count) => {
                trace!("found {count} processes named {}", self.image);
                HealthResult::Running
            }
            Err(e) => {
                error!("{e}");
                HealthResult::Unknown
            }
        }
    }

    async fn count(&self) -> GuardResult<usize> {
        let image = self.image.clone();

        // walking the process table is blocking work
        tokio::task::spawn_blocking(move || count_processes(&image))
            .await
            .map_err(|e| {
                GuardError::ProbeTransport(format!(
                    "process enumeration for {} failed: {e}",
                    self.image
                ))
            })
    }
}

/// Number of running processes whose image is exactly `image`
///
/// The kernel truncates process names (15 bytes on Linux), so the
/// executable path and the first command line argument are checked too.
pub fn count_processes(image: &str) -> usize {
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::nothing()
            .with_exe(UpdateKind::OnlyIfNotSet)
            .with_cmd(UpdateKind::OnlyIfNotSet),
    );

    let image = OsStr::new(image);
    system
        .processes()
        .values()
        .filter(|process| runs_image(process, image))
        .count()
}

fn runs_image(process: &Process, image: &OsStr) -> bool {
    image_matches(
        process.name(),
        process.exe(),
        process.cmd().first().map(|arg| arg.as_os_str()),
        image,
    )
}

fn image_matches(name: &OsStr, exe: Option<&Path>, argv0: Option<&OsStr>, image: &OsStr) -> bool {
    name == image
        || exe.and_then(Path::file_name) == Some(image)
        || argv0.and_then(|arg| Path::new(arg).file_name()) == Some(image)
}

fn image_name(image: String) -> String {
    if cfg!(windows) && !image.to_ascii_lowercase().ends_with(".exe") {
        format!("{image}.exe")
    } else {
        image
    }
}
