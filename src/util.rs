use std::path::PathBuf;

const GUARD_CONFIG: &str = "GUARD_CONFIG";

const DEFAULT_CONFIG: &str = "./guard.json";

pub fn get_config_path() -> String {
    std::env::var(GUARD_CONFIG).unwrap_or_else(|_| DEFAULT_CONFIG.to_string())
}

const GUARD_BASE_DIR: &str = "GUARD_BASE_DIR";

/// Directory rescue command paths are resolved against
pub fn get_base_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(GUARD_BASE_DIR) {
        return PathBuf::from(dir);
    }

    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}
