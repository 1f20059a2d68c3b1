//! Configuration loading from file system

use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use super::defaults::APP_DIR_NAME;
use super::types::Config;

/// Default config location: ~/.chat-stream/config.json
pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join("config.json")
}

/// Load configuration from ~/.chat-stream/config.json
///
/// Returns Config::default() if the file is missing or invalid.
#[instrument(name = "load_config")]
pub fn load_config() -> Config {
    load_config_from(&config_path())
}

/// Load configuration from an explicit path, falling back to defaults
#[instrument(name = "load_config_from", skip_all, fields(path = %path.display()))]
pub fn load_config_from(path: &Path) -> Config {
    if !path.exists() {
        info!(path = %path.display(), "Config file not found, using defaults");
        return Config::default();
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(error = %e, path = %path.display(), "Failed to read config, using defaults");
            return Config::default();
        }
    };

    match serde_json::from_str::<Config>(&content) {
        Ok(config) => {
            info!(path = %path.display(), "Successfully loaded config");
            config
        }
        Err(e) => {
            warn!(
                error = %e,
                path = %path.display(),
                "Failed to parse config JSON, using defaults"
            );
            Config::default()
        }
    }
}
