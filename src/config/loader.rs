//! Configuration loading from file system

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use super::types::EngineConfig;

/// Default location of the engine config (`<config dir>/text-replacer/engine.json`)
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("text-replacer")
        .join("engine.json")
}

/// Load engine configuration from a JSON file.
///
/// Returns `EngineConfig::default()` if the file is missing or can't be
/// parsed; the failure is logged.
#[instrument(name = "load_config", skip_all, fields(path = %path.display()))]
pub fn load_config(path: &Path) -> EngineConfig {
    if !path.exists() {
        info!("Config file not found, using defaults");
        return EngineConfig::default();
    }

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!(error = %e, "Failed to read config file, using defaults");
            return EngineConfig::default();
        }
    };

    match serde_json::from_str::<EngineConfig>(&contents) {
        Ok(config) => {
            info!("Successfully loaded config");
            config
        }
        Err(e) => {
            warn!(error = %e, "Failed to parse config JSON, using defaults");
            EngineConfig::default()
        }
    }
}
