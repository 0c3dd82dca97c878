//! Timeout, polling and concurrency settings for cloudwait
//!
//! Settings come from a YAML file; every field has a default, so a missing
//! file is not an error for [`load`].

pub mod error;
pub mod settings;

pub use error::*;
pub use settings::*;

use std::path::PathBuf;

/// Environment variable naming the settings file directly
pub const CONFIG_PATH_ENV: &str = "CLOUDWAIT_CONFIG_PATH";

/// cloudwait directory under the user's config dir
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("cloudwait");
    Ok(config_dir)
}

/// Locate the settings file
///
/// Search order:
/// 1. `CLOUDWAIT_CONFIG_PATH` environment variable
/// 2. current directory: `cloudwait.local.yaml`, `cloudwait.yaml`
/// 3. `~/.config/cloudwait/config.yaml`
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(path = %path.display(), "{CONFIG_PATH_ENV} points to a missing file");
    }

    let current_dir = std::env::current_dir()?;
    for filename in ["cloudwait.local.yaml", "cloudwait.yaml"] {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    if let Ok(config_dir) = get_config_dir() {
        let global_config = config_dir.join("config.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// Load settings from the discovered file, or defaults if there is none
pub fn load() -> Result<WaitSettings> {
    match find_config_file() {
        Ok(path) => WaitSettings::from_path(path),
        Err(ConfigError::ConfigFileNotFound) => {
            tracing::debug!("no settings file found, using defaults");
            Ok(WaitSettings::default())
        }
        Err(e) => Err(e),
    }
}
