#![allow(clippy::result_large_err)]

use super::PlatformConfig;
use crate::core::error::TaskError;
use std::env;
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from the task directory (task_dir/biotask.toml)
    /// Environment variables override config file values
    /// Falls back to defaults when the file doesn't exist
    pub fn load_from_task_dir(task_dir: &Path) -> Result<PlatformConfig, TaskError> {
        let config_path = task_dir.join("biotask.toml");
        let config_file = Self::load_from_file(&config_path)?;

        let mut config = config_file.unwrap_or_default();

        // Apply environment variable overrides
        Self::apply_env_overrides(&mut config);

        Ok(config)
    }

    /// Load config from specific file path
    /// Returns Ok(None) if file doesn't exist
    pub fn load_from_file(path: &Path) -> Result<Option<PlatformConfig>, TaskError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            TaskError::new(
                crate::core::types::ErrorCategory::IoError,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
        })?;

        let config: PlatformConfig = toml::from_str(&content).map_err(|e| {
            TaskError::new(
                crate::core::types::ErrorCategory::ValidationError,
                format!("Failed to parse config file {}: {}", path.display(), e),
            )
        })?;

        Ok(Some(config))
    }

    /// Apply environment variable overrides to the configuration
    /// Environment variables take precedence over config file values
    fn apply_env_overrides(config: &mut PlatformConfig) {
        // Directory overrides
        if let Ok(programs) = env::var("BIOTASK_PROGRAMS_DIRECTORY") {
            config.directories.programs = PathBuf::from(programs);
        }

        if let Ok(data_read) = env::var("BIOTASK_DATA_READ_DIRECTORY") {
            config.directories.data_read = PathBuf::from(data_read);
        }

        if let Ok(data_write) = env::var("BIOTASK_DATA_WRITE_DIRECTORY") {
            config.directories.data_write = PathBuf::from(data_write);
        }

        if let Ok(storage) = env::var("BIOTASK_STORAGE_DIRECTORY") {
            config.directories.storage = PathBuf::from(storage);
        }

        // Bridge overrides
        if let Ok(proxy_url) = env::var("BIOTASK_PROXY_URL") {
            config.bridge.proxy_url = proxy_url;
        }

        if let Ok(token_var) = env::var("BIOTASK_TOKEN_VAR") {
            config.bridge.token_var = token_var;
        }
    }

    /// Get documentation for supported environment variables
    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "BIOTASK_PROGRAMS_DIRECTORY - Override installed toolset root",
            "BIOTASK_DATA_READ_DIRECTORY - Override read-only staging directory",
            "BIOTASK_DATA_WRITE_DIRECTORY - Override writable result directory",
            "BIOTASK_STORAGE_DIRECTORY - Override platform storage mount",
            "BIOTASK_PROXY_URL - Override task proxy endpoint",
            "BIOTASK_TOKEN_VAR - Override the env var name holding the task token",
            "TASK_HOST_IP - Host used to derive the default proxy endpoint",
        ]
    }
}
