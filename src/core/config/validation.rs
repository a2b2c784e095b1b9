#![allow(clippy::result_large_err)]

use super::PlatformConfig;
use crate::core::error::TaskError;
use url::Url;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration rules
    pub fn validate(config: &PlatformConfig) -> Result<(), TaskError> {
        if config.bridge.token_var.trim().is_empty() {
            return Err(TaskError::new(
                crate::core::types::ErrorCategory::ValidationError,
                "bridge.token_var cannot be empty",
            ));
        }

        Url::parse(&config.bridge.proxy_url).map_err(|e| {
            TaskError::new(
                crate::core::types::ErrorCategory::ValidationError,
                format!(
                    "bridge.proxy_url is not a valid URL ({}): {}",
                    config.bridge.proxy_url, e
                ),
            )
        })?;

        for (name, path) in [
            ("directories.programs", &config.directories.programs),
            ("directories.data_read", &config.directories.data_read),
            ("directories.data_write", &config.directories.data_write),
            ("directories.storage", &config.directories.storage),
        ] {
            if path.as_os_str().is_empty() {
                return Err(TaskError::new(
                    crate::core::types::ErrorCategory::ValidationError,
                    format!("{name} cannot be empty"),
                ));
            }
        }

        Ok(())
    }

    /// Stricter check used at bootstrap: the programs directory must exist,
    /// otherwise no tool can ever be resolved.
    pub fn validate_programs_root(config: &PlatformConfig) -> Result<(), TaskError> {
        let programs = &config.directories.programs;
        if !programs.is_dir() {
            return Err(TaskError::new(
                crate::core::types::ErrorCategory::ValidationError,
                format!(
                    "Programs directory not found: {}",
                    programs.display()
                ),
            ));
        }
        Ok(())
    }
}
