use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Platform configuration loaded from biotask.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PlatformConfig {
    /// Filesystem layout of the task sandbox
    #[serde(default)]
    pub directories: DirectoriesConfig,

    /// Bridge endpoint configuration
    #[serde(default)]
    pub bridge: BridgeConfig,
}

/// Filesystem layout of the task sandbox
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirectoriesConfig {
    /// Root of installed toolsets: `<programs>/<toolset>/<version>/`
    #[serde(default = "default_programs_directory")]
    pub programs: PathBuf,

    /// Read-only staging area shared with the platform
    #[serde(default = "default_data_read_directory")]
    pub data_read: PathBuf,

    /// Writable area the platform collects results from
    #[serde(default = "default_data_write_directory")]
    pub data_write: PathBuf,

    /// Platform-managed storage mount
    #[serde(default = "default_storage_directory")]
    pub storage: PathBuf,
}

/// Bridge endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    /// Task-local proxy the bridge POSTs to
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,

    /// Name of the environment variable carrying the task token
    #[serde(default = "default_token_var")]
    pub token_var: String,
}

const SYSTEM_DIRECTORY: &str = "/var/lib/biotask";

fn default_programs_directory() -> PathBuf {
    PathBuf::from(SYSTEM_DIRECTORY).join("filesystem/programs")
}

fn default_data_read_directory() -> PathBuf {
    PathBuf::from(SYSTEM_DIRECTORY).join("filesystem/data")
}

fn default_data_write_directory() -> PathBuf {
    PathBuf::from(SYSTEM_DIRECTORY).join("filesystem/write_data")
}

fn default_storage_directory() -> PathBuf {
    PathBuf::from(SYSTEM_DIRECTORY).join("storage")
}

fn default_proxy_url() -> String {
    let host = std::env::var("TASK_HOST_IP").unwrap_or_else(|_| "localhost".to_string());
    format!("http://{host}:8888")
}

fn default_token_var() -> String {
    "BIOTASK_TOKEN".to_string()
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        DirectoriesConfig {
            programs: default_programs_directory(),
            data_read: default_data_read_directory(),
            data_write: default_data_write_directory(),
            storage: default_storage_directory(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            proxy_url: default_proxy_url(),
            token_var: default_token_var(),
        }
    }
}


pub mod loader;
pub mod validation;

pub use loader::ConfigLoader;
pub use validation::ConfigValidator;
