//! Task logging: everything a script traces lands on the task's stdout (the
//! platform collects it) and in a log file inside the task directory.

use crate::core::error::TaskError;
use crate::core::types::ErrorCategory;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;

static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Logging configuration; environment variables take precedence.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default level filter when RUST_LOG is unset.
    pub default_level: String,
    pub enable_file: bool,
    /// Log file name, relative to the task directory.
    pub file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            default_level: "info".to_string(),
            enable_file: true,
            file_name: "task.log".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        let mut config = LoggingConfig::default();
        if let Ok(level) = std::env::var("BIOTASK_LOG_LEVEL") {
            config.default_level = level;
        }
        if let Ok(file_name) = std::env::var("BIOTASK_LOG_FILE") {
            config.file_name = file_name;
        }
        if std::env::var("BIOTASK_LOG_DISABLE_FILE").is_ok() {
            config.enable_file = false;
        }
        config
    }
}

/// Guard that keeps the file sink flushing for the duration of the script.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
    log_file_path: Option<PathBuf>,
}

impl LoggingGuard {
    /// Returns the log file path backed by the file sink, when enabled.
    pub fn log_file_path(&self) -> Option<&Path> {
        self.log_file_path.as_deref()
    }
}

/// Initialize logging for a task script with environment-driven config.
///
/// Errors when invoked more than once per process.
pub fn init(task_dir: &Path) -> Result<LoggingGuard, TaskError> {
    init_with(&LoggingConfig::from_env(), task_dir)
}

/// Initialize logging with an explicit configuration.
pub fn init_with(config: &LoggingConfig, task_dir: &Path) -> Result<LoggingGuard, TaskError> {
    if LOGGER_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(TaskError::new(
            ErrorCategory::InternalError,
            "logging already initialized",
        ));
    }

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_level))
        .map_err(|err| {
            TaskError::new(
                ErrorCategory::ValidationError,
                format!("failed to configure tracing level: {err}"),
            )
        })?;

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stdout);

    let (file_layer, file_guard, log_file_path) = if config.enable_file {
        let path = task_dir.join(&config.file_name);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| {
                TaskError::new(
                    ErrorCategory::IoError,
                    format!("failed to open log file {}: {}", path.display(), err),
                )
            })?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(non_blocking);
        (Some(layer), Some(guard), Some(path))
    } else {
        (None, None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
        log_file_path,
    })
}
