//! The explicit execution context of one task script.
//!
//! The platform starts a script with the id of the file under
//! initialization as its first argument and the task sandbox as its working
//! directory. Everything an operation needs — file id, directories, bridge,
//! process runner, resolved tool versions — travels through a `TaskContext`
//! handed in explicitly; there is no ambient "current file".

#![allow(clippy::result_large_err)]

use crate::core::bridge::{HttpBridge, PlatformBridge};
use crate::core::config::{ConfigLoader, ConfigValidator, PlatformConfig};
use crate::core::error::TaskError;
use crate::core::files::TaskFile;
use crate::core::tools::{ProcessRunner, TokioProcessRunner};
use crate::core::types::ErrorCategory;
use biotask_types::FileKind;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Tracks which toolset versions this task has resolved. A task may use at
/// most one version of any named toolset; the first resolve wins and every
/// later resolve must agree.
#[derive(Debug, Default)]
pub struct ToolVersionRegistry {
    resolved: Mutex<HashMap<String, String>>,
}

impl ToolVersionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, toolset: &str, version: &str) -> Result<(), TaskError> {
        let mut resolved = self.resolved.lock().expect("version registry poisoned");
        match resolved.get(toolset) {
            Some(existing) if existing != version => Err(TaskError::new(
                ErrorCategory::ResolutionError,
                format!(
                    "Toolset \"{toolset}\" is already resolved at version \"{existing}\", \
                     cannot also use \"{version}\""
                ),
            )
            .with_code("TOOL-006")),
            Some(_) => Ok(()),
            None => {
                resolved.insert(toolset.to_string(), version.to_string());
                Ok(())
            }
        }
    }

    pub fn resolved_version(&self, toolset: &str) -> Option<String> {
        self.resolved
            .lock()
            .expect("version registry poisoned")
            .get(toolset)
            .cloned()
    }
}

pub struct TaskContext {
    file_id: i64,
    task_dir: PathBuf,
    config: PlatformConfig,
    bridge: Arc<dyn PlatformBridge>,
    runner: Arc<dyn ProcessRunner>,
    versions: ToolVersionRegistry,
}

impl TaskContext {
    /// Build the context the way the platform invokes scripts: file id from
    /// the first program argument, the current directory as the task
    /// sandbox, config from `biotask.toml` plus environment overrides.
    pub fn bootstrap() -> Result<Self, TaskError> {
        let file_id = std::env::args().nth(1).ok_or_else(|| {
            TaskError::new(
                ErrorCategory::ValidationError,
                "Expected the id of the file under initialization as the first argument",
            )
        })?;
        let file_id = file_id.parse::<i64>().map_err(|_| {
            TaskError::new(
                ErrorCategory::ValidationError,
                format!("File id is invalid: {file_id}"),
            )
        })?;
        let task_dir = std::env::current_dir()?;
        Self::for_task(file_id, &task_dir)
    }

    /// Build a context for an explicit file id and task directory.
    pub fn for_task(file_id: i64, task_dir: &Path) -> Result<Self, TaskError> {
        let config = ConfigLoader::load_from_task_dir(task_dir)?;
        ConfigValidator::validate(&config)?;
        let bridge = Arc::new(HttpBridge::new(&config, task_dir));
        Ok(Self::with_parts(
            file_id,
            task_dir,
            config,
            bridge,
            Arc::new(TokioProcessRunner),
        ))
    }

    /// Assemble a context from explicit parts. Tests use this to substitute
    /// a recording bridge or a stub process runner.
    pub fn with_parts(
        file_id: i64,
        task_dir: &Path,
        config: PlatformConfig,
        bridge: Arc<dyn PlatformBridge>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        TaskContext {
            file_id,
            task_dir: task_dir.to_path_buf(),
            config,
            bridge,
            runner,
            versions: ToolVersionRegistry::new(),
        }
    }

    pub fn file_id(&self) -> i64 {
        self.file_id
    }

    /// The task sandbox: inputs are staged and outputs produced here.
    pub fn task_dir(&self) -> &Path {
        &self.task_dir
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    pub fn bridge(&self) -> Arc<dyn PlatformBridge> {
        self.bridge.clone()
    }

    pub fn runner(&self) -> Arc<dyn ProcessRunner> {
        self.runner.clone()
    }

    pub fn versions(&self) -> &ToolVersionRegistry {
        &self.versions
    }

    /// Handle for the file this task is initializing.
    pub fn active_file(&self, kind: FileKind) -> TaskFile {
        self.file(self.file_id, kind)
    }

    /// Handle for any platform file by id.
    pub fn file(&self, object_id: i64, kind: FileKind) -> TaskFile {
        TaskFile::new(object_id, kind, self.bridge.clone(), self.task_dir.clone())
    }
}
