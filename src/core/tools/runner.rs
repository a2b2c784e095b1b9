//! Process execution seam. The default runner spawns through tokio; tests
//! substitute recording runners behind the same trait.

#![allow(clippy::result_large_err)]

use crate::core::error::TaskError;
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Where the child's stdout goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdoutMode {
    /// Stream into the task's own stdout.
    Inherit,
    /// Write byte-for-byte into the named file.
    RedirectTo(PathBuf),
    /// Buffer fully in memory and hand back to the caller.
    Capture,
}

#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Directories prepended to the child's PATH, in order.
    pub path_prepend: Vec<PathBuf>,
    /// Working directory; inherits the task's when absent.
    pub cwd: Option<PathBuf>,
    pub stdout: StdoutMode,
}

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub exit_code: i32,
    /// Captured stdout; present only in [`StdoutMode::Capture`].
    pub stdout: Option<Vec<u8>>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync + 'static {
    async fn run(&self, request: &ProcessRequest) -> Result<ProcessOutput, TaskError>;
}

pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, request: &ProcessRequest) -> Result<ProcessOutput, TaskError> {
        let mut command = Command::new(&request.program);
        command.args(&request.args);
        command.stdin(Stdio::null());
        command.stderr(Stdio::inherit());

        if let Some(cwd) = &request.cwd {
            command.current_dir(cwd);
        }

        if !request.path_prepend.is_empty() {
            command.env("PATH", compose_path(&request.path_prepend)?);
        }

        match &request.stdout {
            StdoutMode::Inherit => {
                command.stdout(Stdio::inherit());
            }
            StdoutMode::RedirectTo(path) => {
                let file = std::fs::File::create(path).map_err(|err| {
                    TaskError::new(
                        ErrorCategory::IoError,
                        format!(
                            "failed to open redirection target {}: {}",
                            path.display(),
                            err
                        ),
                    )
                })?;
                command.stdout(Stdio::from(file));
            }
            StdoutMode::Capture => {
                command.stdout(Stdio::piped());
            }
        }

        let child = command.spawn().map_err(|err| {
            TaskError::new(
                ErrorCategory::ExecutionError,
                format!(
                    "failed to execute {}: {}",
                    request.program.display(),
                    err
                ),
            )
        })?;

        let output = child.wait_with_output().await.map_err(|err| {
            TaskError::new(
                ErrorCategory::ExecutionError,
                format!("failed to wait for {}: {}", request.program.display(), err),
            )
        })?;

        let stdout = match request.stdout {
            StdoutMode::Capture => Some(output.stdout),
            _ => None,
        };

        Ok(ProcessOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout,
        })
    }
}

/// Child PATH: the prepended directories in order, then the inherited PATH.
fn compose_path(prepend: &[PathBuf]) -> Result<std::ffi::OsString, TaskError> {
    let inherited = std::env::var_os("PATH");
    let entries = prepend
        .iter()
        .cloned()
        .chain(inherited.iter().flat_map(std::env::split_paths));
    std::env::join_paths(entries).map_err(|err| {
        TaskError::new(
            ErrorCategory::ExecutionError,
            format!("failed to compose PATH: {err}"),
        )
    })
}
