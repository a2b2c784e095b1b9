//! Tool resolution and execution.
//!
//! A toolset is a named, versioned bundle of executables installed under the
//! platform's programs directory. The version a script may use is never
//! chosen by the script itself: it comes from the active file's metainfo
//! under `biotask:tool.version:<toolset>`, and one task context resolves at
//! most one version of any toolset.

#![allow(clippy::result_large_err)]

pub mod runner;

pub use runner::{ProcessOutput, ProcessRequest, ProcessRunner, StdoutMode, TokioProcessRunner};

use crate::core::context::{TaskContext, ToolVersionRegistry};
use crate::core::error::TaskError;
use crate::core::types::ErrorCategory;
use crate::utils::text::format_elapsed;
use biotask_types::metainfo::keys;
use biotask_types::Metainfo;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._+-]*$").unwrap())
}

fn checked_name(what: &str, value: &str) -> Result<(), TaskError> {
    if name_pattern().is_match(value) {
        return Ok(());
    }
    Err(TaskError::new(
        ErrorCategory::ValidationError,
        format!("Invalid {what}: {value:?}"),
    ))
}

/// Resolves tools for one task, against the active file's metainfo.
pub struct ToolResolver<'a> {
    programs_root: PathBuf,
    metainfo: &'a Metainfo,
    versions: &'a ToolVersionRegistry,
    runner: Arc<dyn ProcessRunner>,
    verbose: bool,
}

impl<'a> ToolResolver<'a> {
    pub fn new(ctx: &'a TaskContext, metainfo: &'a Metainfo) -> Self {
        ToolResolver {
            programs_root: ctx.config().directories.programs.clone(),
            metainfo,
            versions: ctx.versions(),
            runner: ctx.runner(),
            verbose: true,
        }
    }

    /// Suppress start/end markers on everything resolved from here on.
    pub fn quiet(mut self) -> Self {
        self.verbose = false;
        self
    }

    /// The version declared for a toolset in the file's metainfo.
    pub fn declared_version(&self, toolset: &str) -> Result<String, TaskError> {
        checked_name("toolset name", toolset)?;
        let version = self
            .metainfo
            .tool_version(toolset)
            .ok_or_else(|| TaskError::missing_tool_version(toolset))?;
        checked_name("tool version", version)?;
        Ok(version.to_string())
    }

    /// Resolve a toolset at its declared version, registering the version in
    /// the task context. A second resolve of the same toolset must agree.
    pub fn toolset(&self, name: &str) -> Result<Toolset, TaskError> {
        let version = self.declared_version(name)?;
        self.versions.register(name, &version)?;
        Toolset::locate_with(
            &self.programs_root,
            name,
            &version,
            self.runner.clone(),
            self.verbose,
        )
    }

    /// Resolve one executable out of a toolset.
    pub fn tool(&self, toolset: &str, tool: &str) -> Result<Tool, TaskError> {
        self.toolset(toolset)?.tool(tool)
    }

    /// Resolve a tool whose commands also need auxiliary toolsets on their
    /// search path. Auxiliary versions register in the same at-most-one
    /// registry; a conflicting requirement fails the resolve.
    pub fn tool_with(
        &self,
        toolset: &str,
        tool: &str,
        uses: &[&str],
    ) -> Result<Tool, TaskError> {
        let mut primary = self.toolset(toolset)?;
        for aux in uses {
            let aux_toolset = self.toolset(aux)?;
            primary.uses(&aux_toolset);
        }
        primary.tool(tool)
    }

    /// Escape hatch: the binary directory of a toolset, for callers that
    /// spawn processes themselves and inspect exit codes on their own.
    pub fn toolset_directory(&self, name: &str) -> Result<PathBuf, TaskError> {
        Ok(self.toolset(name)?.directory().to_path_buf())
    }

    /// The free-form argument string stored under `biotask:tool.arguments`.
    pub fn argument_string(&self) -> String {
        self.metainfo
            .get_first_string(keys::TOOL_ARGUMENTS)
            .unwrap_or_default()
            .to_string()
    }

    /// All argument strings stored under `biotask:tool.arguments`.
    pub fn argument_list(&self) -> Vec<String> {
        self.metainfo
            .get_all(keys::TOOL_ARGUMENTS)
            .iter()
            .filter_map(|value| value.as_str().map(str::to_string))
            .collect()
    }
}

/// A located toolset installation.
pub struct Toolset {
    name: String,
    version: String,
    directory: PathBuf,
    /// Search-path entries for commands built from this toolset: own
    /// directory first, auxiliary directories in declaration order.
    path_entries: Vec<PathBuf>,
    runner: Arc<dyn ProcessRunner>,
    verbose: bool,
}

impl std::fmt::Debug for Toolset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolset")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("directory", &self.directory)
            .field("path_entries", &self.path_entries)
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

impl Toolset {
    /// Locate an installation directly, bypassing metainfo declarations.
    /// Intended for tests and unusual scripts; `ToolResolver` is the normal
    /// entry point and additionally enforces the version registry.
    pub fn locate(programs_root: &Path, name: &str, version: &str) -> Result<Self, TaskError> {
        Self::locate_with(
            programs_root,
            name,
            version,
            Arc::new(TokioProcessRunner),
            true,
        )
    }

    pub(crate) fn locate_with(
        programs_root: &Path,
        name: &str,
        version: &str,
        runner: Arc<dyn ProcessRunner>,
        verbose: bool,
    ) -> Result<Self, TaskError> {
        checked_name("toolset name", name)?;
        checked_name("tool version", version)?;
        let root = programs_root.join(name).join(version);
        if !root.is_dir() {
            return Err(TaskError::new(
                ErrorCategory::ResolutionError,
                format!("Toolset \"{name}\" with version \"{version}\" is not installed"),
            )
            .with_code("TOOL-002"));
        }
        let with_bin = root.join("bin");
        let directory = if with_bin.is_dir() { with_bin } else { root };
        Ok(Toolset {
            name: name.to_string(),
            version: version.to_string(),
            path_entries: vec![directory.clone()],
            directory,
            runner,
            verbose,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Directory holding the toolset's binaries (`bin/` when present).
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Add another toolset's directory to the search path of commands built
    /// from this one.
    pub fn uses(&mut self, other: &Toolset) {
        self.path_entries.push(other.directory.clone());
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Resolve a named executable inside this toolset.
    pub fn tool(&self, name: &str) -> Result<Tool, TaskError> {
        checked_name("tool name", name)?;
        let executable = self.directory.join(name);
        if !executable.is_file() {
            return Err(TaskError::new(
                ErrorCategory::ResolutionError,
                format!(
                    "Executable \"{}\" not found for tool \"{}\" with version \"{}\"",
                    name, self.name, self.version
                ),
            )
            .with_code("TOOL-003"));
        }
        Ok(Tool {
            name: name.to_string(),
            executable,
            toolset_name: self.name.clone(),
            toolset_version: self.version.clone(),
            search_path: self.path_entries.clone(),
            runner: self.runner.clone(),
            verbose: self.verbose,
        })
    }
}

/// A resolved executable, ready to build commands.
pub struct Tool {
    name: String,
    executable: PathBuf,
    toolset_name: String,
    toolset_version: String,
    search_path: Vec<PathBuf>,
    runner: Arc<dyn ProcessRunner>,
    verbose: bool,
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("executable", &self.executable)
            .field("toolset_name", &self.toolset_name)
            .field("toolset_version", &self.toolset_version)
            .field("search_path", &self.search_path)
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

impl Tool {
    pub fn executable_name(&self) -> &str {
        &self.name
    }

    pub fn executable_path(&self) -> &Path {
        &self.executable
    }

    pub fn version(&self) -> &str {
        &self.toolset_version
    }

    /// Bind an argument list, producing an immutable command.
    pub fn command(&self, args: &[&str]) -> Command {
        Command {
            program: self.executable.clone(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
            search_path: self.search_path.clone(),
            cwd: None,
            display_name: self.name.clone(),
            toolset_name: self.toolset_name.clone(),
            toolset_version: self.toolset_version.clone(),
            runner: self.runner.clone(),
            verbose: self.verbose,
        }
    }

    /// Run with the given arguments in the foreground; see [`Command::run`].
    pub async fn run(&self, args: &[&str]) -> Result<(), TaskError> {
        self.command(args).run(None).await
    }

    /// Run and capture stdout; see [`Command::capture`].
    pub async fn output(&self, args: &[&str]) -> Result<String, TaskError> {
        self.command(args).capture().await
    }
}

/// An executable path bound to an ordered argument list. Immutable once
/// constructed; each run spawns a fresh process.
pub struct Command {
    program: PathBuf,
    args: Vec<String>,
    search_path: Vec<PathBuf>,
    cwd: Option<PathBuf>,
    display_name: String,
    toolset_name: String,
    toolset_version: String,
    runner: Arc<dyn ProcessRunner>,
    verbose: bool,
}

impl Command {
    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Rebind the working directory for this command's runs.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Override the marker flag for this command only.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run in the foreground and wait for completion. With a redirection
    /// target, the child's stdout is written there byte-for-byte. A non-zero
    /// exit status is an execution error; whether the tool or the script
    /// logic is at fault is not distinguished.
    pub async fn run(&self, redirect_stdout: Option<&Path>) -> Result<(), TaskError> {
        let stdout = match redirect_stdout {
            Some(path) => StdoutMode::RedirectTo(path.to_path_buf()),
            None => StdoutMode::Inherit,
        };
        let output = self.execute(stdout).await?;
        if !output.success() {
            return Err(self.exit_error(output.exit_code));
        }
        Ok(())
    }

    /// Run and return the complete stdout as text. The whole output is
    /// buffered in memory first — do not use for commands producing large
    /// volumes; redirect to a file instead.
    pub async fn capture(&self) -> Result<String, TaskError> {
        let output = self.execute(StdoutMode::Capture).await?;
        let text = String::from_utf8_lossy(output.stdout.as_deref().unwrap_or_default())
            .into_owned();
        if !output.success() {
            tracing::error!(target: "biotask::tools", "{}", text.trim_end());
            let mut err = self.exit_error(output.exit_code);
            err.add_context("exit_code", &output.exit_code.to_string());
            return Err(err);
        }
        Ok(text)
    }

    async fn execute(&self, stdout: StdoutMode) -> Result<ProcessOutput, TaskError> {
        let started = Instant::now();
        if self.verbose {
            tracing::info!(
                target: "biotask::tools",
                "Start {}({}): {} {}",
                self.toolset_name,
                self.toolset_version,
                self.display_name,
                self.args.join(" ")
            );
        }

        let result = self
            .runner
            .run(&ProcessRequest {
                program: self.program.clone(),
                args: self.args.clone(),
                path_prepend: self.search_path.clone(),
                cwd: self.cwd.clone(),
                stdout,
            })
            .await;

        if self.verbose {
            tracing::info!(
                target: "biotask::tools",
                "Running \"{}\" finished, {} elapsed",
                self.display_name,
                format_elapsed(started.elapsed())
            );
        }
        result
    }

    fn exit_error(&self, exit_code: i32) -> TaskError {
        TaskError::new(
            ErrorCategory::ExecutionError,
            format!(
                "Command \"{}\" returned non-zero exit status {}",
                self.display_name, exit_code
            ),
        )
        .with_code("TOOL-004")
    }
}
