use async_trait::async_trait;
use biotask::core::bridge::{ObjectRef, PlatformBridge};
use biotask::core::config::PlatformConfig;
use biotask::core::storage::{FormatPattern, StorageUnit};
use biotask::core::tools::{ProcessOutput, ProcessRequest, ProcessRunner};
use biotask::core::types::ErrorCategory;
use biotask::types::metainfo::keys;
use biotask::types::{Metainfo, MetainfoValue};
use biotask::{TaskContext, TaskError, ToolResolver};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Bridge stub for tests that never reach the platform.
struct NullBridge;

#[async_trait]
impl PlatformBridge for NullBridge {
    async fn invoke(
        &self,
        _target: &ObjectRef,
        _method: &str,
        _types: &[&str],
        _values: Vec<Value>,
    ) -> Result<Value, TaskError> {
        panic!("tool resolution must not touch the bridge");
    }

    async fn get(
        &self,
        _target: &ObjectRef,
        _key: &str,
        _format_pattern: Option<&FormatPattern>,
        _working_dir: &Path,
    ) -> Result<Vec<StorageUnit>, TaskError> {
        panic!("tool resolution must not touch the bridge");
    }

    async fn put(
        &self,
        _target: &ObjectRef,
        _key: &str,
        _units: &[StorageUnit],
    ) -> Result<(), TaskError> {
        panic!("tool resolution must not touch the bridge");
    }

    async fn set_format(
        &self,
        _target: &ObjectRef,
        _key: &str,
        _units: &[StorageUnit],
    ) -> Result<(), TaskError> {
        panic!("tool resolution must not touch the bridge");
    }

    async fn download(
        &self,
        _target: &ObjectRef,
        _storage_key: &str,
        _links_key: &str,
        _fold: bool,
        _put_to_storage: bool,
        _working_dir: &Path,
    ) -> Result<Vec<PathBuf>, TaskError> {
        panic!("tool resolution must not touch the bridge");
    }

    async fn send_index(&self, _target: &ObjectRef, _values: &[Value]) -> Result<(), TaskError> {
        panic!("tool resolution must not touch the bridge");
    }
}

/// Runner stub counting how many processes would have been spawned.
struct CountingRunner {
    spawned: AtomicUsize,
}

impl CountingRunner {
    fn new() -> Arc<Self> {
        Arc::new(CountingRunner {
            spawned: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ProcessRunner for CountingRunner {
    async fn run(&self, _request: &ProcessRequest) -> Result<ProcessOutput, TaskError> {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        Ok(ProcessOutput {
            exit_code: 0,
            stdout: None,
        })
    }
}

struct Fixture {
    _temp: TempDir,
    programs: PathBuf,
    ctx: TaskContext,
    runner: Arc<CountingRunner>,
}

fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let programs = temp.path().join("programs");
    let task_dir = temp.path().join("task");
    std::fs::create_dir_all(&programs).unwrap();
    std::fs::create_dir_all(&task_dir).unwrap();

    let mut config = PlatformConfig::default();
    config.directories.programs = programs.clone();

    let runner = CountingRunner::new();
    let ctx = TaskContext::with_parts(17, &task_dir, config, Arc::new(NullBridge), runner.clone());
    Fixture {
        _temp: temp,
        programs,
        ctx,
        runner,
    }
}

fn install_tool(programs: &Path, toolset: &str, version: &str, tool: &str) {
    let dir = programs.join(toolset).join(version);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(tool), b"#!/bin/sh\n").unwrap();
}

fn declare(metainfo: &mut Metainfo, toolset: &str, version: &str) {
    metainfo.replace(keys::tool_version(toolset), MetainfoValue::string(version));
}

#[test]
fn resolving_without_declared_version_is_a_declaration_error() {
    let fx = fixture();
    install_tool(&fx.programs, "seqtk", "1.0", "seqtk");

    let metainfo = Metainfo::new();
    let resolver = ToolResolver::new(&fx.ctx, &metainfo);

    let err = resolver.tool("seqtk", "seqtk").unwrap_err();
    assert_eq!(err.category, ErrorCategory::DeclarationError);
    // The error fires before any process could be spawned.
    assert_eq!(fx.runner.spawned.load(Ordering::SeqCst), 0);
}

#[test]
fn resolving_a_declared_tool_succeeds() {
    let fx = fixture();
    install_tool(&fx.programs, "samtools", "0.1.19", "samtools");

    let mut metainfo = Metainfo::new();
    declare(&mut metainfo, "samtools", "0.1.19");
    let resolver = ToolResolver::new(&fx.ctx, &metainfo);

    let tool = resolver.tool("samtools", "samtools").unwrap();
    assert_eq!(tool.executable_name(), "samtools");
    assert_eq!(tool.version(), "0.1.19");
    assert_eq!(
        tool.executable_path(),
        fx.programs.join("samtools/0.1.19/samtools")
    );
}

#[test]
fn two_versions_of_one_toolset_cannot_coexist() {
    let fx = fixture();
    install_tool(&fx.programs, "samtools", "0.1.19", "samtools");
    install_tool(&fx.programs, "samtools", "1.2", "samtools");

    let mut first = Metainfo::new();
    declare(&mut first, "samtools", "0.1.19");
    ToolResolver::new(&fx.ctx, &first)
        .tool("samtools", "samtools")
        .unwrap();

    // A second file processed in the same task declares a different version.
    let mut second = Metainfo::new();
    declare(&mut second, "samtools", "1.2");
    let err = ToolResolver::new(&fx.ctx, &second)
        .tool("samtools", "samtools")
        .unwrap_err();

    assert_eq!(err.category, ErrorCategory::ResolutionError);
    assert!(err.message.contains("0.1.19"));
    assert!(err.message.contains("1.2"));
}

#[test]
fn resolving_the_same_version_twice_is_fine() {
    let fx = fixture();
    install_tool(&fx.programs, "samtools", "0.1.19", "samtools");

    let mut metainfo = Metainfo::new();
    declare(&mut metainfo, "samtools", "0.1.19");
    let resolver = ToolResolver::new(&fx.ctx, &metainfo);

    resolver.tool("samtools", "samtools").unwrap();
    resolver.tool("samtools", "samtools").unwrap();
}

#[test]
fn auxiliary_toolsets_register_in_the_same_registry() {
    let fx = fixture();
    install_tool(&fx.programs, "samtools", "0.1.19", "samtools");
    install_tool(&fx.programs, "tabix", "0.2.6", "tabix");
    install_tool(&fx.programs, "tabix", "0.3.0", "tabix");

    let mut metainfo = Metainfo::new();
    declare(&mut metainfo, "samtools", "0.1.19");
    declare(&mut metainfo, "tabix", "0.2.6");
    ToolResolver::new(&fx.ctx, &metainfo)
        .tool_with("samtools", "samtools", &["tabix"])
        .unwrap();

    // A later resolve demanding another tabix version conflicts with the
    // version pulled in through uses=[...].
    let mut conflicting = Metainfo::new();
    declare(&mut conflicting, "tabix", "0.3.0");
    let err = ToolResolver::new(&fx.ctx, &conflicting)
        .toolset("tabix")
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::ResolutionError);
}

#[test]
fn auxiliary_version_must_be_declared_too() {
    let fx = fixture();
    install_tool(&fx.programs, "samtools", "0.1.19", "samtools");
    install_tool(&fx.programs, "tabix", "0.2.6", "tabix");

    let mut metainfo = Metainfo::new();
    declare(&mut metainfo, "samtools", "0.1.19");
    let err = ToolResolver::new(&fx.ctx, &metainfo)
        .tool_with("samtools", "samtools", &["tabix"])
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::DeclarationError);
}

#[test]
fn declared_but_uninstalled_toolset_is_a_resolution_error() {
    let fx = fixture();

    let mut metainfo = Metainfo::new();
    declare(&mut metainfo, "bwa", "0.7.17");
    let err = ToolResolver::new(&fx.ctx, &metainfo)
        .tool("bwa", "bwa")
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::ResolutionError);
    assert!(err.message.contains("not installed"));
}

#[test]
fn toolset_directory_escape_hatch_points_at_binaries() {
    let fx = fixture();
    let bin = fx.programs.join("samtools/0.1.19/bin");
    std::fs::create_dir_all(&bin).unwrap();

    let mut metainfo = Metainfo::new();
    declare(&mut metainfo, "samtools", "0.1.19");
    let directory = ToolResolver::new(&fx.ctx, &metainfo)
        .toolset_directory("samtools")
        .unwrap();
    assert_eq!(directory, bin);
}

#[test]
fn argument_strings_come_from_metainfo() {
    let fx = fixture();

    let mut metainfo = Metainfo::new();
    metainfo.add(keys::TOOL_ARGUMENTS, MetainfoValue::string("-q 20"));
    metainfo.add(keys::TOOL_ARGUMENTS, MetainfoValue::string("--trim"));
    let resolver = ToolResolver::new(&fx.ctx, &metainfo);

    assert_eq!(resolver.argument_string(), "-q 20");
    assert_eq!(resolver.argument_list(), vec!["-q 20", "--trim"]);
}
