//! End-to-end shape of an initialization script: fetch metainfo through the
//! bridge, resolve a declared tool, run it, check the produced artifact.
//! A fixture executable stands in for the real aligner toolchain.

#![cfg(unix)]

use async_trait::async_trait;
use biotask::core::bridge::{ObjectRef, PlatformBridge};
use biotask::core::config::PlatformConfig;
use biotask::core::storage::{FormatPattern, StorageUnit};
use biotask::core::tools::TokioProcessRunner;
use biotask::core::types::ErrorCategory;
use biotask::types::metainfo::keys;
use biotask::types::{FileKind, Metainfo, MetainfoValue};
use biotask::{TaskContext, TaskError, ToolResolver};
use serde_json::Value;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// The header the fixture `samtools` emits for `view -H x.bam`.
const BAM_HEADER: &str = "@HD\tVN:1.0\tSO:coordinate\n\
                          @SQ\tSN:chr1\tLN:248956422\n\
                          @PG\tID:bwa\tPN:bwa\tVN:0.7.17\n";

/// Bridge stub that serves one canned metainfo record.
struct MetainfoBridge {
    metainfo: Metainfo,
}

#[async_trait]
impl PlatformBridge for MetainfoBridge {
    async fn invoke(
        &self,
        _target: &ObjectRef,
        method: &str,
        _types: &[&str],
        _values: Vec<Value>,
    ) -> Result<Value, TaskError> {
        match method {
            "getMetainfo" => Ok(self.metainfo.to_wire()),
            _ => Ok(Value::Null),
        }
    }

    async fn get(
        &self,
        _target: &ObjectRef,
        _key: &str,
        _format_pattern: Option<&FormatPattern>,
        _working_dir: &Path,
    ) -> Result<Vec<StorageUnit>, TaskError> {
        Ok(vec![])
    }

    async fn put(
        &self,
        _target: &ObjectRef,
        _key: &str,
        _units: &[StorageUnit],
    ) -> Result<(), TaskError> {
        Ok(())
    }

    async fn set_format(
        &self,
        _target: &ObjectRef,
        _key: &str,
        _units: &[StorageUnit],
    ) -> Result<(), TaskError> {
        Ok(())
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
        Ok(vec![])
    }

    async fn send_index(&self, _target: &ObjectRef, _values: &[Value]) -> Result<(), TaskError> {
        Ok(())
    }
}

struct Sandbox {
    _temp: TempDir,
    ctx: TaskContext,
}

fn sandbox(metainfo: Metainfo) -> Sandbox {
    let temp = TempDir::new().unwrap();
    let programs = temp.path().join("programs");
    let task_dir = temp.path().join("task");
    fs::create_dir_all(&programs).unwrap();
    fs::create_dir_all(&task_dir).unwrap();

    // Fixture samtools: answers `view -H <bam>` with the known header.
    let tool_dir = programs.join("samtools/0.1.19");
    fs::create_dir_all(&tool_dir).unwrap();
    let script = format!(
        "#!/bin/sh\nif [ \"$1\" = view ] && [ \"$2\" = -H ]; then\n  printf '{}'\nelse\n  echo \"unexpected arguments: $*\" >&2\n  exit 64\nfi\n",
        BAM_HEADER.replace('\n', "\\n").replace('\t', "\\t")
    );
    let tool_path = tool_dir.join("samtools");
    fs::write(&tool_path, script).unwrap();
    fs::set_permissions(&tool_path, fs::Permissions::from_mode(0o755)).unwrap();

    let mut config = PlatformConfig::default();
    config.directories.programs = programs;

    let ctx = TaskContext::with_parts(
        3001,
        &task_dir,
        config,
        Arc::new(MetainfoBridge { metainfo }),
        Arc::new(TokioProcessRunner),
    );
    Sandbox { _temp: temp, ctx }
}

#[tokio::test]
async fn declared_samtools_header_capture_round_trip() {
    let mut metainfo = Metainfo::new();
    metainfo.replace(
        keys::tool_version("samtools"),
        MetainfoValue::string("0.1.19"),
    );
    let sandbox = sandbox(metainfo);

    // The script reads its own file's metainfo through the bridge, then
    // resolves and runs the declared tool.
    let file = sandbox.ctx.active_file(FileKind::AlignedReads);
    let metainfo = file.metainfo().await.unwrap();
    assert_eq!(metainfo.tool_version("samtools"), Some("0.1.19"));

    let resolver = ToolResolver::new(&sandbox.ctx, &metainfo);
    let samtools = resolver.tool("samtools", "samtools").unwrap();
    let header = samtools.output(&["view", "-H", "x.bam"]).await.unwrap();

    assert_eq!(header, BAM_HEADER);
}

#[tokio::test]
async fn undeclared_seqtk_fails_before_spawning() {
    let sandbox = sandbox(Metainfo::new());

    let file = sandbox.ctx.active_file(FileKind::UnalignedReads);
    let metainfo = file.metainfo().await.unwrap();

    let resolver = ToolResolver::new(&sandbox.ctx, &metainfo);
    let err = resolver.tool("seqtk", "seqtk").unwrap_err();

    assert_eq!(err.category, ErrorCategory::DeclarationError);
    assert!(err.message.contains("seqtk"));
}

#[tokio::test]
async fn redirected_run_and_artifact_check() {
    let mut metainfo = Metainfo::new();
    metainfo.replace(
        keys::tool_version("samtools"),
        MetainfoValue::string("0.1.19"),
    );
    let sandbox = sandbox(metainfo);

    let file = sandbox.ctx.active_file(FileKind::AlignedReads);
    let metainfo = file.metainfo().await.unwrap();
    let resolver = ToolResolver::new(&sandbox.ctx, &metainfo);
    let samtools = resolver.tool("samtools", "samtools").unwrap();

    let header_path = sandbox.ctx.task_dir().join("header.sam");
    samtools
        .command(&["view", "-H", "x.bam"])
        .run(Some(&header_path))
        .await
        .unwrap();

    // Post-condition check every script performs on its outputs.
    if !header_path.exists() {
        panic!("{}", TaskError::missing_artifact(&header_path));
    }
    assert_eq!(fs::read_to_string(&header_path).unwrap(), BAM_HEADER);
}

#[tokio::test]
async fn absent_artifact_is_an_output_integrity_error() {
    let expected = PathBuf::from("never/produced.bam");
    let err = TaskError::missing_artifact(&expected);
    assert_eq!(err.category, ErrorCategory::OutputIntegrityError);
    assert!(err.message.contains("never/produced.bam"));
}
