//! Execution tests drive real child processes through fixture shell scripts
//! installed into a temporary programs directory.

#![cfg(unix)]

use biotask::core::types::ErrorCategory;
use biotask::Toolset;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn install_script(programs: &Path, toolset: &str, version: &str, tool: &str, body: &str) -> PathBuf {
    let dir = programs.join(toolset).join(version);
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(tool);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[tokio::test]
async fn capture_returns_exact_stdout() {
    let temp = TempDir::new().unwrap();
    install_script(
        temp.path(),
        "seqtk",
        "1.4",
        "seqtk",
        "printf 'line1\\nline2\\n'",
    );

    let toolset = Toolset::locate(temp.path(), "seqtk", "1.4").unwrap();
    let output = toolset.tool("seqtk").unwrap().output(&[]).await.unwrap();
    assert_eq!(output, "line1\nline2\n");
}

#[tokio::test]
async fn capture_sees_arguments_in_order() {
    let temp = TempDir::new().unwrap();
    install_script(temp.path(), "echotool", "1.0", "echotool", "echo \"$@\"");

    let toolset = Toolset::locate(temp.path(), "echotool", "1.0").unwrap();
    let output = toolset
        .tool("echotool")
        .unwrap()
        .output(&["view", "-H", "x.bam"])
        .await
        .unwrap();
    assert_eq!(output, "view -H x.bam\n");
}

#[tokio::test]
async fn redirect_writes_stdout_byte_for_byte() {
    let temp = TempDir::new().unwrap();
    // No trailing newline: the redirect target must match exactly.
    install_script(
        temp.path(),
        "seqtk",
        "1.4",
        "seqtk",
        "printf 'ACGT\\tNNNN'",
    );
    let task_dir = temp.path().join("task");
    fs::create_dir_all(&task_dir).unwrap();

    let toolset = Toolset::locate(temp.path(), "seqtk", "1.4").unwrap();
    let target = task_dir.join("subsampled.fq");
    toolset
        .tool("seqtk")
        .unwrap()
        .command(&[])
        .run(Some(&target))
        .await
        .unwrap();

    assert_eq!(fs::read(&target).unwrap(), b"ACGT\tNNNN");
}

#[tokio::test]
async fn nonzero_exit_is_an_execution_error() {
    let temp = TempDir::new().unwrap();
    install_script(temp.path(), "brokentool", "0.9", "brokentool", "exit 3");

    let toolset = Toolset::locate(temp.path(), "brokentool", "0.9").unwrap();
    let err = toolset
        .tool("brokentool")
        .unwrap()
        .run(&[])
        .await
        .unwrap_err();

    assert_eq!(err.category, ErrorCategory::ExecutionError);
    assert!(err.message.contains("exit status 3"));
}

#[tokio::test]
async fn capture_failure_carries_exit_code_context() {
    let temp = TempDir::new().unwrap();
    install_script(
        temp.path(),
        "brokentool",
        "0.9",
        "brokentool",
        "echo 'partial output'; exit 2",
    );

    let toolset = Toolset::locate(temp.path(), "brokentool", "0.9").unwrap();
    let err = toolset
        .tool("brokentool")
        .unwrap()
        .output(&[])
        .await
        .unwrap_err();

    assert_eq!(err.category, ErrorCategory::ExecutionError);
    assert_eq!(err.context.get("exit_code"), Some(&"2".to_string()));
}

#[tokio::test]
async fn capture_excludes_stderr() {
    let temp = TempDir::new().unwrap();
    install_script(
        temp.path(),
        "chattytool",
        "1.0",
        "chattytool",
        "echo 'to stdout'; echo 'to stderr' >&2",
    );

    let toolset = Toolset::locate(temp.path(), "chattytool", "1.0").unwrap();
    let output = toolset
        .tool("chattytool")
        .unwrap()
        .output(&[])
        .await
        .unwrap();
    assert_eq!(output, "to stdout\n");
}

#[tokio::test]
async fn auxiliary_toolsets_join_the_search_path() {
    let temp = TempDir::new().unwrap();
    // The primary tool calls `auxhelper` by bare name; it only exists in the
    // auxiliary toolset's directory, so it must arrive via PATH.
    install_script(temp.path(), "pipeline", "2.0", "pipeline", "auxhelper");
    install_script(
        temp.path(),
        "helpers",
        "0.2.6",
        "auxhelper",
        "echo 'helper ran'",
    );

    let mut primary = Toolset::locate(temp.path(), "pipeline", "2.0").unwrap();
    let aux = Toolset::locate(temp.path(), "helpers", "0.2.6").unwrap();
    primary.uses(&aux);

    let output = primary
        .tool("pipeline")
        .unwrap()
        .output(&[])
        .await
        .unwrap();
    assert_eq!(output, "helper ran\n");
}

#[tokio::test]
async fn own_directory_shadows_auxiliary_entries() {
    let temp = TempDir::new().unwrap();
    // Both toolsets ship `probe`; the primary's own directory comes first.
    install_script(temp.path(), "pipeline", "2.0", "pipeline", "probe");
    install_script(temp.path(), "pipeline", "2.0", "probe", "echo 'primary probe'");
    install_script(temp.path(), "helpers", "0.2.6", "probe", "echo 'aux probe'");

    let mut primary = Toolset::locate(temp.path(), "pipeline", "2.0").unwrap();
    let aux = Toolset::locate(temp.path(), "helpers", "0.2.6").unwrap();
    primary.uses(&aux);

    let output = primary
        .tool("pipeline")
        .unwrap()
        .output(&[])
        .await
        .unwrap();
    assert_eq!(output, "primary probe\n");
}

#[tokio::test]
async fn command_runs_in_requested_directory() {
    let temp = TempDir::new().unwrap();
    install_script(temp.path(), "wheretool", "1.0", "wheretool", "pwd");
    let work = temp.path().join("work");
    fs::create_dir_all(&work).unwrap();

    let toolset = Toolset::locate(temp.path(), "wheretool", "1.0").unwrap();
    let output = toolset
        .tool("wheretool")
        .unwrap()
        .command(&[])
        .current_dir(&work)
        .capture()
        .await
        .unwrap();
    assert_eq!(
        PathBuf::from(output.trim_end()).canonicalize().unwrap(),
        work.canonicalize().unwrap()
    );
}
