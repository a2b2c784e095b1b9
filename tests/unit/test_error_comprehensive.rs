use biotask::core::error::TaskError;
use biotask::core::types::{ErrorCategory, ErrorSeverity};

#[test]
fn test_error_creation_all_categories() {
    let categories = vec![
        ErrorCategory::DeclarationError,
        ErrorCategory::ResolutionError,
        ErrorCategory::ExecutionError,
        ErrorCategory::OutputIntegrityError,
        ErrorCategory::ValidationError,
        ErrorCategory::IoError,
        ErrorCategory::SerializationError,
        ErrorCategory::PlatformError,
        ErrorCategory::InternalError,
    ];

    for category in categories {
        let error = TaskError::new(category, "test message");
        assert_eq!(error.category, category);
        assert_eq!(error.message, "test message");
        assert_eq!(error.context.len(), 0);
        assert!(error.occurred_at <= chrono::Utc::now());
        assert!(error.source.is_none());
        assert_eq!(error.severity(), ErrorSeverity::Error);
    }
}

#[test]
fn test_error_add_context() {
    let mut error = TaskError::new(ErrorCategory::ExecutionError, "tool failed");

    error.add_context("tool_name", "samtools");
    error.add_context("exit_code", "137");

    assert_eq!(error.context.len(), 2);
    assert_eq!(error.context.get("tool_name"), Some(&"samtools".to_string()));
    assert_eq!(error.context.get("exit_code"), Some(&"137".to_string()));
}

#[test]
fn test_error_display_includes_code_and_category() {
    let error =
        TaskError::new(ErrorCategory::ResolutionError, "toolset missing").with_code("TOOL-002");
    let text = error.to_string();
    assert!(text.contains("TOOL-002"));
    assert!(text.contains("ResolutionError"));
    assert!(text.contains("toolset missing"));
}

#[test]
fn test_error_display_includes_context_and_source() {
    let mut error = TaskError::with_source(
        ErrorCategory::PlatformError,
        "bridge request failed",
        "connection refused".into(),
    );
    error.add_context("path", "invoke");
    let text = error.to_string();
    assert!(text.contains("Context"));
    assert!(text.contains("Caused by: connection refused"));
}

#[test]
fn test_default_codes_are_unique() {
    let first = TaskError::new(ErrorCategory::InternalError, "a");
    let second = TaskError::new(ErrorCategory::InternalError, "b");
    assert_ne!(first.code, second.code);
    assert!(first.code.starts_with("ERR-"));
}

#[test]
fn test_from_io_error() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing file");
    let error: TaskError = io_error.into();
    assert_eq!(error.category, ErrorCategory::IoError);
    assert!(error.source.is_some());
}

#[test]
fn test_from_serde_error() {
    let json_error = serde_json::from_str::<serde_json::Value>("{broken").unwrap_err();
    let error: TaskError = json_error.into();
    assert_eq!(error.category, ErrorCategory::SerializationError);
}

#[test]
fn test_from_wire_error() {
    let wire_error = biotask::types::WireError::UnknownTag("x.Y".to_string());
    let error: TaskError = wire_error.into();
    assert_eq!(error.category, ErrorCategory::SerializationError);
    assert!(error.message.contains("x.Y"));
}

#[test]
fn test_missing_tool_version_helper() {
    let error = TaskError::missing_tool_version("seqtk");
    assert_eq!(error.category, ErrorCategory::DeclarationError);
    assert_eq!(error.code, "TOOL-001");
    assert!(error.message.contains("seqtk"));
    assert!(error.message.contains("metainfo"));
}

#[test]
fn test_missing_artifact_helper() {
    let error = TaskError::missing_artifact(std::path::Path::new("out/result.bam"));
    assert_eq!(error.category, ErrorCategory::OutputIntegrityError);
    assert!(error.message.contains("out/result.bam"));
}
