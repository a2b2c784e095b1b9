use serde::{Deserialize, Serialize};

/// Error category enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// A required tool-version metainfo key is missing.
    DeclarationError,
    /// A declared tool/version cannot be located on disk, or conflicts with
    /// a version already resolved in this task.
    ResolutionError,
    /// A spawned tool exited non-zero or could not be spawned.
    ExecutionError,
    /// An expected output artifact is absent after a tool completed.
    OutputIntegrityError,
    ValidationError,
    IoError,
    SerializationError,
    /// The platform bridge refused or failed a request.
    PlatformError,
    InternalError,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Error severity enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Error,
    Warning,
    Info,
    Debug,
}

