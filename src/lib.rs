pub mod core;
pub mod logging;
pub mod utils;

pub use biotask_types as types;

pub use crate::core::bridge::{HttpBridge, ObjectRef, PlatformBridge};
pub use crate::core::context::TaskContext;
pub use crate::core::error::TaskError;
pub use crate::core::files::TaskFile;
pub use crate::core::storage::{FormatPattern, StorageUnit};
pub use crate::core::tools::{Command, Tool, ToolResolver, Toolset};

/// Current crate version string exposed for scripts and tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub type Result<T> = std::result::Result<T, TaskError>;
