//! The platform bridge: the task's only channel to the host platform.
//!
//! Everything behind it — metainfo storage, the storage layer, download
//! workers, indexing — is the platform's business; the task only sees the
//! request/response contract modeled here. The trait seam exists so tests
//! can substitute a recording bridge for the HTTP one.

#![allow(clippy::result_large_err)]

pub mod http;

pub use http::HttpBridge;

use crate::core::error::TaskError;
use crate::core::storage::{FormatPattern, StorageUnit};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Maximum JSON body the platform accepts per request.
pub const MAX_CONTENT_SIZE: usize = 5_000_000;

/// Identifies a platform object on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub object_id: i64,
    pub interface_name: &'static str,
}

impl ObjectRef {
    pub fn new(object_id: i64, interface_name: &'static str) -> Self {
        ObjectRef {
            object_id,
            interface_name,
        }
    }
}

#[async_trait]
pub trait PlatformBridge: Send + Sync {
    /// Invoke a backend method on the object and return the decoded result.
    async fn invoke(
        &self,
        target: &ObjectRef,
        method: &str,
        types: &[&str],
        values: Vec<Value>,
    ) -> Result<Value, TaskError>;

    /// Copy stored data for a key into the working directory.
    async fn get(
        &self,
        target: &ObjectRef,
        key: &str,
        format_pattern: Option<&FormatPattern>,
        working_dir: &Path,
    ) -> Result<Vec<StorageUnit>, TaskError>;

    /// Store local files under a key.
    async fn put(
        &self,
        target: &ObjectRef,
        key: &str,
        units: &[StorageUnit],
    ) -> Result<(), TaskError>;

    /// Re-declare the format of already stored units.
    async fn set_format(
        &self,
        target: &ObjectRef,
        key: &str,
        units: &[StorageUnit],
    ) -> Result<(), TaskError>;

    /// Ask the platform to fetch every external link under `links_key` into
    /// storage under `storage_key`, staging copies in the working directory.
    async fn download(
        &self,
        target: &ObjectRef,
        storage_key: &str,
        links_key: &str,
        fold: bool,
        put_to_storage: bool,
        working_dir: &Path,
    ) -> Result<Vec<PathBuf>, TaskError>;

    /// Submit one batch of index records. Callers are responsible for
    /// keeping batches under [`MAX_CONTENT_SIZE`]; see
    /// [`chunk_index_values`].
    async fn send_index(&self, target: &ObjectRef, values: &[Value]) -> Result<(), TaskError>;
}

/// Split index records into chunks whose serialized size stays under the
/// platform's body cap. The estimate uses the first record's size, as the
/// records of one index are homogeneous.
pub fn chunk_index_values(values: &[Value]) -> Result<Vec<&[Value]>, TaskError> {
    if values.is_empty() {
        return Ok(vec![]);
    }

    let record_size = serde_json::to_string(&values[0])?.len();
    if record_size > MAX_CONTENT_SIZE {
        return Err(TaskError::new(
            crate::core::types::ErrorCategory::ValidationError,
            format!("Index record is too large: {record_size} bytes"),
        ));
    }

    let total = record_size * values.len();
    if total <= MAX_CONTENT_SIZE {
        return Ok(vec![values]);
    }

    let chunk_count = total.div_ceil(MAX_CONTENT_SIZE);
    let chunk_size = values.len().div_ceil(chunk_count);
    Ok(values.chunks(chunk_size).collect())
}
