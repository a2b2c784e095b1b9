//! Platform file handles: the surface a script uses to read metainfo, stage
//! data in and out of the working directory, and report progress.

#![allow(clippy::result_large_err)]

pub mod indexer;

pub use indexer::Indexer;

use crate::core::bridge::{ObjectRef, PlatformBridge};
use crate::core::error::TaskError;
use crate::core::storage::{FormatPattern, StorageUnit};
use crate::core::types::ErrorCategory;
use crate::utils::files::sha256_digest;
use biotask_types::metainfo::{keys, wire_list};
use biotask_types::{FileKind, Metainfo, MetainfoValue, ValueKind};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const JAVA_STRING: &str = "java.lang.String";
const JAVA_CLASS: &str = "java.lang.Class";
const METAINFO_VALUE_INTERFACE: &str = "com.biotask.api.metainfo.IMetainfoValue";
const FILE_REFERENCE_CLASS: &str = "com.biotask.api.metainfo.FileReference";
const FILE_INTERFACE: &str = "com.biotask.api.files.IFile";

/// Options for [`TaskFile::get`].
#[derive(Default)]
pub struct GetOptions {
    pub format_pattern: Option<FormatPattern>,
    /// Directory to stage into, relative to the task directory. Defaults to
    /// the task directory itself.
    pub working_dir: Option<PathBuf>,
}

/// Options for [`TaskFile::download`].
pub struct DownloadOptions {
    /// Collapse all external links into one storage unit. Required when the
    /// storage key is declared single-valued; all links must then share a
    /// format.
    pub fold: bool,
    /// Also record the fetched data in platform storage (the default).
    pub put_to_storage: bool,
    pub working_dir: Option<PathBuf>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        DownloadOptions {
            fold: false,
            put_to_storage: true,
            working_dir: None,
        }
    }
}

/// Handle to one platform file of a known kind.
#[derive(Clone)]
pub struct TaskFile {
    target: ObjectRef,
    kind: FileKind,
    bridge: Arc<dyn PlatformBridge>,
    task_dir: PathBuf,
}

impl std::fmt::Debug for TaskFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskFile")
            .field("target", &self.target)
            .field("kind", &self.kind)
            .field("task_dir", &self.task_dir)
            .finish_non_exhaustive()
    }
}

impl TaskFile {
    pub fn new(
        object_id: i64,
        kind: FileKind,
        bridge: Arc<dyn PlatformBridge>,
        task_dir: PathBuf,
    ) -> Self {
        TaskFile {
            target: ObjectRef::new(object_id, kind.interface_name()),
            kind,
            bridge,
            task_dir,
        }
    }

    pub fn object_id(&self) -> i64 {
        self.target.object_id
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub(crate) fn target(&self) -> &ObjectRef {
        &self.target
    }

    pub(crate) fn bridge(&self) -> Arc<dyn PlatformBridge> {
        self.bridge.clone()
    }

    /// Fetch and decode this file's metainfo.
    pub async fn metainfo(&self) -> Result<Metainfo, TaskError> {
        let raw = self
            .bridge
            .invoke(&self.target, "getMetainfo", &[], vec![])
            .await?;
        Ok(Metainfo::from_wire(&raw)?)
    }

    /// Append a metainfo value under a key. Keys declared by this file's
    /// kind only accept values of the declared kind.
    pub async fn add_metainfo_value(
        &self,
        key: &str,
        value: MetainfoValue,
    ) -> Result<(), TaskError> {
        self.check_declared_write(key, &value)?;
        let wrapped = wire_list(std::slice::from_ref(&value));
        self.bridge
            .invoke(
                &self.target,
                "addMetainfoValue",
                &[JAVA_STRING, METAINFO_VALUE_INTERFACE],
                vec![json!(key), wrapped],
            )
            .await?;
        Ok(())
    }

    /// Replace all values under a key with a single value.
    pub async fn replace_metainfo_value(
        &self,
        key: &str,
        value: MetainfoValue,
    ) -> Result<(), TaskError> {
        self.check_declared_write(key, &value)?;
        self.bridge
            .invoke(
                &self.target,
                "replaceMetainfoValue",
                &[JAVA_STRING, METAINFO_VALUE_INTERFACE],
                vec![json!(key), value.to_wire()],
            )
            .await?;
        Ok(())
    }

    pub async fn remove_metainfo_value(&self, key: &str) -> Result<(), TaskError> {
        self.bridge
            .invoke(
                &self.target,
                "removeMetainfoValue",
                &[JAVA_STRING],
                vec![json!(key)],
            )
            .await?;
        Ok(())
    }

    /// Set or clear flag bits on a metainfo key.
    pub async fn set_metainfo_flags(
        &self,
        key: &str,
        mask: u32,
        set: bool,
    ) -> Result<(), TaskError> {
        self.bridge
            .invoke(
                &self.target,
                "setMetainfoFlags",
                &[JAVA_STRING, "int", "boolean"],
                vec![json!(key), json!(mask), json!(set)],
            )
            .await?;
        Ok(())
    }

    /// Follow a FileReference metainfo value to another file.
    pub async fn resolve_reference(
        &self,
        key: &str,
        expected: FileKind,
    ) -> Result<TaskFile, TaskError> {
        let metainfo = self.metainfo().await?;
        let value = metainfo.get(key).cloned().ok_or_else(|| {
            TaskError::new(
                ErrorCategory::ValidationError,
                format!("Metainfo has no value at {key:?}"),
            )
        })?;
        self.resolve_one_reference(key, &value, expected).await
    }

    /// Follow every FileReference under a key, in order.
    pub async fn resolve_reference_list(
        &self,
        key: &str,
        expected: FileKind,
    ) -> Result<Vec<TaskFile>, TaskError> {
        let metainfo = self.metainfo().await?;
        let mut resolved = Vec::new();
        for value in metainfo.get_all(key) {
            resolved.push(self.resolve_one_reference(key, value, expected).await?);
        }
        Ok(resolved)
    }

    async fn resolve_one_reference(
        &self,
        key: &str,
        value: &MetainfoValue,
        expected: FileKind,
    ) -> Result<TaskFile, TaskError> {
        if !matches!(value, MetainfoValue::FileReference(_)) {
            return Err(TaskError::new(
                ErrorCategory::ValidationError,
                format!("Metainfo value at {key:?} is not a file reference"),
            ));
        }
        let result = self
            .bridge
            .invoke(
                &self.target,
                "resolveReference",
                &[FILE_REFERENCE_CLASS, JAVA_CLASS],
                vec![value.to_wire(), json!([JAVA_CLASS, FILE_INTERFACE])],
            )
            .await?;
        let object_id = result.get("id").and_then(Value::as_i64).ok_or_else(|| {
            TaskError::new(
                ErrorCategory::PlatformError,
                format!(
                    "Cannot resolve reference {key:?}, \
                     check that the task owner can access the referenced file"
                ),
            )
        })?;
        Ok(TaskFile::new(
            object_id,
            expected,
            self.bridge.clone(),
            self.task_dir.clone(),
        ))
    }

    /// Copy stored data for a key into the working directory.
    pub async fn get(&self, key: &str, options: GetOptions) -> Result<Vec<StorageUnit>, TaskError> {
        tracing::info!(target: "biotask::files", "Getting file for key {:?}", key);
        let working_dir = options
            .working_dir
            .unwrap_or_else(|| self.task_dir.clone());
        self.bridge
            .get(
                &self.target,
                key,
                options.format_pattern.as_ref(),
                &working_dir,
            )
            .await
    }

    /// Store local files under a declared storage key. When the file carries
    /// the checksum marker, a digest of the stored content is recorded next
    /// to the key first.
    pub async fn put(&self, key: &str, units: Vec<StorageUnit>) -> Result<(), TaskError> {
        self.check_declared_storage(key)?;
        for unit in &units {
            unit.validate_exists()?;
        }
        self.record_checksum_conditionally(key, &units).await?;
        tracing::info!(target: "biotask::files", "Putting file for key {:?}", key);
        self.bridge.put(&self.target, key, &units).await
    }

    /// Re-declare the format of already stored units.
    pub async fn set_format(&self, key: &str, units: Vec<StorageUnit>) -> Result<(), TaskError> {
        self.check_declared_storage(key)?;
        self.bridge.set_format(&self.target, key, &units).await
    }

    /// Ask the platform to fetch every external link under `links_key` into
    /// storage under `storage_key`, staging copies in the working directory.
    /// Returns the staged paths.
    pub async fn download(
        &self,
        storage_key: &str,
        links_key: &str,
        options: DownloadOptions,
    ) -> Result<Vec<PathBuf>, TaskError> {
        self.check_declared_storage(storage_key)?;
        tracing::info!(
            target: "biotask::files",
            "Downloading file from key {:?} to {:?}",
            links_key,
            storage_key
        );
        let working_dir = options
            .working_dir
            .unwrap_or_else(|| self.task_dir.clone());
        self.bridge
            .download(
                &self.target,
                storage_key,
                links_key,
                options.fold,
                options.put_to_storage,
                &working_dir,
            )
            .await
    }

    /// Record the current initialization stage, optionally with a percentage.
    pub async fn set_progress_stage(
        &self,
        stage: &str,
        progress: Option<u8>,
    ) -> Result<(), TaskError> {
        let text = match progress {
            Some(progress) => format!("{stage} {:3}%", progress.min(100)),
            None => stage.to_string(),
        };
        self.replace_metainfo_value(keys::PROGRESS_INFO, MetainfoValue::string(text))
            .await
    }

    /// Attach a warning visible to the file's owner.
    pub async fn add_warning(&self, message: &str) -> Result<(), TaskError> {
        self.add_metainfo_value(
            keys::INITIALIZATION_WARNING,
            MetainfoValue::string(message),
        )
        .await
    }

    /// Submit index records for this file. Batches are split to respect the
    /// platform's request-size cap.
    pub async fn send_index(&self, values: &[Value]) -> Result<(), TaskError> {
        self.bridge.send_index(&self.target, values).await
    }

    fn check_declared_write(&self, key: &str, value: &MetainfoValue) -> Result<(), TaskError> {
        let Some(decl) = self.kind.declaration(key) else {
            return Ok(());
        };
        if decl.kind == ValueKind::Storage {
            return Err(TaskError::new(
                ErrorCategory::ValidationError,
                format!(
                    "{key:?} is a storage key of {}; use PUT instead of a metainfo write",
                    self.kind
                ),
            ));
        }
        if !decl.kind.accepts(value) {
            return Err(TaskError::new(
                ErrorCategory::ValidationError,
                format!(
                    "{key:?} on {} expects a {:?} value",
                    self.kind, decl.kind
                ),
            ));
        }
        Ok(())
    }

    fn check_declared_storage(&self, key: &str) -> Result<(), TaskError> {
        match self.kind.declaration(key) {
            Some(decl) if decl.kind == ValueKind::Storage => Ok(()),
            Some(_) => Err(TaskError::new(
                ErrorCategory::ValidationError,
                format!("{key:?} is declared on {} but is not a storage key", self.kind),
            )),
            None => Err(TaskError::new(
                ErrorCategory::ValidationError,
                format!("{key:?} is not a declared storage key of {}", self.kind),
            )),
        }
    }

    async fn record_checksum_conditionally(
        &self,
        key: &str,
        units: &[StorageUnit],
    ) -> Result<(), TaskError> {
        let metainfo = self.metainfo().await?;
        if !metainfo.contains_key(keys::CHECKSUM_MARKER) {
            return Ok(());
        }
        let mut files: Vec<&Path> = Vec::new();
        for unit in units {
            files.extend(unit.files().iter().map(PathBuf::as_path));
        }
        let digest = sha256_digest(&files)?;
        self.replace_metainfo_value(
            &format!("{}{}", keys::CHECKSUM_PREFIX, key),
            MetainfoValue::string(digest),
        )
        .await
    }
}
