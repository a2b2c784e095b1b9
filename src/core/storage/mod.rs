//! Storage units and format patterns: the shapes GET/PUT exchange with the
//! platform's storage layer.

#![allow(clippy::result_large_err)]

use crate::core::error::TaskError;
use crate::core::types::ErrorCategory;
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Format descriptor attached to a storage unit: key -> value, e.g.
/// `{"format": "PHRED33", "compression": "gzip"}`.
pub type FormatMap = IndexMap<String, String>;

/// One unit of stored data: a group of files sharing a single format.
/// Base names inside a unit must be unique; the backend flattens them into
/// one directory.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageUnit {
    files: Vec<PathBuf>,
    format: Option<FormatMap>,
}

impl StorageUnit {
    /// Single-file unit without format.
    pub fn new(file: impl Into<PathBuf>) -> Self {
        StorageUnit {
            files: vec![file.into()],
            format: None,
        }
    }

    /// Multi-file unit. Fails when two files share a base name.
    pub fn with_files(
        files: Vec<PathBuf>,
        format: Option<FormatMap>,
    ) -> Result<Self, TaskError> {
        let mut base_names = HashSet::new();
        for file in &files {
            let base = file
                .file_name()
                .ok_or_else(|| {
                    TaskError::new(
                        ErrorCategory::ValidationError,
                        format!("Storage unit path has no file name: {}", file.display()),
                    )
                })?
                .to_os_string();
            if !base_names.insert(base) {
                return Err(TaskError::new(
                    ErrorCategory::ValidationError,
                    format!(
                        "Files with the same base name in one storage unit are prohibited: {}",
                        file.display()
                    ),
                ));
            }
        }
        Ok(StorageUnit { files, format })
    }

    pub fn set_format(&mut self, format: FormatMap) {
        self.format = Some(format);
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// First file of the unit. Most units hold exactly one file.
    pub fn first_file(&self) -> &Path {
        &self.files[0]
    }

    pub fn format(&self) -> Option<&FormatMap> {
        self.format.as_ref()
    }

    /// Fail when any of the unit's files is absent on disk.
    pub fn validate_exists(&self) -> Result<(), TaskError> {
        let missing: Vec<_> = self
            .files
            .iter()
            .filter(|path| !path.exists())
            .map(|path| path.display().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(TaskError::new(
                ErrorCategory::ValidationError,
                format!("Files do not exist: {}", missing.join(", ")),
            ));
        }
        Ok(())
    }

    /// Wire representation with paths made absolute against `task_dir`.
    /// Every path must stay inside the task directory.
    pub fn to_wire(&self, task_dir: &Path) -> Result<Value, TaskError> {
        let mut absolute = Vec::with_capacity(self.files.len());
        for file in &self.files {
            absolute.push(ensure_inside(task_dir, file)?.display().to_string());
        }
        Ok(json!({ "files": absolute, "format": self.format }))
    }

    /// Decode the bridge's `{"files": ..., "format": ...}` shape.
    pub fn from_wire(value: &Value) -> Result<Self, TaskError> {
        let files = value
            .get("files")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                TaskError::new(
                    ErrorCategory::SerializationError,
                    format!("Storage unit without \"files\": {value}"),
                )
            })?
            .iter()
            .filter_map(Value::as_str)
            .map(PathBuf::from)
            .collect::<Vec<_>>();
        let format = value.get("format").and_then(Value::as_object).map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        });
        Ok(StorageUnit { files, format })
    }
}

/// Resolve `path` against `base` and verify the result stays inside `base`.
/// Normalization is purely lexical so that not-yet-existing output paths can
/// be checked too.
pub fn ensure_inside(base: &Path, path: &Path) -> Result<PathBuf, TaskError> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(outside_error(base, path));
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    if !normalized.starts_with(base) {
        return Err(outside_error(base, path));
    }
    Ok(normalized)
}

fn outside_error(base: &Path, path: &Path) -> TaskError {
    TaskError::new(
        ErrorCategory::ValidationError,
        format!(
            "\"{}\" is outside the task directory {}",
            path.display(),
            base.display()
        ),
    )
}

/// A format pattern is a list of format maps; a format matches the pattern
/// when it satisfies at least one map (every listed key present with one of
/// the allowed values). An empty map matches anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatPattern {
    maps: Vec<IndexMap<String, Vec<String>>>,
}

impl FormatPattern {
    pub fn any() -> Self {
        FormatPattern {
            maps: vec![IndexMap::new()],
        }
    }

    pub fn new(maps: Vec<IndexMap<String, Vec<String>>>) -> Self {
        FormatPattern { maps }
    }

    /// Single-map shorthand.
    pub fn with(key: impl Into<String>, allowed: Vec<String>) -> Self {
        let mut map = IndexMap::new();
        map.insert(key.into(), allowed);
        FormatPattern { maps: vec![map] }
    }

    /// Merge another pattern's alternatives into this one.
    pub fn add(&mut self, other: &FormatPattern) {
        self.maps.extend(other.maps.iter().cloned());
    }

    pub fn matches(&self, format: &FormatMap) -> bool {
        self.maps.iter().any(|pattern| {
            pattern.iter().all(|(key, allowed)| {
                format
                    .get(key)
                    .map(|value| allowed.contains(value))
                    .unwrap_or(false)
            })
        })
    }

    pub fn to_wire(&self) -> Value {
        json!(self
            .maps
            .iter()
            .map(|map| {
                map.iter()
                    .map(|(k, v)| (k.clone(), json!(v)))
                    .collect::<serde_json::Map<_, _>>()
            })
            .collect::<Vec<_>>())
    }
}
