//! HTTP implementation of the platform bridge: JSON POSTs to the task-local
//! proxy, authenticated with the task token.

#![allow(clippy::result_large_err)]

use super::{chunk_index_values, ObjectRef, PlatformBridge};
use crate::core::config::PlatformConfig;
use crate::core::error::TaskError;
use crate::core::storage::{ensure_inside, FormatPattern, StorageUnit};
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

const TOKEN_HEADER: &str = "Biotask-Token";

/// Tags the proxy wraps special results in.
const NULL_TAG: &str = "com.biotask.bridge.JsonNull";
const EXCEPTION_TAG: &str = "com.biotask.bridge.ExceptionWrapper";

pub struct HttpBridge {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    task_dir: PathBuf,
}

impl HttpBridge {
    pub fn new(config: &PlatformConfig, task_dir: &Path) -> Self {
        let token = std::env::var(&config.bridge.token_var).ok();
        HttpBridge {
            client: reqwest::Client::new(),
            base_url: config.bridge.proxy_url.trim_end_matches('/').to_string(),
            token,
            task_dir: task_dir.to_path_buf(),
        }
    }

    async fn send_request(&self, path: &str, body: Value) -> Result<Value, TaskError> {
        let url = format!("{}/{}", self.base_url, path);
        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.as_u16() != 201 {
            let message = if status.as_u16() == 500 {
                "Internal server error".to_string()
            } else {
                format!("Request to {path} failed, got status {status} expected 201")
            };
            return Err(TaskError::new(ErrorCategory::PlatformError, message)
                .with_code("BRIDGE-001"));
        }

        let payload: Value = response.json().await?;

        // The proxy echoes anything the backend printed while serving us.
        if let Some(stdout) = payload.get("stdout").and_then(Value::as_str) {
            if !stdout.is_empty() {
                tracing::info!(target: "biotask::bridge", "{}", stdout.trim_end());
            }
        }
        if let Some(stderr) = payload.get("stderr").and_then(Value::as_str) {
            if !stderr.is_empty() {
                tracing::warn!(target: "biotask::bridge", "{}", stderr.trim_end());
            }
        }
        if let Some(error) = payload.get("error").and_then(Value::as_str) {
            return Err(
                TaskError::new(ErrorCategory::PlatformError, error.to_string())
                    .with_code("BRIDGE-002"),
            );
        }

        Ok(payload.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Unwrap the proxy's special result envelopes: a wrapped null becomes
    /// `Value::Null`, a wrapped backend exception becomes a platform error.
    fn decode_result(result: Value) -> Result<Value, TaskError> {
        let Some((tag, payload)) = result
            .as_array()
            .filter(|items| items.len() == 2)
            .and_then(|items| items[0].as_str().map(|tag| (tag, &items[1])))
        else {
            return Ok(result);
        };

        match tag {
            NULL_TAG => Ok(Value::Null),
            EXCEPTION_TAG => {
                let class = payload.get("className").and_then(Value::as_str);
                let message = payload
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let uid = payload.get("exceptionUid").and_then(Value::as_str);
                let mut text = String::new();
                if let Some(class) = class {
                    text.push_str(&format!("[{class}]: "));
                }
                text.push_str(message);
                if let Some(uid) = uid {
                    text.push_str(&format!(" (Exception UID: {uid})"));
                }
                Err(TaskError::new(ErrorCategory::PlatformError, text).with_code("BRIDGE-003"))
            }
            _ => Ok(result),
        }
    }

    fn units_to_wire(&self, units: &[StorageUnit]) -> Result<Vec<Value>, TaskError> {
        units
            .iter()
            .map(|unit| unit.to_wire(&self.task_dir))
            .collect()
    }
}

#[async_trait]
impl PlatformBridge for HttpBridge {
    async fn invoke(
        &self,
        target: &ObjectRef,
        method: &str,
        types: &[&str],
        values: Vec<Value>,
    ) -> Result<Value, TaskError> {
        let result = self
            .send_request(
                "invoke",
                json!({
                    "method_name": method,
                    "types": types,
                    "values": values,
                    "interface_name": target.interface_name,
                    "object_id": target.object_id,
                }),
            )
            .await?;
        Self::decode_result(result)
    }

    async fn get(
        &self,
        target: &ObjectRef,
        key: &str,
        format_pattern: Option<&FormatPattern>,
        working_dir: &Path,
    ) -> Result<Vec<StorageUnit>, TaskError> {
        let absolute = ensure_inside(&self.task_dir, working_dir)?;
        let result = self
            .send_request(
                "get",
                json!({
                    "key": key,
                    "interface_name": target.interface_name,
                    "format_pattern": format_pattern.map(FormatPattern::to_wire),
                    "working_dir": absolute.display().to_string(),
                    "object_id": target.object_id,
                }),
            )
            .await?;

        result
            .as_array()
            .ok_or_else(|| {
                TaskError::new(
                    ErrorCategory::SerializationError,
                    format!("get returned a non-list result: {result}"),
                )
            })?
            .iter()
            .map(StorageUnit::from_wire)
            .collect()
    }

    async fn put(
        &self,
        target: &ObjectRef,
        key: &str,
        units: &[StorageUnit],
    ) -> Result<(), TaskError> {
        let storages = self.units_to_wire(units)?;
        self.send_request(
            "put",
            json!({
                "key": key,
                "storages": storages,
                "interface_name": target.interface_name,
                "object_id": target.object_id,
            }),
        )
        .await?;
        Ok(())
    }

    async fn set_format(
        &self,
        target: &ObjectRef,
        key: &str,
        units: &[StorageUnit],
    ) -> Result<(), TaskError> {
        let storages = self.units_to_wire(units)?;
        self.send_request(
            "set_format",
            json!({
                "key": key,
                "storages": storages,
                "interface_name": target.interface_name,
                "object_id": target.object_id,
            }),
        )
        .await?;
        Ok(())
    }

    async fn download(
        &self,
        target: &ObjectRef,
        storage_key: &str,
        links_key: &str,
        fold: bool,
        put_to_storage: bool,
        working_dir: &Path,
    ) -> Result<Vec<PathBuf>, TaskError> {
        let absolute = ensure_inside(&self.task_dir, working_dir)?;
        let result = self
            .send_request(
                "download",
                json!({
                    "storage_key": storage_key,
                    "links_key": links_key,
                    "fold": fold,
                    "put_to_storage": put_to_storage,
                    "interface_name": target.interface_name,
                    "object_id": target.object_id,
                    "working_dir": absolute.display().to_string(),
                }),
            )
            .await?;

        Ok(result
            .as_array()
            .map(|paths| {
                paths
                    .iter()
                    .filter_map(Value::as_str)
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn send_index(&self, target: &ObjectRef, values: &[Value]) -> Result<(), TaskError> {
        for chunk in chunk_index_values(values)? {
            self.send_request(
                "dataindex",
                json!({
                    "object_id": target.object_id,
                    "values": chunk,
                    "interface_name": target.interface_name,
                }),
            )
            .await?;
        }
        Ok(())
    }
}
