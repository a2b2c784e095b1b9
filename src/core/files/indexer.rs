//! Index submission that overlaps with record production.
//!
//! At most one submission is in flight: handing over a new batch first waits
//! for the previous one, so a backend failure surfaces on the next call (or
//! at `finish`) instead of being silently dropped.

#![allow(clippy::result_large_err)]

use crate::core::bridge::{ObjectRef, PlatformBridge};
use crate::core::error::TaskError;
use crate::core::files::TaskFile;
use crate::core::types::ErrorCategory;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct Indexer {
    target: ObjectRef,
    bridge: Arc<dyn PlatformBridge>,
    pending: Option<JoinHandle<Result<(), TaskError>>>,
}

impl Indexer {
    pub fn new(file: &TaskFile) -> Self {
        Indexer {
            target: file.target().clone(),
            bridge: file.bridge(),
            pending: None,
        }
    }

    /// Queue a batch of records. Waits for the previous batch first, so any
    /// earlier submission error is raised here.
    pub async fn index_records(&mut self, records: Vec<Value>) -> Result<(), TaskError> {
        self.await_pending().await?;
        if records.is_empty() {
            return Ok(());
        }
        let bridge = self.bridge.clone();
        let target = self.target.clone();
        self.pending = Some(tokio::spawn(async move {
            bridge.send_index(&target, &records).await
        }));
        Ok(())
    }

    /// Wait for the last in-flight submission. Must be called before the
    /// script moves on; dropping an `Indexer` with work in flight loses the
    /// error.
    pub async fn finish(mut self) -> Result<(), TaskError> {
        self.await_pending().await
    }

    async fn await_pending(&mut self) -> Result<(), TaskError> {
        if let Some(handle) = self.pending.take() {
            handle.await.map_err(|err| {
                TaskError::new(
                    ErrorCategory::InternalError,
                    format!("index submission task failed: {err}"),
                )
            })??;
        }
        Ok(())
    }
}
