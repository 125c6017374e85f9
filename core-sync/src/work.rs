//! # Work Items & Worker Pool
//!
//! The orchestrator decides *what* to sync and hands the provider
//! `(local_path, remote_path, operation)` triples. [`WorkerPool`] executes
//! them on the tokio runtime, never more than `max_concurrent_operations` at
//! a time, and reports one [`WorkOutcome`] per item in input order.
//!
//! A failed item never aborts the batch; retry/skip policy belongs to the
//! caller. Once the session's shutdown token fires, items that have not
//! started yet are reported as [`SyncError::Cancelled`].

use crate::error::{Result, SyncError};
use crate::provider::SyncProvider;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Operation to perform for one work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncOperation {
    Upload { overwrite: bool },
    Download { overwrite: bool },
    DeleteFile,
    DeleteFolder { force: bool },
}

/// A single unit of sync work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Local file (upload source, download target); ignored by deletes
    pub local_path: PathBuf,
    /// Virtual path on the remote site
    pub remote_path: String,
    pub operation: SyncOperation,
}

impl WorkItem {
    pub fn upload(local_path: impl Into<PathBuf>, remote_path: impl Into<String>, overwrite: bool) -> Self {
        Self {
            local_path: local_path.into(),
            remote_path: remote_path.into(),
            operation: SyncOperation::Upload { overwrite },
        }
    }

    pub fn download(remote_path: impl Into<String>, local_path: impl Into<PathBuf>, overwrite: bool) -> Self {
        Self {
            local_path: local_path.into(),
            remote_path: remote_path.into(),
            operation: SyncOperation::Download { overwrite },
        }
    }

    pub fn delete_file(remote_path: impl Into<String>) -> Self {
        Self {
            local_path: PathBuf::new(),
            remote_path: remote_path.into(),
            operation: SyncOperation::DeleteFile,
        }
    }

    pub fn delete_folder(remote_path: impl Into<String>, force: bool) -> Self {
        Self {
            local_path: PathBuf::new(),
            remote_path: remote_path.into(),
            operation: SyncOperation::DeleteFolder { force },
        }
    }
}

/// What a successful item produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkResult {
    Uploaded { file_id: String },
    Downloaded { file_name: String },
    Deleted,
}

/// Result of one work item
#[derive(Debug)]
pub struct WorkOutcome {
    pub item: WorkItem,
    pub result: Result<WorkResult>,
}

impl WorkOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs one work item against the provider.
pub async fn execute(provider: &SyncProvider, item: &WorkItem) -> Result<WorkResult> {
    match item.operation {
        SyncOperation::Upload { overwrite } => provider
            .upload_file(&item.local_path, &item.remote_path, overwrite)
            .await
            .map(|file_id| WorkResult::Uploaded { file_id }),
        SyncOperation::Download { overwrite } => provider
            .download_file(&item.remote_path, &item.local_path, overwrite)
            .await
            .map(|file_name| WorkResult::Downloaded { file_name }),
        SyncOperation::DeleteFile => provider
            .delete_file(&item.remote_path)
            .await
            .map(|_| WorkResult::Deleted),
        SyncOperation::DeleteFolder { force } => provider
            .delete_folder(&item.remote_path, force)
            .await
            .map(|_| WorkResult::Deleted),
    }
}

enum Slot {
    Running(WorkItem, JoinHandle<Result<WorkResult>>),
    Skipped(WorkItem),
}

/// Bounded executor for work items of one provider session
pub struct WorkerPool {
    provider: Arc<SyncProvider>,
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(provider: Arc<SyncProvider>) -> Self {
        let permits = provider.settings().max_concurrent_operations.max(1);
        Self {
            provider,
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn provider(&self) -> &Arc<SyncProvider> {
        &self.provider
    }

    /// Executes `items`, returning their outcomes in input order.
    pub async fn run(&self, items: Vec<WorkItem>) -> Vec<WorkOutcome> {
        let shutdown = self.provider.shutdown_token().clone();
        let total = items.len();
        let mut slots = Vec::with_capacity(total);

        for item in items {
            let permit = tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                permit = Arc::clone(&self.semaphore).acquire_owned() => permit.ok(),
            };

            let Some(permit) = permit else {
                slots.push(Slot::Skipped(item));
                continue;
            };

            let provider = Arc::clone(&self.provider);
            let task_item = item.clone();
            let handle = tokio::spawn(async move {
                let result = execute(&provider, &task_item).await;
                drop(permit);
                result
            });
            slots.push(Slot::Running(item, handle));
        }

        let mut outcomes = Vec::with_capacity(total);
        for slot in slots {
            let outcome = match slot {
                Slot::Running(item, handle) => {
                    let result = match handle.await {
                        Ok(result) => result,
                        Err(e) => {
                            error!(error = %e, remote_path = %item.remote_path, "Work item task failed");
                            Err(SyncError::Transport(format!("Work item task failed: {}", e)))
                        }
                    };
                    if let Err(e) = &result {
                        if e.is_fatal() {
                            error!(error = %e, remote_path = %item.remote_path, "Work item hit a session-level failure");
                        }
                    }
                    WorkOutcome { item, result }
                }
                Slot::Skipped(item) => {
                    debug!(remote_path = %item.remote_path, "Work item skipped after shutdown");
                    WorkOutcome {
                        item,
                        result: Err(SyncError::Cancelled),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        info!(
            site = %self.provider.site_name(),
            total,
            failed,
            "Work batch finished"
        );
        outcomes
    }
}
