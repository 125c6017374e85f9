//! # Remote Path Index & Sync Provider
//!
//! Maps a virtual, `/`-separated folder hierarchy onto a remote backend's
//! opaque id graph and exposes the file operations a sync orchestrator needs.
//!
//! ## Overview
//!
//! - **Roots** (`roots`): resolves configured root declarations to backend node ids
//! - **Path Index** (`tree`): virtual folder path -> node id, built from an unordered listing
//! - **Quota Guard** (`guard`): classifies backend failures, one cooldown + retry on quota
//! - **Listing** (`listing`): pagination until the backend stops returning tokens
//! - **Provider** (`provider`): per-site session with create/upload/download/delete/exists
//! - **Work** (`work`): `(local_path, remote_path, operation)` items and a bounded worker pool
//!
//! ## Usage
//!
//! ```ignore
//! use core_sync::{SyncProvider, WorkItem, WorkerPool};
//! use std::sync::Arc;
//!
//! let provider = Arc::new(SyncProvider::new(site, backend, shutdown));
//! provider.activate().await?;
//!
//! let pool = WorkerPool::new(Arc::clone(&provider));
//! let outcomes = pool
//!     .run(vec![WorkItem::upload("/proj/sh010/comp.exr", "/My Drive/proj/sh010", false)])
//!     .await;
//! ```

pub mod error;
pub mod guard;
pub mod listing;
pub mod path;
pub mod provider;
pub mod roots;
pub mod tree;
pub mod work;

pub use error::{Result, SyncError};
pub use guard::QuotaGuard;
pub use provider::SyncProvider;
pub use roots::{ResolvedRoots, RootResolver, PERSONAL_ROOT_NAME};
pub use tree::{PathIndex, PendingFolder, Root, TreeBuildReport, TreeBuilder};
pub use work::{SyncOperation, WorkItem, WorkOutcome, WorkResult, WorkerPool};
