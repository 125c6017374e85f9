//! # Google Drive Provider
//!
//! Implements the `RemoteBackend` trait for Google Drive API v3.
//!
//! ## Overview
//!
//! This crate provides:
//! - Personal root and shared drive discovery
//! - Paginated folder and file listings across every drive the credential sees
//! - Folder creation and resumable, chunked file uploads
//! - Streaming media downloads
//! - Classification of Drive error payloads (quota, permission, not found)
//!
//! Path handling, caching and quota cooldowns live in `core-sync`; this crate
//! only speaks the Drive wire protocol by node id.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::GoogleDriveBackend;
pub use error::GoogleDriveError;
