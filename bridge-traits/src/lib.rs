//! # Bridge Traits
//!
//! Contracts between the sync core and the collaborators it does not own.
//!
//! ## Overview
//!
//! The path-indexing provider in `core-sync` never talks to a network stack or
//! a credential store directly. Everything it needs from the outside world is
//! expressed as a trait here and injected at session construction:
//!
//! - [`RemoteBackend`](backend::RemoteBackend) - raw folder/file operations against a storage service
//! - [`CredentialSupplier`](backend::CredentialSupplier) - opaque access-token source
//! - [`HttpClient`](http::HttpClient) - buffered and streamed HTTP transport used by backends
//! - [`LoggerSink`](log::LoggerSink) - mirrors structured logs into a host pipeline
//!
//! ## Error Handling
//!
//! All traits report failures as [`BridgeError`](error::BridgeError). Backends
//! must classify service failures into the dedicated variants
//! (`Unauthorized`, `PermissionDenied`, `QuotaExceeded`, `NotFound`) because
//! the retry policy above them depends on that classification.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync`; one backend instance is shared by every
//! worker of a sync session.
//!
//! ## Examples
//!
//! ### Implementing CredentialSupplier
//!
//! ```ignore
//! use async_trait::async_trait;
//! use bridge_traits::backend::CredentialSupplier;
//! use bridge_traits::error::Result;
//!
//! pub struct EnvToken;
//!
//! #[async_trait]
//! impl CredentialSupplier for EnvToken {
//!     async fn access_token(&self) -> Result<String> {
//!         std::env::var("DRIVE_TOKEN")
//!             .map_err(|e| bridge_traits::BridgeError::Unauthorized(e.to_string()))
//!     }
//! }
//! ```

pub mod backend;
pub mod error;
pub mod http;
pub mod log;
pub mod platform;

pub use error::BridgeError;

// Re-export commonly used types
pub use backend::{CredentialSupplier, NodeQuery, Page, RemoteBackend, RemoteNode, SharedDrive};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy, StreamingResponse};
pub use log::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use platform::{DynAsyncRead, DynAsyncWrite};
