//! Dynamic I/O handle aliases shared by bridge traits.
//!
//! Streams cross trait-object boundaries (HTTP bodies, download sinks), so the
//! bounds are spelled out once here.

/// Boxed async reader that can move between tasks.
pub type DynAsyncRead = dyn tokio::io::AsyncRead + Send + Unpin;

/// Boxed async writer that can move between tasks.
pub type DynAsyncWrite = dyn tokio::io::AsyncWrite + Send + Unpin;
