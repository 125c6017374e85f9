//! Workspace umbrella crate.
//!
//! Re-exports the sync core and, with `desktop-shims` (default), the
//! bootstrap helpers that connect a configured site over Google Drive.
//! Hosts can depend on `asset-sync` alone instead of wiring each crate.

pub use core_runtime::config;
pub use core_sync::*;

#[cfg(feature = "desktop-shims")]
pub use core_service::{bootstrap_site, connect_site, CoreError};
