//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the sync crates:
//! - Logging and tracing infrastructure
//! - Site configuration (credential locators, root declarations, tunables)

pub mod config;
pub mod error;
pub mod logging;

pub use config::{ProviderSettings, RootDeclaration, SiteConfig, SyncServerConfig};
pub use error::{Error, Result};
