//! # Sync Site Configuration
//!
//! Explicit configuration values for remote sync sites.
//!
//! ## Overview
//!
//! A process syncs against one or more *sites*. Each remote site names a
//! credential locator and a root declaration, and carries tunables for the
//! provider session built from it. Configuration is always passed in
//! explicitly; nothing here reads global state.
//!
//! ## Preset format
//!
//! ```json
//! {
//!   "gdrive": {
//!     "credentials_url": "/secrets/gdrive.json",
//!     "root": {
//!       "root_one": "/My Drive",
//!       "root_two": "/Studio Projects"
//!     },
//!     "settings": { "quota_cooldown_secs": 60 }
//!   }
//! }
//! ```
//!
//! `root` may also be a single string (`"root": "/My Drive"`), which is
//! treated as a root named `root`.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{RootDeclaration, SiteConfig};
//!
//! let site = SiteConfig::builder("gdrive")
//!     .credentials_path("/secrets/gdrive.json")
//!     .root(RootDeclaration::Single("/My Drive".to_string()))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root name used when the declaration is a single path
pub const SINGLE_ROOT_NAME: &str = "root";

/// Resumable upload chunks must be multiples of this size
pub const UPLOAD_CHUNK_GRANULARITY: usize = 256 * 1024;

/// Default bound on tree resolution rounds
pub const DEFAULT_TREE_RESOLUTION_ROUNDS: usize = 20;

/// Root declaration of a site: one path or a set of named paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RootDeclaration {
    /// `"root": "/My Drive"`
    Single(String),
    /// `"root": {"root_one": "/My Drive", "root_two": "/Shared Space"}`
    Named(BTreeMap<String, String>),
}

impl RootDeclaration {
    /// Normalize to a name → path mapping
    pub fn named_roots(&self) -> BTreeMap<String, String> {
        match self {
            RootDeclaration::Single(path) => {
                let mut roots = BTreeMap::new();
                roots.insert(SINGLE_ROOT_NAME.to_string(), path.clone());
                roots
            }
            RootDeclaration::Named(roots) => roots.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RootDeclaration::Single(path) => path.trim().is_empty(),
            RootDeclaration::Named(roots) => roots.is_empty(),
        }
    }
}

/// Tunables for one provider session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Upper bound on deferred-resolution rounds while building the path index
    pub tree_resolution_rounds: usize,

    /// Cooldown applied once after a quota/rate-limit response
    #[serde(rename = "quota_cooldown_secs", with = "duration_secs")]
    pub quota_cooldown: Duration,

    /// Maximum concurrent backend operations per session
    pub max_concurrent_operations: usize,

    /// Page size for folder and file listings
    pub list_page_size: u32,

    /// Page size for shared space listings
    pub shared_drive_page_size: u32,

    /// Chunk size for resumable uploads (bytes)
    pub upload_chunk_size: usize,

    /// Timeout for individual backend requests
    #[serde(rename = "request_timeout_secs", with = "duration_secs")]
    pub request_timeout: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            tree_resolution_rounds: DEFAULT_TREE_RESOLUTION_ROUNDS,
            quota_cooldown: Duration::from_secs(60),
            max_concurrent_operations: 4,
            list_page_size: 1000,
            shared_drive_page_size: 100,
            upload_chunk_size: 32 * UPLOAD_CHUNK_GRANULARITY, // 8 MiB
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ProviderSettings {
    pub fn with_tree_resolution_rounds(mut self, rounds: usize) -> Self {
        self.tree_resolution_rounds = rounds;
        self
    }

    pub fn with_quota_cooldown(mut self, cooldown: Duration) -> Self {
        self.quota_cooldown = cooldown;
        self
    }

    pub fn with_max_concurrent_operations(mut self, max: usize) -> Self {
        self.max_concurrent_operations = max;
        self
    }

    pub fn with_list_page_size(mut self, page_size: u32) -> Self {
        self.list_page_size = page_size;
        self
    }

    pub fn with_upload_chunk_size(mut self, chunk_size: usize) -> Self {
        self.upload_chunk_size = chunk_size;
        self
    }

    /// Validates the tunables.
    pub fn validate(&self) -> Result<()> {
        if self.tree_resolution_rounds == 0 {
            return Err(Error::Config(
                "tree_resolution_rounds must be greater than 0".to_string(),
            ));
        }

        if self.max_concurrent_operations == 0 {
            return Err(Error::Config(
                "max_concurrent_operations must be greater than 0".to_string(),
            ));
        }

        if self.list_page_size == 0 || self.shared_drive_page_size == 0 {
            return Err(Error::Config("Page sizes must be greater than 0".to_string()));
        }

        if self.upload_chunk_size == 0 || self.upload_chunk_size % UPLOAD_CHUNK_GRANULARITY != 0 {
            return Err(Error::Config(format!(
                "upload_chunk_size must be a positive multiple of {} bytes, got {}",
                UPLOAD_CHUNK_GRANULARITY, self.upload_chunk_size
            )));
        }

        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Configuration of one remote sync site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site name; filled from the preset key when parsed
    #[serde(skip)]
    pub site_name: String,

    /// Locator of the credential source
    #[serde(rename = "credentials_url")]
    pub credentials_path: PathBuf,

    /// Root declaration
    pub root: RootDeclaration,

    /// Session tunables
    #[serde(default)]
    pub settings: ProviderSettings,
}

impl SiteConfig {
    /// Creates a new builder for the named site.
    pub fn builder(site_name: impl Into<String>) -> SiteConfigBuilder {
        SiteConfigBuilder {
            site_name: site_name.into(),
            ..SiteConfigBuilder::default()
        }
    }

    /// Name → virtual path mapping of the declared roots
    pub fn roots(&self) -> BTreeMap<String, String> {
        self.root.named_roots()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Site name and credential locator are not empty
    /// - At least one root is declared
    /// - Every root path is absolute (`/`-prefixed) and names a space
    /// - Tunables are in range
    pub fn validate(&self) -> Result<()> {
        if self.site_name.trim().is_empty() {
            return Err(Error::Config("Site name cannot be empty".to_string()));
        }

        if self.credentials_path.as_os_str().is_empty() {
            return Err(Error::Config(format!(
                "Site '{}' has no credentials_url",
                self.site_name
            )));
        }

        if self.root.is_empty() {
            return Err(Error::Config(format!(
                "Site '{}' declares no roots",
                self.site_name
            )));
        }

        for (name, path) in self.roots() {
            let space = path.strip_prefix('/').unwrap_or("");
            if !path.starts_with('/') || space.split('/').next().unwrap_or("").is_empty() {
                return Err(Error::Config(format!(
                    "Wrong root folder definition '{}' for root '{}' of site '{}'",
                    path, name, self.site_name
                )));
            }
        }

        self.settings.validate()
    }
}

/// Builder for [`SiteConfig`].
#[derive(Debug, Default)]
pub struct SiteConfigBuilder {
    site_name: String,
    credentials_path: Option<PathBuf>,
    root: Option<RootDeclaration>,
    settings: Option<ProviderSettings>,
}

impl SiteConfigBuilder {
    /// Sets the credential locator.
    pub fn credentials_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.credentials_path = Some(path.into());
        self
    }

    /// Sets the root declaration.
    pub fn root(mut self, root: RootDeclaration) -> Self {
        self.root = Some(root);
        self
    }

    /// Adds one named root, turning the declaration into a named mapping.
    pub fn named_root(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        let mut roots = match self.root.take() {
            Some(existing) => existing.named_roots(),
            None => BTreeMap::new(),
        };
        roots.insert(name.into(), path.into());
        self.root = Some(RootDeclaration::Named(roots));
        self
    }

    /// Sets the session tunables.
    pub fn settings(mut self, settings: ProviderSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Builds and validates the site configuration.
    pub fn build(self) -> Result<SiteConfig> {
        let credentials_path = self.credentials_path.ok_or_else(|| {
            Error::Config(
                "Credential locator is required. Use .credentials_path() to set it.".to_string(),
            )
        })?;

        let root = self.root.ok_or_else(|| {
            Error::Config("Root declaration is required. Use .root() to set it.".to_string())
        })?;

        let config = SiteConfig {
            site_name: self.site_name,
            credentials_path,
            root,
            settings: self.settings.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}

/// All configured remote sites, keyed by site name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncServerConfig {
    pub sites: BTreeMap<String, SiteConfig>,
}

impl SyncServerConfig {
    /// Parses the JSON preset format.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut config: SyncServerConfig = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid sync server preset: {}", e)))?;

        for (name, site) in config.sites.iter_mut() {
            site.site_name = name.clone();
        }

        Ok(config)
    }

    /// Reads and parses a JSON preset file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read preset file {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Looks up and validates one site.
    pub fn site(&self, name: &str) -> Result<&SiteConfig> {
        let site = self.sites.get(name).ok_or_else(|| {
            Error::Config(format!("There are no presets for site '{}'", name))
        })?;
        site.validate()?;
        Ok(site)
    }
}
