//! File-backed access token supplier

use async_trait::async_trait;
use bridge_traits::{
    backend::CredentialSupplier,
    error::{BridgeError, Result},
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct TokenFile {
    access_token: String,
}

/// Reads the access token from the site's credential file.
///
/// The file holds either a bare token or a JSON object with an
/// `access_token` field (the shape OAuth token endpoints return). It is
/// re-read on every call so an external refresher can rotate the token
/// while a session is running.
pub struct FileTokenSupplier {
    path: PathBuf,
}

impl FileTokenSupplier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(contents: &str) -> Option<String> {
        let trimmed = contents.trim();
        if trimmed.starts_with('{') {
            serde_json::from_str::<TokenFile>(trimmed)
                .ok()
                .map(|file| file.access_token)
                .filter(|token| !token.is_empty())
        } else if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

#[async_trait]
impl CredentialSupplier for FileTokenSupplier {
    async fn access_token(&self) -> Result<String> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            BridgeError::Unauthorized(format!(
                "Cannot read credentials at {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!(path = %self.path.display(), "Loaded access token");
        Self::parse(&contents).ok_or_else(|| {
            BridgeError::Unauthorized(format!("No access token in {}", self.path.display()))
        })
    }
}
