//! Remote Storage Backend Abstractions
//!
//! Call contract for the raw transport to a remote storage service. Backends
//! address folders and files by opaque node ids; any path semantics live in
//! the sync core on top of this trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::platform::DynAsyncWrite;

/// A folder or file as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNode {
    /// Opaque backend id
    pub id: String,
    /// Display name (not unique within a folder)
    pub name: String,
    /// MIME type reported by the backend
    pub mime_type: Option<String>,
    /// Whether this node is a folder
    pub is_folder: bool,
    /// Parent ids; empty for nodes the backend reports without a parent
    pub parent_ids: Vec<String>,
    /// Size in bytes (files only)
    pub size: Option<u64>,
    /// Last modification time
    pub modified_at: Option<DateTime<Utc>>,
    /// MD5 checksum (files only)
    pub md5_checksum: Option<String>,
}

impl RemoteNode {
    /// First declared parent, which is the one used for path resolution
    pub fn primary_parent(&self) -> Option<&str> {
        self.parent_ids.first().map(String::as_str)
    }
}

/// A shared space visible to the credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedDrive {
    pub id: String,
    pub name: String,
}

/// One page of a listing
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Continuation token; `None` on the last page
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_page_token: None,
        }
    }
}

/// Listing filters understood by every backend
///
/// Trashed nodes are always excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeQuery {
    /// Every folder visible to the credential
    AllFolders,
    /// Every non-folder node visible to the credential
    AllFiles,
    /// Direct children (folders and files) of a folder
    ChildrenOf { parent_id: String },
    /// Non-folder nodes with an exact name inside a folder
    NamedChild { parent_id: String, name: String },
}

/// Raw remote storage operations
///
/// Implementations map native failures onto [`BridgeError`](crate::error::BridgeError):
/// rejected credentials to `Unauthorized`, rate limits to `QuotaExceeded`,
/// missing targets to `NotFound` and access problems to `PermissionDenied`.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::backend::{NodeQuery, RemoteBackend};
///
/// async fn first_folders(backend: &dyn RemoteBackend) -> Result<usize> {
///     let page = backend.list_nodes(&NodeQuery::AllFolders, 100, None).await?;
///     Ok(page.items.len())
/// }
/// ```
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Obtain and verify the credential
    async fn authenticate(&self) -> Result<()>;

    /// The credential's personal space root
    async fn personal_root(&self) -> Result<RemoteNode>;

    /// One page of shared spaces visible to the credential
    async fn list_shared_drives(
        &self,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<Page<SharedDrive>>;

    /// One page of nodes matching `query`
    async fn list_nodes(
        &self,
        query: &NodeQuery,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<Page<RemoteNode>>;

    /// Create a single folder under `parent_id`
    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<RemoteNode>;

    /// Upload a new file from local disk into `parent_id`
    ///
    /// The content is streamed from `source`; it is never loaded whole.
    async fn create_file(&self, name: &str, parent_id: &str, source: &Path) -> Result<RemoteNode>;

    /// Replace the content of an existing file from local disk
    async fn update_file(&self, file_id: &str, name: &str, source: &Path) -> Result<RemoteNode>;

    /// Stream a file's content into `sink`, returning the number of bytes written
    async fn download(&self, file_id: &str, sink: &mut DynAsyncWrite) -> Result<u64>;

    /// Delete a node; folders are removed together with their content
    async fn delete(&self, node_id: &str) -> Result<()>;
}

/// Opaque source of access credentials
///
/// How the token is obtained (service account, OAuth refresh, static file) is
/// the supplier's business.
#[async_trait]
pub trait CredentialSupplier: Send + Sync {
    /// Current access token
    async fn access_token(&self) -> Result<String>;
}
