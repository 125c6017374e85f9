//! In-memory remote backend shared by the provider integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::backend::{NodeQuery, Page, RemoteBackend, RemoteNode, SharedDrive};
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::platform::DynAsyncWrite;
use core_runtime::config::{ProviderSettings, SiteConfig};
use core_sync::SyncProvider;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

pub const PERSONAL_ID: &str = "root-id";
pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Clone)]
struct StoredNode {
    node: RemoteNode,
    content: Vec<u8>,
}

#[derive(Default)]
struct State {
    nodes: HashMap<String, StoredNode>,
    order: Vec<String>,
    shared_drives: Vec<SharedDrive>,
    next_id: usize,
}

impl State {
    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn is_container(&self, id: &str) -> bool {
        id == PERSONAL_ID
            || self.shared_drives.iter().any(|d| d.id == id)
            || self.nodes.get(id).map(|n| n.node.is_folder).unwrap_or(false)
    }

    fn insert(&mut self, node: RemoteNode, content: Vec<u8>) {
        self.order.push(node.id.clone());
        self.nodes.insert(node.id.clone(), StoredNode { node, content });
    }

    fn remove_recursive(&mut self, id: &str) {
        let children: Vec<String> = self
            .nodes
            .values()
            .filter(|n| n.node.primary_parent() == Some(id))
            .map(|n| n.node.id.clone())
            .collect();
        for child in children {
            self.remove_recursive(&child);
        }
        self.nodes.remove(id);
        self.order.retain(|existing| existing != id);
    }
}

/// Backend keeping folders and files in memory, with call accounting,
/// injected quota failures and optional latency.
#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
    calls: Mutex<HashMap<String, usize>>,
    quota_failures: Mutex<HashMap<String, usize>>,
    permission_denied: Mutex<Vec<String>>,
    reject_credentials: Mutex<bool>,
    latency: Mutex<Option<Duration>>,
    transfer_latency: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_shared_drive(&self, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id("drive");
        state.shared_drives.push(SharedDrive {
            id: id.clone(),
            name: name.to_string(),
        });
        id
    }

    /// Adds a folder without any parent check, so orphans can be modelled.
    pub fn add_folder(&self, name: &str, parent_id: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id("folder");
        state.insert(folder_node(&id, name, Some(parent_id)), Vec::new());
        id
    }

    pub fn add_folder_with_id(&self, id: &str, name: &str, parent_id: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        state.insert(folder_node(id, name, parent_id), Vec::new());
    }

    pub fn add_file(&self, name: &str, parent_id: &str, content: &[u8]) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id("file");
        state.insert(file_node(&id, name, parent_id, content.len()), content.to_vec());
        id
    }

    pub fn inject_quota_failures(&self, operation: &str, count: usize) {
        self.quota_failures
            .lock()
            .unwrap()
            .insert(operation.to_string(), count);
    }

    pub fn deny(&self, operation: &str) {
        self.permission_denied
            .lock()
            .unwrap()
            .push(operation.to_string());
    }

    pub fn reject_credentials(&self) {
        *self.reject_credentials.lock().unwrap() = true;
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    /// Extra delay for uploads and downloads only, applied mid-transfer.
    pub fn set_transfer_latency(&self, latency: Duration) {
        *self.transfer_latency.lock().unwrap() = Some(latency);
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn folders_named(&self, name: &str) -> Vec<RemoteNode> {
        let state = self.state.lock().unwrap();
        state
            .nodes
            .values()
            .filter(|n| n.node.is_folder && n.node.name == name)
            .map(|n| n.node.clone())
            .collect()
    }

    pub fn files_named(&self, name: &str) -> Vec<RemoteNode> {
        let state = self.state.lock().unwrap();
        state
            .nodes
            .values()
            .filter(|n| !n.node.is_folder && n.node.name == name)
            .map(|n| n.node.clone())
            .collect()
    }

    pub fn node(&self, id: &str) -> Option<RemoteNode> {
        self.state
            .lock()
            .unwrap()
            .nodes
            .get(id)
            .map(|n| n.node.clone())
    }

    pub fn content(&self, id: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .nodes
            .get(id)
            .map(|n| n.content.clone())
    }

    fn enter(&self, operation: &str) -> Result<()> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(operation.to_string())
            .or_default() += 1;

        if self
            .permission_denied
            .lock()
            .unwrap()
            .iter()
            .any(|op| op == operation)
        {
            return Err(BridgeError::PermissionDenied(
                "The user has not granted the app write access".to_string(),
            ));
        }

        let mut failures = self.quota_failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BridgeError::QuotaExceeded("userRateLimitExceeded".to_string()));
            }
        }
        Ok(())
    }

    async fn pause(&self) {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    async fn stall_transfer(&self) {
        let latency = *self.transfer_latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl RemoteBackend for InMemoryBackend {
    async fn authenticate(&self) -> Result<()> {
        self.enter("authenticate")?;
        if *self.reject_credentials.lock().unwrap() {
            return Err(BridgeError::Unauthorized("invalid_grant".to_string()));
        }
        Ok(())
    }

    async fn personal_root(&self) -> Result<RemoteNode> {
        self.enter("personal_root")?;
        Ok(folder_node(PERSONAL_ID, "My Drive", None))
    }

    async fn list_shared_drives(&self, page_size: u32, page_token: Option<&str>) -> Result<Page<SharedDrive>> {
        self.enter("list_shared_drives")?;
        let drives = self.state.lock().unwrap().shared_drives.clone();
        Ok(paginate(drives, page_size, page_token))
    }

    async fn list_nodes(&self, query: &NodeQuery, page_size: u32, page_token: Option<&str>) -> Result<Page<RemoteNode>> {
        self.enter("list_nodes")?;
        self.pause().await;

        let state = self.state.lock().unwrap();
        let matches: Vec<RemoteNode> = state
            .order
            .iter()
            .filter_map(|id| state.nodes.get(id))
            .map(|n| &n.node)
            .filter(|node| match query {
                NodeQuery::AllFolders => node.is_folder,
                NodeQuery::AllFiles => !node.is_folder,
                NodeQuery::ChildrenOf { parent_id } => node.primary_parent() == Some(parent_id.as_str()),
                NodeQuery::NamedChild { parent_id, name } => {
                    !node.is_folder && node.name == *name && node.primary_parent() == Some(parent_id.as_str())
                }
            })
            .cloned()
            .collect();

        Ok(paginate(matches, page_size, page_token))
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<RemoteNode> {
        self.enter("create_folder")?;
        self.pause().await;

        let mut state = self.state.lock().unwrap();
        if !state.is_container(parent_id) {
            return Err(BridgeError::NotFound(format!("parent {}", parent_id)));
        }
        let id = state.allocate_id("folder");
        let node = folder_node(&id, name, Some(parent_id));
        state.insert(node.clone(), Vec::new());
        Ok(node)
    }

    async fn create_file(&self, name: &str, parent_id: &str, source: &Path) -> Result<RemoteNode> {
        self.enter("create_file")?;
        let content = tokio::fs::read(source).await?;
        self.pause().await;
        self.stall_transfer().await;

        let mut state = self.state.lock().unwrap();
        if !state.is_container(parent_id) {
            return Err(BridgeError::NotFound(format!("parent {}", parent_id)));
        }
        let id = state.allocate_id("file");
        let node = file_node(&id, name, parent_id, content.len());
        state.insert(node.clone(), content);
        Ok(node)
    }

    async fn update_file(&self, file_id: &str, name: &str, source: &Path) -> Result<RemoteNode> {
        self.enter("update_file")?;
        let content = tokio::fs::read(source).await?;
        self.pause().await;
        self.stall_transfer().await;

        let mut state = self.state.lock().unwrap();
        let stored = state
            .nodes
            .get_mut(file_id)
            .ok_or_else(|| BridgeError::NotFound(format!("file {}", file_id)))?;
        stored.node.name = name.to_string();
        stored.node.size = Some(content.len() as u64);
        stored.content = content;
        Ok(stored.node.clone())
    }

    async fn download(&self, file_id: &str, sink: &mut DynAsyncWrite) -> Result<u64> {
        self.enter("download")?;
        self.pause().await;

        let content = {
            let state = self.state.lock().unwrap();
            match state.nodes.get(file_id) {
                Some(stored) if !stored.node.is_folder => stored.content.clone(),
                _ => return Err(BridgeError::NotFound(format!("file {}", file_id))),
            }
        };

        let half = content.len() / 2;
        sink.write_all(&content[..half]).await?;
        sink.flush().await?;
        self.stall_transfer().await;
        sink.write_all(&content[half..]).await?;
        Ok(content.len() as u64)
    }

    async fn delete(&self, node_id: &str) -> Result<()> {
        self.enter("delete")?;
        let mut state = self.state.lock().unwrap();
        if !state.nodes.contains_key(node_id) {
            return Err(BridgeError::NotFound(format!("node {}", node_id)));
        }
        state.remove_recursive(node_id);
        Ok(())
    }
}

fn paginate<T>(items: Vec<T>, page_size: u32, page_token: Option<&str>) -> Page<T> {
    let offset: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
    let end = (offset + page_size.max(1) as usize).min(items.len());
    let next_page_token = (end < items.len()).then(|| end.to_string());
    Page {
        items: items.into_iter().skip(offset).take(end - offset).collect(),
        next_page_token,
    }
}

pub fn folder_node(id: &str, name: &str, parent_id: Option<&str>) -> RemoteNode {
    RemoteNode {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: Some(FOLDER_MIME.to_string()),
        is_folder: true,
        parent_ids: parent_id.map(|p| vec![p.to_string()]).unwrap_or_default(),
        size: None,
        modified_at: None,
        md5_checksum: None,
    }
}

pub fn file_node(id: &str, name: &str, parent_id: &str, size: usize) -> RemoteNode {
    RemoteNode {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: Some("application/octet-stream".to_string()),
        is_folder: false,
        parent_ids: vec![parent_id.to_string()],
        size: Some(size as u64),
        modified_at: None,
        md5_checksum: None,
    }
}

pub fn site(settings: ProviderSettings) -> SiteConfig {
    SiteConfig::builder("gdrive")
        .credentials_path("/etc/pipeline/credentials.json")
        .root(core_runtime::config::RootDeclaration::Single("/My Drive".to_string()))
        .settings(settings)
        .build()
        .unwrap()
}

pub fn fast_settings() -> ProviderSettings {
    ProviderSettings::default().with_quota_cooldown(Duration::from_millis(10))
}

pub fn provider(backend: &Arc<InMemoryBackend>, site: SiteConfig) -> SyncProvider {
    SyncProvider::new(site, Arc::clone(backend) as Arc<dyn RemoteBackend>, CancellationToken::new())
}

pub async fn active_provider(backend: &Arc<InMemoryBackend>) -> SyncProvider {
    let provider = provider(backend, site(fast_settings()));
    provider.activate().await.unwrap();
    provider
}
