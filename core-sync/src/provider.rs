//! # Sync Provider Session
//!
//! One [`SyncProvider`] exists per configured site. It owns the backend
//! client, the resolved roots and the folder [`PathIndex`], and exposes the
//! operations the sync orchestrator calls:
//!
//! ```text
//! activate ──> RootResolver seeds roots
//!     │
//!     └─> first path query ──> list_folders ──> TreeBuilder ──> PathIndex
//!                                                                  │
//!          create/upload/download/delete/exists <──────────────────┘
//!                      │
//!                      └─> QuotaGuard ──> RemoteBackend
//! ```
//!
//! ## Concurrency
//!
//! The index sits behind a [`RwLock`]; lookups share the read side. Every
//! structural change (tree build, folder creation, subtree removal) is
//! serialized by a separate per-session mutation [`Mutex`], and each folder
//! creation re-checks the index under that lock before writing to the
//! backend. Two workers creating the same path therefore end up with one
//! remote folder: the second one adopts the id the first one cached.
//!
//! Files are never cached. Their size, checksum and timestamp must be live.

use crate::error::{Result, SyncError};
use crate::guard::QuotaGuard;
use crate::listing::collect_pages;
use crate::path;
use crate::roots::{ResolvedRoots, RootResolver};
use crate::tree::{PathIndex, TreeBuildReport, TreeBuilder};
use bridge_traits::backend::{NodeQuery, RemoteBackend, RemoteNode};
use core_runtime::config::{ProviderSettings, SiteConfig};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OnceCell, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

const PARTIAL_SUFFIX: &str = "part";

#[derive(Debug, Default)]
struct TreeCache {
    index: PathIndex,
    built: bool,
    report: Option<TreeBuildReport>,
}

/// Remote storage session for one site
pub struct SyncProvider {
    site: SiteConfig,
    backend: Arc<dyn RemoteBackend>,
    guard: QuotaGuard,
    roots: OnceCell<ResolvedRoots>,
    tree: RwLock<TreeCache>,
    mutation: Mutex<()>,
}

impl SyncProvider {
    /// Creates an inactive session. Nothing touches the network until
    /// [`activate`](Self::activate).
    pub fn new(site: SiteConfig, backend: Arc<dyn RemoteBackend>, shutdown: CancellationToken) -> Self {
        let guard = QuotaGuard::new(site.settings.quota_cooldown, shutdown);
        Self {
            site,
            backend,
            guard,
            roots: OnceCell::new(),
            tree: RwLock::new(TreeCache::default()),
            mutation: Mutex::new(()),
        }
    }

    /// Seeds the session with a previously built index so the first path
    /// query does not list the whole backend.
    pub fn with_tree(mut self, index: PathIndex) -> Self {
        self.tree = RwLock::new(TreeCache {
            index,
            built: true,
            report: None,
        });
        self
    }

    pub fn site_name(&self) -> &str {
        &self.site.site_name
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.site.settings
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        self.guard.shutdown_token()
    }

    /// Validates the site, authenticates and resolves roots.
    ///
    /// A configuration error is reported before any backend call. Activating
    /// an active session is a no-op.
    #[instrument(skip(self), fields(site = %self.site.site_name))]
    pub async fn activate(&self) -> Result<()> {
        if self.is_active() {
            return Ok(());
        }

        self.site.validate()?;

        self.roots
            .get_or_try_init(|| async {
                self.guard
                    .run("authenticate", || self.backend.authenticate())
                    .await?;

                RootResolver::new(
                    self.backend.as_ref(),
                    &self.guard,
                    self.site.settings.shared_drive_page_size,
                )
                .resolve(&self.site.roots())
                .await
            })
            .await?;

        info!("Provider session active");
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.roots.initialized()
    }

    /// Resolved roots; fails on an inactive session.
    pub fn roots(&self) -> Result<&ResolvedRoots> {
        self.roots.get().ok_or(SyncError::Inactive)
    }

    /// Snapshot of the folder index, built on first use.
    pub async fn get_tree(&self) -> Result<PathIndex> {
        self.ensure_tree().await?;
        Ok(self.tree.read().await.index.clone())
    }

    /// Discards the index and lists the backend again.
    ///
    /// Folders left unresolved by an earlier build stay out of the index
    /// until this is called.
    #[instrument(skip(self), fields(site = %self.site.site_name))]
    pub async fn rebuild_tree(&self) -> Result<TreeBuildReport> {
        let _lock = self.mutation.lock().await;
        self.build_locked().await
    }

    /// Report of the most recent tree build, if one ran in this session
    pub async fn last_build_report(&self) -> Option<TreeBuildReport> {
        self.tree.read().await.report.clone()
    }

    /// Every folder visible to the credential, across all pages
    pub async fn list_folders(&self) -> Result<Vec<RemoteNode>> {
        self.list_all(NodeQuery::AllFolders, "list_folders").await
    }

    /// Every file visible to the credential, across all pages
    pub async fn list_files(&self) -> Result<Vec<RemoteNode>> {
        self.list_all(NodeQuery::AllFiles, "list_files").await
    }

    /// Backend id of the folder at `path`, from the index only.
    ///
    /// `None` means absent; a folder created elsewhere after the build is
    /// not seen until [`rebuild_tree`](Self::rebuild_tree).
    pub async fn folder_exists(&self, path: &str) -> Result<Option<String>> {
        let path = path::normalize(path)?;
        self.lookup(&path).await
    }

    /// Live metadata of the file at `path`.
    ///
    /// Fails with [`SyncError::Ambiguous`] when the folder holds several
    /// files with that name.
    #[instrument(skip(self), fields(site = %self.site.site_name))]
    pub async fn file_exists(&self, path: &str) -> Result<Option<RemoteNode>> {
        let path = path::normalize(path)?;
        let Some(folder) = path::parent(&path) else {
            return Ok(None);
        };

        match self.lookup(folder).await? {
            Some(folder_id) => self.find_file(&folder_id, path::file_name(&path), &path).await,
            None => Ok(None),
        }
    }

    /// Creates every missing folder of `path` and returns the id of the last one.
    ///
    /// Idempotent: an indexed path returns its id without a backend call.
    #[instrument(skip(self), fields(site = %self.site.site_name))]
    pub async fn create_folder(&self, path: &str) -> Result<String> {
        let target = path::normalize(path)?;
        if self.roots()?.containing(&target).is_none() {
            return Err(SyncError::not_found(target));
        }
        if let Some(id) = self.lookup(&target).await? {
            return Ok(id);
        }

        // Walk up to the closest indexed ancestor.
        let mut missing = Vec::new();
        let mut current = target.as_str();
        let (mut parent_path, mut parent_id) = loop {
            missing.push(path::file_name(current).to_string());
            let Some(parent) = path::parent(current) else {
                return Err(SyncError::not_found(target.clone()));
            };
            if let Some(id) = self.lookup(parent).await? {
                break (parent.to_string(), id);
            }
            current = parent;
        };

        while let Some(name) = missing.pop() {
            let child_path = path::join(&parent_path, &name);
            let child_id = self.create_child_folder(&child_path, &name, &parent_id).await?;
            parent_path = child_path;
            parent_id = child_id;
        }

        Ok(parent_id)
    }

    /// Uploads `source` to `destination`, creating missing folders.
    ///
    /// A destination whose last segment has an extension is the full file
    /// path; otherwise it is the folder and the local file name is kept.
    /// Returns the backend id of the uploaded file.
    #[instrument(skip(self, source), fields(site = %self.site.site_name, source = %source.display()))]
    pub async fn upload_file(&self, source: &Path, destination: &str, overwrite: bool) -> Result<String> {
        self.roots()?;

        let is_file = tokio::fs::metadata(source)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(SyncError::not_found(source.display().to_string()));
        }

        let source_name = path::local_file_name(source)?;
        let (folder, name) = path::split_destination(destination, &source_name)?;
        let target = path::join(&folder, &name);

        let folder_id = self.create_folder(&folder).await?;
        let existing = self.find_file(&folder_id, &name, &target).await?;

        let uploaded = match existing {
            Some(_) if !overwrite => {
                return Err(SyncError::AlreadyExists { path: target });
            }
            Some(file) => {
                debug!(path = %target, file_id = %file.id, "Replacing remote file content");
                self.abortable(self.guard.run("update_file", || {
                    self.backend.update_file(&file.id, &name, source)
                }))
                .await?
            }
            None => {
                self.abortable(self.guard.run("create_file", || {
                    self.backend.create_file(&name, &folder_id, source)
                }))
                .await?
            }
        };

        info!(path = %target, file_id = %uploaded.id, "Uploaded file");
        Ok(uploaded.id)
    }

    /// Downloads the remote file at `source` to `destination`.
    ///
    /// `destination` with an extension is the target file; otherwise it is a
    /// directory and the remote name is kept. Bytes land in a `.part` file
    /// that is renamed into place once complete. Returns the local file name.
    #[instrument(skip(self, destination), fields(site = %self.site.site_name, destination = %destination.display()))]
    pub async fn download_file(&self, source: &str, destination: &Path, overwrite: bool) -> Result<String> {
        let source = path::normalize(source)?;
        let remote = self
            .file_exists(&source)
            .await?
            .ok_or_else(|| SyncError::not_found(source.clone()))?;

        let (directory, name) = path::split_local_destination(destination, path::file_name(&source));
        let target = directory.join(&name);

        if !overwrite && tokio::fs::try_exists(&target).await? {
            return Err(SyncError::AlreadyExists {
                path: target.display().to_string(),
            });
        }

        if !directory.as_os_str().is_empty() {
            tokio::fs::create_dir_all(&directory).await?;
        }

        let partial = partial_path(&directory, &name);
        let written = self
            .abortable(self.guard.run("download", || {
                fetch_to_file(Arc::clone(&self.backend), remote.id.clone(), partial.clone())
            }))
            .await;

        let written = match written {
            Ok(bytes) => bytes,
            Err(err) => {
                if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                    debug!(error = %cleanup, "No partial download to remove");
                }
                return Err(err);
            }
        };

        tokio::fs::rename(&partial, &target).await?;
        info!(path = %source, bytes = written, "Downloaded file");
        Ok(name)
    }

    /// Deletes the folder at `path` together with its content.
    ///
    /// Without `force` a folder that has any child fails with
    /// [`SyncError::NotEmpty`]. The folder's subtree leaves the index.
    /// Folder creation waits until the delete and eviction are done.
    #[instrument(skip(self), fields(site = %self.site.site_name))]
    pub async fn delete_folder(&self, path: &str, force: bool) -> Result<()> {
        let path = path::normalize(path)?;
        self.ensure_tree().await?;

        let _lock = self.mutation.lock().await;
        let folder_id = self
            .tree
            .read()
            .await
            .index
            .get(&path)
            .map(str::to_string)
            .ok_or_else(|| SyncError::not_found(path.clone()))?;

        if self.roots()?.is_root_id(&folder_id) {
            return Err(SyncError::InvalidPath(path));
        }

        if !force {
            let query = NodeQuery::ChildrenOf {
                parent_id: folder_id.clone(),
            };
            let children = self
                .guard
                .run("list_children", || self.backend.list_nodes(&query, 1, None))
                .await?;
            if !children.items.is_empty() {
                return Err(SyncError::NotEmpty { path });
            }
        }

        self.guard
            .run("delete_folder", || self.backend.delete(&folder_id))
            .await?;

        let removed = self.tree.write().await.index.remove_subtree(&path);
        info!(path = %path, removed, "Deleted folder");
        Ok(())
    }

    /// Deletes the file at `path`. The folder index is left untouched.
    #[instrument(skip(self), fields(site = %self.site.site_name))]
    pub async fn delete_file(&self, path: &str) -> Result<()> {
        let path = path::normalize(path)?;
        let file = self
            .file_exists(&path)
            .await?
            .ok_or_else(|| SyncError::not_found(path.clone()))?;

        self.guard
            .run("delete_file", || self.backend.delete(&file.id))
            .await?;

        info!(path = %path, file_id = %file.id, "Deleted file");
        Ok(())
    }

    async fn list_all(&self, query: NodeQuery, operation: &str) -> Result<Vec<RemoteNode>> {
        self.roots()?;
        let page_size = self.site.settings.list_page_size;
        let query = &query;
        collect_pages(&self.guard, operation, |token| async move {
            self.backend
                .list_nodes(query, page_size, token.as_deref())
                .await
        })
        .await
    }

    async fn find_file(&self, folder_id: &str, name: &str, path: &str) -> Result<Option<RemoteNode>> {
        let query = NodeQuery::NamedChild {
            parent_id: folder_id.to_string(),
            name: name.to_string(),
        };
        let page_size = self.site.settings.list_page_size;
        let query = &query;
        let mut matches = self
            .abortable(collect_pages(&self.guard, "file_exists", |token| async move {
                self.backend
                    .list_nodes(query, page_size, token.as_deref())
                    .await
            }))
            .await?;

        if matches.len() > 1 {
            warn!(path, count = matches.len(), "Several files share one name");
            return Err(SyncError::Ambiguous {
                path: path.to_string(),
                count: matches.len(),
            });
        }

        Ok(matches.pop())
    }

    async fn lookup(&self, path: &str) -> Result<Option<String>> {
        self.ensure_tree().await?;
        Ok(self.tree.read().await.index.get(path).map(str::to_string))
    }

    async fn ensure_tree(&self) -> Result<()> {
        self.roots()?;
        if self.tree.read().await.built {
            return Ok(());
        }

        let _lock = self.mutation.lock().await;
        if self.tree.read().await.built {
            return Ok(());
        }
        self.build_locked().await.map(|_| ())
    }

    /// Lists folders and replaces the index. Caller holds the mutation lock.
    async fn build_locked(&self) -> Result<TreeBuildReport> {
        let roots = self.roots()?;
        let folders = self.list_folders().await?;

        let (index, report) = TreeBuilder::new(
            roots.all(),
            Some(roots.personal().node_id.as_str()),
            self.site.settings.tree_resolution_rounds,
        )
        .build(folders);

        info!(
            folders = index.len(),
            resolved = report.resolved,
            unresolved = report.unresolved.len(),
            rounds = report.rounds,
            "Path index built"
        );

        let mut tree = self.tree.write().await;
        tree.index = index;
        tree.built = true;
        tree.report = Some(report.clone());
        Ok(report)
    }

    /// One step of `create_folder`, under the mutation lock.
    async fn create_child_folder(&self, child_path: &str, name: &str, parent_id: &str) -> Result<String> {
        let _lock = self.mutation.lock().await;

        {
            let tree = self.tree.read().await;
            if let Some(existing) = tree.index.get(child_path) {
                debug!(path = child_path, node_id = existing, "Folder created concurrently, adopting");
                return Ok(existing.to_string());
            }
            // The parent may have been deleted since the caller looked it up.
            let parent_path = path::parent(child_path).unwrap_or_default();
            if tree.index.get(parent_path) != Some(parent_id) {
                return Err(SyncError::not_found(parent_path.to_string()));
            }
        }

        let folder = self
            .guard
            .run("create_folder", || self.backend.create_folder(name, parent_id))
            .await?;

        self.tree
            .write()
            .await
            .index
            .insert(child_path.to_string(), folder.id.clone());
        debug!(path = child_path, node_id = %folder.id, "Created folder");
        Ok(folder.id)
    }

    /// Runs a transfer or live query, dropping it when the session shuts down.
    async fn abortable<T>(&self, transfer: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            _ = self.guard.shutdown_token().cancelled() => {
                warn!("Transfer aborted by shutdown");
                Err(SyncError::Cancelled)
            }
            result = transfer => result,
        }
    }
}

impl std::fmt::Debug for SyncProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncProvider")
            .field("site", &self.site.site_name)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

fn partial_path(directory: &Path, name: &str) -> PathBuf {
    directory.join(format!("{}.{}", name, PARTIAL_SUFFIX))
}

/// One download attempt; the partial file is truncated on every attempt.
async fn fetch_to_file(
    backend: Arc<dyn RemoteBackend>,
    file_id: String,
    partial: PathBuf,
) -> bridge_traits::error::Result<u64> {
    let mut file = tokio::fs::File::create(&partial).await?;
    let written = backend.download(&file_id, &mut file).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}
