//! # Root Resolution
//!
//! Turns the configured root declaration (`name -> virtual path`) into
//! [`Root`]s carrying backend node ids.
//!
//! - A path whose first segment is [`PERSONAL_ROOT_NAME`] resolves through the
//!   parameterless personal-root query.
//! - Any other first segment names a shared space. Shared spaces are listed
//!   once and matched by exact name; an unmatched space is left out with a
//!   warning and callers treat the missing root as a configuration problem.
//! - The personal root is always part of the result, because backends report
//!   some nodes without a parent and those belong to it.

use crate::error::{Result, SyncError};
use crate::guard::QuotaGuard;
use crate::listing::collect_pages;
use crate::path;
use crate::tree::Root;
use bridge_traits::backend::{RemoteBackend, SharedDrive};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Name of the personal space root
pub const PERSONAL_ROOT_NAME: &str = "My Drive";

/// Roots of an activated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoots {
    roots: Vec<Root>,
}

impl ResolvedRoots {
    /// Builds the set; the personal root is kept first.
    pub fn new(personal: Root, shared: Vec<Root>) -> Self {
        let mut roots = vec![personal];
        for root in shared {
            if !roots.iter().any(|r| r.name == root.name) {
                roots.push(root);
            }
        }
        Self { roots }
    }

    pub fn all(&self) -> &[Root] {
        &self.roots
    }

    pub fn personal(&self) -> &Root {
        &self.roots[0]
    }

    pub fn get(&self, name: &str) -> Option<&Root> {
        self.roots.iter().find(|root| root.name == name)
    }

    /// Root whose prefix contains the normalized `virtual_path`
    pub fn containing(&self, virtual_path: &str) -> Option<&Root> {
        self.roots
            .iter()
            .find(|root| path::is_within(virtual_path, &root.virtual_path()))
    }

    /// Whether `node_id` is one of the roots themselves
    pub fn is_root_id(&self, node_id: &str) -> bool {
        self.roots.iter().any(|root| root.node_id == node_id)
    }
}

/// Resolves declared roots against a backend
pub struct RootResolver<'a> {
    backend: &'a dyn RemoteBackend,
    guard: &'a QuotaGuard,
    shared_drive_page_size: u32,
}

impl<'a> RootResolver<'a> {
    pub fn new(backend: &'a dyn RemoteBackend, guard: &'a QuotaGuard, shared_drive_page_size: u32) -> Self {
        Self {
            backend,
            guard,
            shared_drive_page_size,
        }
    }

    pub async fn resolve(&self, declared: &BTreeMap<String, String>) -> Result<ResolvedRoots> {
        let mut spaces = Vec::with_capacity(declared.len());
        for (name, root_path) in declared {
            spaces.push(space_of(name, root_path)?);
        }

        let personal = self
            .guard
            .run("personal_root", || self.backend.personal_root())
            .await?;
        let personal = Root::new(PERSONAL_ROOT_NAME, personal.id);
        debug!(node_id = %personal.node_id, "Resolved personal root");

        let wanted: Vec<&str> = spaces
            .into_iter()
            .filter(|space| *space != PERSONAL_ROOT_NAME)
            .collect();

        let mut shared = Vec::new();
        if !wanted.is_empty() {
            let drives = self.shared_drives().await?;
            for space in wanted {
                match drives.iter().find(|drive| drive.name == space) {
                    Some(drive) => {
                        debug!(name = %drive.name, node_id = %drive.id, "Resolved shared root");
                        shared.push(Root::new(drive.name.clone(), drive.id.clone()));
                    }
                    None => warn!(
                        space,
                        "Shared space is not visible to the credential, root omitted"
                    ),
                }
            }
        }

        let resolved = ResolvedRoots::new(personal, shared);
        info!(roots = resolved.all().len(), "Roots resolved");
        Ok(resolved)
    }

    async fn shared_drives(&self) -> Result<Vec<SharedDrive>> {
        let page_size = self.shared_drive_page_size;
        collect_pages(self.guard, "list_shared_drives", |token| async move {
            self.backend
                .list_shared_drives(page_size, token.as_deref())
                .await
        })
        .await
    }
}

/// First segment of a root path, i.e. the space it lives in.
fn space_of<'p>(name: &str, root_path: &'p str) -> Result<&'p str> {
    let mut segments = root_path.split(path::SEPARATOR);
    let leading = segments.next();
    match (leading, segments.next()) {
        (Some(""), Some(space)) if !space.trim().is_empty() => Ok(space),
        _ => Err(SyncError::Configuration(format!(
            "Wrong root folder definition '{}' for root '{}'",
            root_path, name
        ))),
    }
}
