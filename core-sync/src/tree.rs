//! # Path Index & Tree Builder
//!
//! Backends address folders by opaque ids and only expose a flat list of
//! `(id, name, parent)` edges. The [`TreeBuilder`] turns that unordered,
//! possibly inconsistent edge list into a [`PathIndex`] mapping virtual
//! folder paths to backend ids:
//!
//! ```text
//! /My Drive                      -> 0AAbcRoot
//! /My Drive/proj                 -> 1Xyz
//! /My Drive/proj/assets          -> 1Qrs
//! ```
//!
//! Resolution is an explicit worklist with a round counter. Folders whose
//! parent is not known yet wait in a queue keyed by parent id; each round
//! links every queued group whose parent was known when the round started.
//! Cycles and orphans (e.g. children of concurrently deleted folders) can
//! never resolve, so the loop is bounded and stragglers are reported instead
//! of failing the build.
//!
//! When two folders share a name under one parent, the first one listed
//! keeps the path. The other one and everything below it stay out of the
//! index and are reported as shadowed, so no path ever stands for two
//! remote subtrees.
//!
//! Only folders are indexed. File identity must stay live for sync decisions.

use crate::path;
use bridge_traits::backend::RemoteNode;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Named mapping between a virtual path prefix and a backend node id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    pub name: String,
    pub node_id: String,
}

impl Root {
    pub fn new(name: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_id: node_id.into(),
        }
    }

    /// Virtual path of the root itself (`/<name>`)
    pub fn virtual_path(&self) -> String {
        format!("/{}", self.name)
    }
}

/// In-memory mapping from virtual folder path to backend node id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathIndex {
    entries: HashMap<String, String>,
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Inserts a mapping unless the path is already indexed.
    ///
    /// Returns the id the path maps to afterwards, which is the existing one
    /// when the path was already present.
    pub fn insert(&mut self, path: impl Into<String>, node_id: impl Into<String>) -> &str {
        self.entries.entry(path.into()).or_insert_with(|| node_id.into())
    }

    /// Removes `path` and every entry underneath it, returning how many were dropped.
    pub fn remove_subtree(&mut self, subtree: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !path::is_within(key, subtree));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, id)| (p.as_str(), id.as_str()))
    }

    /// All indexed paths in lexical order
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }
}

impl FromIterator<(String, String)> for PathIndex {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Folder waiting for its parent path to become known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFolder {
    pub node_id: String,
    pub name: String,
    pub parent_id: String,
}

/// Outcome of one tree build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeBuildReport {
    /// Folders linked into the index (roots excluded)
    pub resolved: usize,
    /// Folders still unresolved when the round bound was hit
    pub unresolved: Vec<PendingFolder>,
    /// Same-name duplicates of an indexed folder, plus their descendants
    pub shadowed: Vec<PendingFolder>,
    /// Deferred-resolution rounds actually run
    pub rounds: usize,
}

impl TreeBuildReport {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Builds a [`PathIndex`] from a flat folder listing
#[derive(Debug, Clone)]
pub struct TreeBuilder<'a> {
    roots: &'a [Root],
    default_root_id: Option<&'a str>,
    max_rounds: usize,
}

impl<'a> TreeBuilder<'a> {
    /// `default_root_id` adopts folders the backend reports without a parent.
    pub fn new(roots: &'a [Root], default_root_id: Option<&'a str>, max_rounds: usize) -> Self {
        Self {
            roots,
            default_root_id,
            max_rounds,
        }
    }

    pub fn build(&self, folders: Vec<RemoteNode>) -> (PathIndex, TreeBuildReport) {
        debug!(folders = folders.len(), roots = self.roots.len(), "Building path index");

        let mut state = Linker::default();
        for root in self.roots {
            if !state.knows(&root.node_id) {
                state.seed(root.virtual_path(), root.node_id.clone());
            }
        }

        let mut waiting: HashMap<String, Vec<PendingFolder>> = HashMap::new();

        for folder in folders {
            if !folder.is_folder || self.roots.iter().any(|root| root.node_id == folder.id) {
                continue;
            }

            let parent_id = folder
                .primary_parent()
                .or(self.default_root_id)
                .unwrap_or_default()
                .to_string();

            let pending = PendingFolder {
                node_id: folder.id,
                name: folder.name,
                parent_id,
            };

            if state.knows(&pending.parent_id) {
                state.link(pending);
            } else {
                waiting
                    .entry(pending.parent_id.clone())
                    .or_default()
                    .push(pending);
            }
        }

        let mut rounds = 0;
        while !waiting.is_empty() && rounds < self.max_rounds {
            rounds += 1;

            let ready: Vec<String> = waiting
                .keys()
                .filter(|parent_id| state.knows(parent_id))
                .cloned()
                .collect();

            if ready.is_empty() {
                break;
            }

            for parent_id in ready {
                for pending in waiting.remove(&parent_id).unwrap_or_default() {
                    state.link(pending);
                }
            }
        }

        let unresolved: Vec<PendingFolder> = waiting.into_values().flatten().collect();
        if !unresolved.is_empty() {
            warn!(
                unresolved = unresolved.len(),
                rounds,
                "Some folder paths are not resolved; they stay out of the index"
            );
            for pending in &unresolved {
                debug!(
                    node_id = %pending.node_id,
                    name = %pending.name,
                    parent_id = %pending.parent_id,
                    "Unresolved folder"
                );
            }
        }

        if !state.shadowed.is_empty() {
            warn!(
                shadowed = state.shadowed.len(),
                "Duplicate folder names found; duplicates and their content stay out of the index"
            );
        }

        let report = TreeBuildReport {
            resolved: state.resolved,
            unresolved,
            shadowed: state.shadowed,
            rounds,
        };

        (state.index, report)
    }
}

#[derive(Default)]
struct Linker {
    index: PathIndex,
    path_by_id: HashMap<String, String>,
    shadowed_ids: HashSet<String>,
    shadowed: Vec<PendingFolder>,
    resolved: usize,
}

impl Linker {
    fn seed(&mut self, path: String, node_id: String) {
        self.index.insert(path.clone(), node_id.clone());
        self.path_by_id.insert(node_id, path);
    }

    /// Whether the folder's place is settled, indexed or shadowed.
    fn knows(&self, node_id: &str) -> bool {
        self.path_by_id.contains_key(node_id) || self.shadowed_ids.contains(node_id)
    }

    fn shadow(&mut self, pending: PendingFolder) {
        self.shadowed_ids.insert(pending.node_id.clone());
        self.shadowed.push(pending);
    }

    fn link(&mut self, pending: PendingFolder) {
        if self.shadowed_ids.contains(&pending.parent_id) {
            self.shadow(pending);
            return;
        }
        let Some(parent_path) = self.path_by_id.get(&pending.parent_id) else {
            return;
        };
        let child_path = path::join(parent_path, &pending.name);

        if self.index.contains(&child_path) {
            warn!(
                path = %child_path,
                node_id = %pending.node_id,
                "Duplicate folder name, keeping the first indexed folder"
            );
            self.shadow(pending);
            return;
        }

        self.index.insert(child_path.clone(), pending.node_id.clone());
        self.path_by_id.insert(pending.node_id, child_path);
        self.resolved += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(id: &str, name: &str, parent: Option<&str>) -> RemoteNode {
        RemoteNode {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: Some("application/vnd.google-apps.folder".to_string()),
            is_folder: true,
            parent_ids: parent.map(|p| vec![p.to_string()]).unwrap_or_default(),
            size: None,
            modified_at: None,
            md5_checksum: None,
        }
    }

    fn roots() -> Vec<Root> {
        vec![Root::new("My Drive", "root-id"), Root::new("Studio", "shared-id")]
    }

    fn assert_closed(index: &PathIndex, roots: &[Root]) {
        let root_paths: HashSet<String> = roots.iter().map(Root::virtual_path).collect();
        for (path, _) in index.iter() {
            if root_paths.contains(path) {
                continue;
            }
            let parent = path::parent(path).expect("non-root entry has a parent");
            assert!(index.contains(parent), "parent of {} missing", path);
        }
    }

    #[test]
    fn test_seeds_roots() {
        let roots = roots();
        let (index, report) = TreeBuilder::new(&roots, Some("root-id"), 20).build(vec![]);

        assert_eq!(index.get("/My Drive"), Some("root-id"));
        assert_eq!(index.get("/Studio"), Some("shared-id"));
        assert_eq!(report.resolved, 0);
        assert!(report.is_complete());
    }

    #[test]
    fn test_resolves_out_of_order_listing() {
        let roots = roots();
        let folders = vec![
            folder("c", "comp", Some("b")),
            folder("b", "sh010", Some("a")),
            folder("a", "proj", Some("root-id")),
            folder("s1", "assets", Some("shared-id")),
        ];

        let (index, report) = TreeBuilder::new(&roots, Some("root-id"), 20).build(folders);

        assert_eq!(index.get("/My Drive/proj"), Some("a"));
        assert_eq!(index.get("/My Drive/proj/sh010"), Some("b"));
        assert_eq!(index.get("/My Drive/proj/sh010/comp"), Some("c"));
        assert_eq!(index.get("/Studio/assets"), Some("s1"));
        assert_eq!(report.resolved, 4);
        assert!(report.is_complete());
        assert_closed(&index, &roots);
    }

    #[test]
    fn test_parentless_folder_lands_in_personal_root() {
        let roots = roots();
        let folders = vec![folder("x", "shared-with-me", None)];

        let (index, _) = TreeBuilder::new(&roots, Some("root-id"), 20).build(folders);

        assert_eq!(index.get("/My Drive/shared-with-me"), Some("x"));
    }

    #[test]
    fn test_root_nodes_in_listing_are_skipped() {
        let roots = roots();
        let folders = vec![folder("shared-id", "Studio", None)];

        let (index, report) = TreeBuilder::new(&roots, Some("root-id"), 20).build(folders);

        assert_eq!(index.len(), 2);
        assert_eq!(report.resolved, 0);
    }

    #[test]
    fn test_cycle_and_orphans_are_dropped() {
        let roots = roots();
        let folders = vec![
            folder("a", "proj", Some("root-id")),
            folder("c1", "loop-a", Some("c2")),
            folder("c2", "loop-b", Some("c1")),
            folder("o1", "orphan", Some("deleted-folder")),
        ];

        let (index, report) = TreeBuilder::new(&roots, Some("root-id"), 20).build(folders);

        assert_eq!(index.get("/My Drive/proj"), Some("a"));
        assert_eq!(report.unresolved.len(), 3);
        // no progress possible, so the loop stops early
        assert_eq!(report.rounds, 1);
        assert!(!index.iter().any(|(_, id)| id == "c1"));
        assert_closed(&index, &roots);
    }

    #[test]
    fn test_round_bound_drops_deep_stragglers() {
        let roots = vec![Root::new("My Drive", "root-id")];
        // chain root -> n0 -> n1 -> ... -> n5, listed deepest first
        let mut folders: Vec<RemoteNode> = (0..6)
            .map(|i| {
                let parent = if i == 0 {
                    "root-id".to_string()
                } else {
                    format!("n{}", i - 1)
                };
                folder(&format!("n{}", i), &format!("d{}", i), Some(&parent))
            })
            .collect();
        folders.reverse();

        let (index, report) = TreeBuilder::new(&roots, Some("root-id"), 2).build(folders);

        // n0 links in the first pass, n1 and n2 in the two rounds
        assert_eq!(index.get("/My Drive/d0"), Some("n0"));
        assert_eq!(index.get("/My Drive/d0/d1/d2"), Some("n2"));
        assert!(!index.contains("/My Drive/d0/d1/d2/d3"));
        assert_eq!(report.rounds, 2);
        assert_eq!(report.unresolved.len(), 3);
        assert_closed(&index, &roots);

        let (index, report) = TreeBuilder::new(&roots, Some("root-id"), 20).build(
            (0..6)
                .rev()
                .map(|i| {
                    let parent = if i == 0 {
                        "root-id".to_string()
                    } else {
                        format!("n{}", i - 1)
                    };
                    folder(&format!("n{}", i), &format!("d{}", i), Some(&parent))
                })
                .collect(),
        );
        assert!(report.is_complete());
        assert_eq!(index.get("/My Drive/d0/d1/d2/d3/d4/d5"), Some("n5"));
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let roots = roots();
        let folders = vec![
            folder("grandchild", "exr", Some("child")),
            folder("first", "renders", Some("root-id")),
            folder("second", "renders", Some("root-id")),
            folder("child", "v001", Some("second")),
            folder("kept", "v002", Some("first")),
        ];

        let (index, report) = TreeBuilder::new(&roots, Some("root-id"), 20).build(folders);

        assert_eq!(index.get("/My Drive/renders"), Some("first"));
        assert_eq!(index.get("/My Drive/renders/v002"), Some("kept"));
        assert!(!index.contains("/My Drive/renders/v001"));
        assert!(!index.contains("/My Drive/renders/v001/exr"));
        assert_eq!(report.resolved, 2);
        assert!(report.is_complete());

        let mut shadowed: Vec<&str> = report.shadowed.iter().map(|f| f.node_id.as_str()).collect();
        shadowed.sort_unstable();
        assert_eq!(shadowed, vec!["child", "grandchild", "second"]);
        assert_closed(&index, &roots);
    }

    #[test]
    fn test_remove_subtree() {
        let mut index: PathIndex = vec![
            ("/My Drive".to_string(), "r".to_string()),
            ("/My Drive/a".to_string(), "a".to_string()),
            ("/My Drive/a/b".to_string(), "b".to_string()),
            ("/My Drive/ab".to_string(), "ab".to_string()),
        ]
        .into_iter()
        .collect();

        assert_eq!(index.remove_subtree("/My Drive/a"), 2);
        assert!(index.contains("/My Drive/ab"));
        assert_eq!(index.paths(), vec!["/My Drive", "/My Drive/ab"]);
    }

    #[test]
    fn test_insert_keeps_existing() {
        let mut index = PathIndex::new();
        assert_eq!(index.insert("/My Drive/a", "winner"), "winner");
        assert_eq!(index.insert("/My Drive/a", "loser"), "winner");
        assert_eq!(index.len(), 1);
    }
}
