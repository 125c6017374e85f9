//! Virtual path helpers
//!
//! Virtual paths are `/`-separated, absolute, and start with a root name
//! (`/My Drive/proj/shots`). They carry no backend addressing.

use crate::error::{Result, SyncError};
use std::path::{Path, PathBuf};

pub const SEPARATOR: char = '/';

/// Canonical form: leading `/`, no empty segments, no trailing `/`.
pub fn normalize(path: &str) -> Result<String> {
    let trimmed = path.trim();
    if !trimmed.starts_with(SEPARATOR) {
        return Err(SyncError::InvalidPath(path.to_string()));
    }

    let segments: Vec<&str> = trimmed
        .split(SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if segments.is_empty() {
        return Err(SyncError::InvalidPath(path.to_string()));
    }

    Ok(format!("/{}", segments.join("/")))
}

/// Parent of a normalized path; `None` for a root path like `/My Drive`.
pub fn parent(path: &str) -> Option<&str> {
    match path.rsplit_once(SEPARATOR) {
        Some(("", _)) | None => None,
        Some((parent, _)) => Some(parent),
    }
}

/// Last segment of a normalized path.
pub fn file_name(path: &str) -> &str {
    path.rsplit(SEPARATOR).next().unwrap_or(path)
}

pub fn join(parent: &str, name: &str) -> String {
    format!("{}/{}", parent.trim_end_matches(SEPARATOR), name)
}

/// Whether `path` is `ancestor` itself or lies underneath it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    path == ancestor
        || (path.starts_with(ancestor) && path[ancestor.len()..].starts_with(SEPARATOR))
}

/// Whether the last segment carries a file extension.
pub fn has_extension(path: &str) -> bool {
    Path::new(file_name(path)).extension().is_some()
}

/// Splits a remote destination into `(folder, file name)`.
///
/// A destination whose last segment has an extension names the file itself;
/// otherwise it is a folder and `source_name` is used as the file name.
pub fn split_destination(destination: &str, source_name: &str) -> Result<(String, String)> {
    let destination = normalize(destination)?;
    if has_extension(&destination) {
        let folder = parent(&destination)
            .ok_or_else(|| SyncError::InvalidPath(destination.clone()))?
            .to_string();
        let name = file_name(&destination).to_string();
        Ok((folder, name))
    } else {
        Ok((destination, source_name.to_string()))
    }
}

/// Local counterpart of [`split_destination`] for download targets.
pub fn split_local_destination(destination: &Path, source_name: &str) -> (PathBuf, String) {
    match (destination.extension(), destination.file_name()) {
        (Some(_), Some(name)) => (
            destination
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
            name.to_string_lossy().into_owned(),
        ),
        _ => (destination.to_path_buf(), source_name.to_string()),
    }
}

/// File name component of a local path, as UTF-8.
pub fn local_file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| SyncError::InvalidPath(path.display().to_string()))
}
