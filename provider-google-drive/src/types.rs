//! Google Drive API wire types
//!
//! Data structures for Google Drive API v3 requests and responses.

use bridge_traits::backend::{RemoteNode, SharedDrive};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// MIME type Drive uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Google Drive API file resource
///
/// See: https://developers.google.com/drive/api/v3/reference/files#resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID
    pub id: String,

    /// File name
    #[serde(default)]
    pub name: String,

    /// MIME type
    #[serde(default)]
    pub mime_type: Option<String>,

    /// File size in bytes, as a decimal string (omitted for folders)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    /// Modification time (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,

    /// MD5 checksum (binary files only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5_checksum: Option<String>,

    /// Parent folder IDs
    #[serde(default)]
    pub parents: Vec<String>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }
}

impl From<DriveFile> for RemoteNode {
    fn from(file: DriveFile) -> Self {
        let is_folder = file.is_folder();
        RemoteNode {
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
            is_folder,
            parent_ids: file.parents,
            size: file.size.and_then(|s| s.parse().ok()),
            modified_at: file
                .modified_time
                .as_deref()
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            md5_checksum: file.md5_checksum,
        }
    }
}

/// Google Drive API files.list response
///
/// See: https://developers.google.com/drive/api/v3/reference/files/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesListResponse {
    #[serde(default)]
    pub files: Vec<DriveFile>,

    /// Token for next page
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Shared drive resource
#[derive(Debug, Clone, Deserialize)]
pub struct DriveResource {
    pub id: String,
    pub name: String,
}

impl From<DriveResource> for SharedDrive {
    fn from(drive: DriveResource) -> Self {
        SharedDrive {
            id: drive.id,
            name: drive.name,
        }
    }
}

/// Google Drive API drives.list response
///
/// See: https://developers.google.com/drive/api/v3/reference/drives/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrivesListResponse {
    #[serde(default)]
    pub drives: Vec<DriveResource>,

    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Metadata body for files.create / files.update
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata<'a> {
    pub name: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<&'a str>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<&'a str>,
}

/// Error envelope returned by every Drive endpoint
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: u16,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub domain: Option<String>,

    #[serde(default)]
    pub reason: Option<String>,

    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorBody {
    /// First machine-readable reason, e.g. `userRateLimitExceeded`
    pub fn reason(&self) -> Option<&str> {
        self.errors.iter().find_map(|e| e.reason.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_file_into_remote_node() {
        let json = r#"{
            "id": "abc123",
            "name": "sh010_comp_v003.exr",
            "mimeType": "image/x-exr",
            "size": "1048576",
            "modifiedTime": "2024-03-01T10:15:00.000Z",
            "md5Checksum": "d41d8cd98f00b204e9800998ecf8427e",
            "parents": ["folder1"]
        }"#;

        let node: RemoteNode = serde_json::from_str::<DriveFile>(json).unwrap().into();
        assert_eq!(node.id, "abc123");
        assert!(!node.is_folder);
        assert_eq!(node.size, Some(1_048_576));
        assert_eq!(node.primary_parent(), Some("folder1"));
        assert_eq!(
            node.modified_at.map(|t| t.to_rfc3339()),
            Some("2024-03-01T10:15:00+00:00".to_string())
        );
    }

    #[test]
    fn test_folder_without_parents() {
        let json = r#"{"id": "f1", "name": "Shared", "mimeType": "application/vnd.google-apps.folder"}"#;

        let node: RemoteNode = serde_json::from_str::<DriveFile>(json).unwrap().into();
        assert!(node.is_folder);
        assert!(node.parent_ids.is_empty());
        assert_eq!(node.size, None);
    }

    #[test]
    fn test_deserialize_error_envelope() {
        let json = r#"{
            "error": {
                "errors": [
                    {"domain": "usageLimits", "reason": "userRateLimitExceeded", "message": "User Rate Limit Exceeded"}
                ],
                "code": 403,
                "message": "User Rate Limit Exceeded"
            }
        }"#;

        let response: ApiErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.error.code, 403);
        assert_eq!(response.error.reason(), Some("userRateLimitExceeded"));
    }

    #[test]
    fn test_folder_metadata_serialization() {
        let body = FileMetadata {
            name: "sh010",
            mime_type: Some(FOLDER_MIME_TYPE),
            parents: vec!["parent1"],
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["mimeType"], FOLDER_MIME_TYPE);
        assert_eq!(json["parents"][0], "parent1");

        let update = FileMetadata {
            name: "renamed.exr",
            mime_type: None,
            parents: vec![],
        };
        let json = serde_json::to_value(&update).unwrap();
        assert!(json.get("parents").is_none());
        assert!(json.get("mimeType").is_none());
    }
}
