//! Google Drive API backend implementation
//!
//! Implements the `RemoteBackend` trait for Google Drive API v3.

use async_trait::async_trait;
use bridge_traits::backend::{CredentialSupplier, NodeQuery, Page, RemoteBackend, RemoteNode, SharedDrive};
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::platform::DynAsyncWrite;
use bytes::Bytes;
use core_runtime::config::ProviderSettings;
use serde::de::DeserializeOwned;
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, instrument};

use crate::error::GoogleDriveError;
use crate::types::{DriveFile, DrivesListResponse, FileMetadata, FilesListResponse, FOLDER_MIME_TYPE};

/// Google Drive API base URL
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Google Drive media upload base URL
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Fields to request for file resources
const FILE_FIELDS: &str = "id,name,mimeType,size,modifiedTime,md5Checksum,parents";

/// Content type announced for uploaded payloads
const UPLOAD_CONTENT_TYPE: &str = "application/octet-stream";

/// Google Drive backend
///
/// Talks to Drive API v3 through an injected [`HttpClient`]; the access token
/// comes from a [`CredentialSupplier`] on every call so refreshed tokens are
/// picked up without rebuilding the backend.
///
/// # Features
///
/// - Listings across My Drive and shared drives (`corpora=allDrives`), trashed items excluded
/// - Resumable chunked uploads streamed from disk
/// - Media downloads streamed into the caller's writer
/// - Drive error payloads classified into quota / permission / not-found failures
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::GoogleDriveBackend;
/// use bridge_traits::backend::{NodeQuery, RemoteBackend};
///
/// let backend = GoogleDriveBackend::new(http_client, credentials, &settings);
/// let page = backend.list_nodes(&NodeQuery::AllFolders, 1000, None).await?;
/// ```
pub struct GoogleDriveBackend {
    http_client: Arc<dyn HttpClient>,
    credentials: Arc<dyn CredentialSupplier>,
    api_base: String,
    upload_base: String,
    upload_chunk_size: usize,
    request_timeout: Duration,
}

impl GoogleDriveBackend {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        credentials: Arc<dyn CredentialSupplier>,
        settings: &ProviderSettings,
    ) -> Self {
        Self {
            http_client,
            credentials,
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: DRIVE_UPLOAD_BASE.to_string(),
            upload_chunk_size: settings.upload_chunk_size,
            request_timeout: settings.request_timeout,
        }
    }

    /// Points the backend at different API hosts (proxies, test servers).
    pub fn with_endpoints(mut self, api_base: impl Into<String>, upload_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.upload_base = upload_base.into();
        self
    }

    async fn token(&self) -> Result<String> {
        self.credentials.access_token().await
    }

    fn url(base: &str, path: &str, params: &[(&str, &str)]) -> String {
        let mut url = format!("{}/{}", base, path);
        for (i, (key, value)) in params.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    /// Sends a buffered request and turns non-2xx responses into errors.
    ///
    /// Only idempotent requests go through the retry policy. A replayed folder
    /// creation or session start would leave a second resource behind.
    async fn send(&self, request: HttpRequest, target: &str) -> Result<HttpResponse> {
        let request = request.timeout(self.request_timeout);
        let response = if request.method.is_idempotent() {
            self.http_client
                .execute_with_retry(request, RetryPolicy::default())
                .await?
        } else {
            self.http_client.execute(request).await?
        };

        if response.is_success() {
            Ok(response)
        } else {
            debug!(status = response.status, target, "Drive request failed");
            Err(GoogleDriveError::from_response(response.status, &response.body, target).into())
        }
    }

    fn parse<T: DeserializeOwned>(response: &HttpResponse, what: &str) -> Result<T> {
        serde_json::from_slice(&response.body).map_err(|e| {
            GoogleDriveError::ParseError(format!("Failed to parse {}: {}", what, e)).into()
        })
    }

    /// Starts a resumable session and streams `source` through it in chunks.
    async fn upload_resumable(
        &self,
        method: HttpMethod,
        url: String,
        metadata: &FileMetadata<'_>,
        source: &Path,
    ) -> Result<RemoteNode> {
        let mut file = tokio::fs::File::open(source).await?;
        let total = file.metadata().await?.len();
        let token = self.token().await?;

        let init = HttpRequest::new(method, url)
            .bearer_token(token.as_str())
            .header("X-Upload-Content-Type", UPLOAD_CONTENT_TYPE)
            .header("X-Upload-Content-Length", total.to_string())
            .json(metadata)?;
        let response = self.send(init, metadata.name).await?;

        let session = response
            .header("Location")
            .ok_or_else(|| GoogleDriveError::UploadError("no upload session location returned".to_string()))?
            .to_string();
        debug!(name = metadata.name, total, "Resumable upload session started");

        let chunk_size = self.upload_chunk_size.max(1) as u64;
        let mut offset = 0u64;

        loop {
            file.seek(SeekFrom::Start(offset)).await?;
            let mut chunk = Vec::with_capacity(chunk_size.min(total.saturating_sub(offset)) as usize);
            let read = (&mut file).take(chunk_size).read_to_end(&mut chunk).await? as u64;

            if read == 0 && total > 0 {
                return Err(GoogleDriveError::UploadError(format!(
                    "{} shrank while uploading",
                    source.display()
                ))
                .into());
            }

            let content_range = if total == 0 {
                "bytes */0".to_string()
            } else {
                format!("bytes {}-{}/{}", offset, offset + read - 1, total)
            };

            let request = HttpRequest::new(HttpMethod::Put, session.as_str())
                .bearer_token(token.as_str())
                .header("Content-Range", content_range)
                .body(Bytes::from(chunk))
                .timeout(self.request_timeout);
            let response = self.http_client.execute(request).await?;

            match response.status {
                200 | 201 => {
                    let file: DriveFile = Self::parse(&response, "uploaded file")?;
                    return Ok(file.into());
                }
                308 => {
                    let committed = committed_bytes(response.header("Range"));
                    if committed <= offset {
                        return Err(GoogleDriveError::UploadError(format!(
                            "upload session stalled at byte {}",
                            offset
                        ))
                        .into());
                    }
                    debug!(committed, total, "Upload chunk accepted");
                    offset = committed;
                }
                status => {
                    return Err(GoogleDriveError::from_response(status, &response.body, metadata.name).into());
                }
            }
        }
    }
}

/// Bytes the upload session has persisted, from a `Range: bytes=0-N` header.
fn committed_bytes(range: Option<&str>) -> u64 {
    range
        .and_then(|r| r.trim().strip_prefix("bytes="))
        .and_then(|r| r.split_once('-'))
        .and_then(|(_, end)| end.trim().parse::<u64>().ok())
        .map(|end| end + 1)
        .unwrap_or(0)
}

/// Escapes a literal for use inside single quotes in a Drive query.
pub fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Drive query string for a listing; trashed items are always excluded.
pub fn build_query(query: &NodeQuery) -> String {
    let filter = match query {
        NodeQuery::AllFolders => format!("mimeType = '{}'", FOLDER_MIME_TYPE),
        NodeQuery::AllFiles => format!("mimeType != '{}'", FOLDER_MIME_TYPE),
        NodeQuery::ChildrenOf { parent_id } => {
            format!("'{}' in parents", escape_query_literal(parent_id))
        }
        NodeQuery::NamedChild { parent_id, name } => format!(
            "name = '{}' and '{}' in parents and mimeType != '{}'",
            escape_query_literal(name),
            escape_query_literal(parent_id),
            FOLDER_MIME_TYPE
        ),
    };
    format!("{} and trashed = false", filter)
}

#[async_trait]
impl RemoteBackend for GoogleDriveBackend {
    #[instrument(skip(self))]
    async fn authenticate(&self) -> Result<()> {
        let token = self.token().await?;
        let url = Self::url(&self.api_base, "about", &[("fields", "kind")]);
        self.send(HttpRequest::new(HttpMethod::Get, url).bearer_token(token), "about")
            .await?;
        info!("Google Drive credential accepted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn personal_root(&self) -> Result<RemoteNode> {
        let token = self.token().await?;
        let url = Self::url(
            &self.api_base,
            "files/root",
            &[("fields", FILE_FIELDS), ("supportsAllDrives", "true")],
        );
        let response = self
            .send(HttpRequest::new(HttpMethod::Get, url).bearer_token(token), "root")
            .await?;
        let root: DriveFile = Self::parse(&response, "root folder")?;
        Ok(root.into())
    }

    #[instrument(skip(self))]
    async fn list_shared_drives(&self, page_size: u32, page_token: Option<&str>) -> Result<Page<SharedDrive>> {
        let token = self.token().await?;
        let page_size = page_size.to_string();
        let mut params = vec![
            ("pageSize", page_size.as_str()),
            ("fields", "nextPageToken,drives(id,name)"),
        ];
        if let Some(page_token) = page_token {
            params.push(("pageToken", page_token));
        }

        let url = Self::url(&self.api_base, "drives", &params);
        let response = self
            .send(HttpRequest::new(HttpMethod::Get, url).bearer_token(token), "drives")
            .await?;
        let list: DrivesListResponse = Self::parse(&response, "shared drive list")?;

        debug!(drives = list.drives.len(), "Listed shared drives");
        Ok(Page {
            items: list.drives.into_iter().map(SharedDrive::from).collect(),
            next_page_token: list.next_page_token,
        })
    }

    #[instrument(skip(self))]
    async fn list_nodes(&self, query: &NodeQuery, page_size: u32, page_token: Option<&str>) -> Result<Page<RemoteNode>> {
        let token = self.token().await?;
        let q = build_query(query);
        let page_size = page_size.to_string();
        let fields = format!("nextPageToken,files({})", FILE_FIELDS);
        let mut params = vec![
            ("q", q.as_str()),
            ("corpora", "allDrives"),
            ("includeItemsFromAllDrives", "true"),
            ("supportsAllDrives", "true"),
            ("pageSize", page_size.as_str()),
            ("fields", fields.as_str()),
        ];
        if let Some(page_token) = page_token {
            params.push(("pageToken", page_token));
        }

        let url = Self::url(&self.api_base, "files", &params);
        let response = self
            .send(HttpRequest::new(HttpMethod::Get, url).bearer_token(token), "files")
            .await?;
        let list: FilesListResponse = Self::parse(&response, "files list")?;

        debug!(files = list.files.len(), more = list.next_page_token.is_some(), "Listed files");
        Ok(Page {
            items: list.files.into_iter().map(RemoteNode::from).collect(),
            next_page_token: list.next_page_token,
        })
    }

    #[instrument(skip(self))]
    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<RemoteNode> {
        let token = self.token().await?;
        let url = Self::url(
            &self.api_base,
            "files",
            &[("supportsAllDrives", "true"), ("fields", FILE_FIELDS)],
        );
        let metadata = FileMetadata {
            name,
            mime_type: Some(FOLDER_MIME_TYPE),
            parents: vec![parent_id],
        };

        let request = HttpRequest::new(HttpMethod::Post, url)
            .bearer_token(token)
            .json(&metadata)?;
        let response = self.send(request, parent_id).await?;
        let folder: DriveFile = Self::parse(&response, "created folder")?;

        info!(folder_id = %folder.id, "Created folder");
        Ok(folder.into())
    }

    #[instrument(skip(self, source), fields(source = %source.display()))]
    async fn create_file(&self, name: &str, parent_id: &str, source: &Path) -> Result<RemoteNode> {
        let url = Self::url(
            &self.upload_base,
            "files",
            &[
                ("uploadType", "resumable"),
                ("supportsAllDrives", "true"),
                ("fields", FILE_FIELDS),
            ],
        );
        let metadata = FileMetadata {
            name,
            mime_type: None,
            parents: vec![parent_id],
        };

        self.upload_resumable(HttpMethod::Post, url, &metadata, source).await
    }

    #[instrument(skip(self, source), fields(source = %source.display()))]
    async fn update_file(&self, file_id: &str, name: &str, source: &Path) -> Result<RemoteNode> {
        let url = Self::url(
            &self.upload_base,
            &format!("files/{}", file_id),
            &[
                ("uploadType", "resumable"),
                ("supportsAllDrives", "true"),
                ("fields", FILE_FIELDS),
            ],
        );
        // files.update rejects `parents` in the body
        let metadata = FileMetadata {
            name,
            mime_type: None,
            parents: Vec::new(),
        };

        self.upload_resumable(HttpMethod::Patch, url, &metadata, source).await
    }

    #[instrument(skip(self, sink))]
    async fn download(&self, file_id: &str, sink: &mut DynAsyncWrite) -> Result<u64> {
        let token = self.token().await?;
        let url = Self::url(
            &self.api_base,
            &format!("files/{}", file_id),
            &[("alt", "media"), ("supportsAllDrives", "true")],
        );

        let request = HttpRequest::new(HttpMethod::Get, url).bearer_token(token);
        let mut response = self.http_client.execute_stream(request).await?;

        if !response.is_success() {
            let failed = response.into_buffered().await?;
            return Err(GoogleDriveError::from_response(failed.status, &failed.body, file_id).into());
        }

        let written = tokio::io::copy(&mut response.body, &mut *sink).await?;
        sink.flush().await?;

        info!(bytes = written, "Downloaded file");
        Ok(written)
    }

    #[instrument(skip(self))]
    async fn delete(&self, node_id: &str) -> Result<()> {
        let token = self.token().await?;
        let url = Self::url(
            &self.api_base,
            &format!("files/{}", node_id),
            &[("supportsAllDrives", "true")],
        );

        self.send(HttpRequest::new(HttpMethod::Delete, url).bearer_token(token), node_id)
            .await?;
        info!("Deleted node");
        Ok(())
    }
}
