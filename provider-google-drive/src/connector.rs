//! Google Drive API connector implementation
//!
//! Implements the `DestinationProvider` trait for Google Drive API v3.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::{DestinationItem, DestinationProvider};
use bytes::Bytes;
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, instrument, warn};

use crate::error::GoogleDriveError;
use crate::types::{DriveFile, ErrorResponse, FileMetadata, FilesListResponse, FOLDER_MIME_TYPE};

/// Google Drive API base URL
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Google Drive upload base URL
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Page size for name lookups
const LOOKUP_PAGE_SIZE: u32 = 100;

/// Resumable upload chunk size; Drive requires multiples of 256 KiB
const UPLOAD_CHUNK_SIZE: usize = 32 * 256 * 1024;

const API_TIMEOUT: Duration = Duration::from_secs(30);
const CHUNK_TIMEOUT: Duration = Duration::from_secs(300);

/// Escape a value for a single-quoted Drive query literal.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Query matching non-trashed objects named exactly `name` directly under `parent_id`.
///
/// A missing parent addresses the drive root (`'root' in parents`).
pub fn name_query(name: &str, parent_id: Option<&str>) -> String {
    format!(
        "name = '{}' and '{}' in parents and trashed = false",
        escape_query_value(name),
        escape_query_value(parent_id.unwrap_or("root"))
    )
}

/// Google Drive API connector
///
/// Implements `DestinationProvider` for Google Drive API v3.
///
/// # Features
///
/// - Name lookup under a parent folder, paginated
/// - Folder creation
/// - Chunked resumable uploads; `replace_id` updates an existing file in place
/// - OAuth 2.0 bearer authentication via `HttpClient`
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::GoogleDriveConnector;
/// use bridge_traits::storage::DestinationProvider;
///
/// let connector = GoogleDriveConnector::new(http_client, access_token);
/// let folder_id = connector.find_or_create_folder_path("Backups/2024").await?;
/// ```
pub struct GoogleDriveConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// OAuth 2.0 access token
    access_token: String,
}

impl GoogleDriveConnector {
    /// Create a new Google Drive connector
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client implementation
    /// * `access_token` - OAuth 2.0 access token with the `drive.file` or `drive` scope
    pub fn new(http_client: Arc<dyn HttpClient>, access_token: String) -> Self {
        Self {
            http_client,
            access_token,
        }
    }

    fn request(&self, method: HttpMethod, url: impl Into<String>) -> HttpRequest {
        HttpRequest::new(method, url)
            .bearer_token(&self.access_token)
            .header("Accept", "application/json")
            .timeout(API_TIMEOUT)
    }

    /// Execute a request and turn non-2xx responses into provider errors.
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, GoogleDriveError> {
        let response = self.http_client.execute(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(error_from_response(&response))
        }
    }

    /// Open a resumable session and return its URL.
    async fn open_upload_session(
        &self,
        name: &str,
        parent_id: Option<&str>,
        replace_id: Option<&str>,
        total: u64,
    ) -> std::result::Result<String, GoogleDriveError> {
        let request = match replace_id {
            Some(file_id) => {
                let url = format!(
                    "{}/files/{}?uploadType=resumable&fields=id",
                    DRIVE_UPLOAD_BASE,
                    urlencoding::encode(file_id)
                );
                self.request(HttpMethod::Patch, url).json(&FileMetadata {
                    name: None,
                    mime_type: None,
                    parents: Vec::new(),
                })?
            }
            None => {
                let url = format!("{}/files?uploadType=resumable&fields=id", DRIVE_UPLOAD_BASE);
                self.request(HttpMethod::Post, url).json(&FileMetadata {
                    name: Some(name),
                    mime_type: None,
                    parents: parent_id.into_iter().collect(),
                })?
            }
        }
        .header("X-Upload-Content-Length", total.to_string());

        let response = self.send(request).await?;
        response
            .header("Location")
            .map(str::to_string)
            .ok_or_else(|| {
                GoogleDriveError::UploadSession("response carried no Location header".to_string())
            })
    }

    /// Send the file in chunks to an open session and return the file id.
    async fn upload_chunks(
        &self,
        session_url: &str,
        local_path: &Path,
        total: u64,
    ) -> std::result::Result<String, GoogleDriveError> {
        let mut file = tokio::fs::File::open(local_path).await?;

        if total == 0 {
            let request = self
                .request(HttpMethod::Put, session_url)
                .header("Content-Range", "bytes */0")
                .body(Bytes::new());
            return parse_file_id(&self.send(request).await?);
        }

        let mut buffer = vec![0u8; UPLOAD_CHUNK_SIZE];
        let mut offset = 0u64;

        loop {
            let read = fill_buffer(&mut file, &mut buffer).await?;
            if read == 0 {
                return Err(GoogleDriveError::UploadSession(format!(
                    "local file ended at byte {} of {}",
                    offset, total
                )));
            }

            let end = offset + read as u64 - 1;
            let request = self
                .request(HttpMethod::Put, session_url)
                .header("Content-Range", format!("bytes {}-{}/{}", offset, end, total))
                .body(Bytes::copy_from_slice(&buffer[..read]))
                .timeout(CHUNK_TIMEOUT);

            let response = self.http_client.execute(request).await?;
            match response.status {
                200 | 201 => return parse_file_id(&response),
                308 => {
                    let acknowledged = response
                        .header("Range")
                        .and_then(parse_range_end)
                        .map(|last| last + 1)
                        .unwrap_or(0);

                    if acknowledged != end + 1 {
                        debug!(
                            acknowledged,
                            sent = end + 1,
                            "Server kept a partial chunk, resending from its offset"
                        );
                        file.seek(SeekFrom::Start(acknowledged)).await?;
                    }
                    offset = acknowledged;
                    debug!(offset, total, "Uploaded chunk");
                }
                _ => return Err(error_from_response(&response)),
            }
        }
    }
}

#[async_trait]
impl DestinationProvider for GoogleDriveConnector {
    fn scheme(&self) -> &str {
        "gdrive"
    }

    #[instrument(skip(self), fields(name = %name, parent_id = ?parent_id))]
    async fn find_by_name(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<Vec<DestinationItem>> {
        let query = name_query(name, parent_id);
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!(
                "{}/files?q={}&spaces=drive&pageSize={}&fields={}",
                DRIVE_API_BASE,
                urlencoding::encode(&query),
                LOOKUP_PAGE_SIZE,
                urlencoding::encode("nextPageToken,files(id,name)")
            );
            if let Some(token) = &page_token {
                url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
            }

            let response = self.send(self.request(HttpMethod::Get, url)).await?;
            let page: FilesListResponse = serde_json::from_slice(&response.body).map_err(|e| {
                GoogleDriveError::ParseError(format!("Failed to parse files list response: {}", e))
            })?;

            items.extend(page.files.into_iter().map(|f| DestinationItem {
                id: f.id,
                name: f.name,
            }));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(matches = items.len(), "Looked up name");
        Ok(items)
    }

    #[instrument(skip(self), fields(name = %name, parent_id = ?parent_id))]
    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String> {
        let url = format!("{}/files?fields=id", DRIVE_API_BASE);
        let request = self.request(HttpMethod::Post, url).json(&FileMetadata {
            name: Some(name),
            mime_type: Some(FOLDER_MIME_TYPE),
            parents: parent_id.into_iter().collect(),
        })?;

        let response = self.send(request).await?;
        let id = parse_file_id(&response)?;

        info!("Created folder '{}' with ID: {}", name, id);
        Ok(id)
    }

    #[instrument(skip(self, local_path), fields(name = %name, parent_id = ?parent_id, replace_id = ?replace_id))]
    async fn upload(
        &self,
        local_path: &Path,
        name: &str,
        parent_id: Option<&str>,
        replace_id: Option<&str>,
    ) -> Result<String> {
        let total = tokio::fs::metadata(local_path)
            .await
            .map_err(GoogleDriveError::from)?
            .len();

        let session_url = self
            .open_upload_session(name, parent_id, replace_id, total)
            .await?;

        let id = self
            .upload_chunks(&session_url, local_path, total)
            .await
            .map_err(|e| {
                warn!(error = %e, "Resumable upload failed");
                e
            })?;

        info!("Successfully uploaded {} with ID: {}", name, id);
        Ok(id)
    }
}

/// Map a non-2xx Drive response onto a provider error.
fn error_from_response(response: &HttpResponse) -> GoogleDriveError {
    let status = response.status;
    let body = serde_json::from_slice::<ErrorResponse>(&response.body)
        .ok()
        .map(|envelope| envelope.error);
    let message = body
        .as_ref()
        .map(|b| b.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| String::from_utf8_lossy(&response.body).into_owned());
    let retry_after_seconds = response
        .header("Retry-After")
        .and_then(|value| value.trim().parse().ok());

    match status {
        401 => GoogleDriveError::AuthenticationFailed(message),
        429 => GoogleDriveError::RateLimitExceeded {
            retry_after_seconds,
            message,
        },
        403 if body.as_ref().is_some_and(|b| b.is_rate_limit()) => {
            GoogleDriveError::RateLimitExceeded {
                retry_after_seconds,
                message,
            }
        }
        _ => GoogleDriveError::ApiError {
            status_code: status,
            message,
        },
    }
}

fn parse_file_id(response: &HttpResponse) -> std::result::Result<String, GoogleDriveError> {
    serde_json::from_slice::<DriveFile>(&response.body)
        .map(|file| file.id)
        .map_err(|e| GoogleDriveError::ParseError(format!("Failed to parse file resource: {}", e)))
}

/// Last byte index of a `Range: bytes=0-N` header.
fn parse_range_end(range: &str) -> Option<u64> {
    range.trim().strip_prefix("bytes=")?.split('-').nth(1)?.parse().ok()
}

/// Read until `buffer` is full or the file ends.
async fn fill_buffer(file: &mut tokio::fs::File, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let read = file.read(&mut buffer[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}
