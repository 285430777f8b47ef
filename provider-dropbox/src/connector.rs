//! Dropbox API connector implementation
//!
//! Implements the `SourceProvider` trait for the Dropbox HTTP API v2.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::{RemoteEntry, SourceProvider};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use crate::error::DropboxError;
use crate::types::{ApiErrorResponse, ListFolderArg, ListFolderContinueArg, ListFolderResult, PathRoot};

/// RPC endpoint base URL
const API_BASE: &str = "https://api.dropboxapi.com/2";

/// Content endpoint base URL
const CONTENT_BASE: &str = "https://content.dropboxapi.com/2";

/// Maximum entries per listing page (a hint, Dropbox may return fewer)
const LIST_PAGE_LIMIT: u32 = 2000;

const API_TIMEOUT: Duration = Duration::from_secs(60);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Serialize `value` as JSON safe for an HTTP header.
///
/// Dropbox reads `Dropbox-API-Arg` as ASCII, so every non-ASCII character is
/// written as a `\uXXXX` escape (surrogate pairs above the BMP).
pub fn header_safe_json<T: Serialize>(value: &T) -> std::result::Result<String, DropboxError> {
    let json = serde_json::to_string(value)
        .map_err(|e| DropboxError::ParseError(format!("Failed to encode header: {}", e)))?;

    let mut escaped = String::with_capacity(json.len());
    let mut units = [0u16; 2];
    for c in json.chars() {
        if c.is_ascii() {
            escaped.push(c);
        } else {
            for unit in c.encode_utf16(&mut units) {
                escaped.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    Ok(escaped)
}

/// Dropbox addresses the root as the empty path.
fn api_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        ""
    } else {
        trimmed
    }
}

/// Dropbox API connector
///
/// Implements `SourceProvider` for the Dropbox HTTP API v2.
///
/// # Example
///
/// ```ignore
/// use provider_dropbox::DropboxConnector;
/// use bridge_traits::storage::SourceProvider;
///
/// let connector = DropboxConnector::new(http_client, access_token);
/// let entries = connector.list_entries("/Photos", true, None).await?;
/// ```
pub struct DropboxConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// OAuth 2.0 access token
    access_token: String,
}

impl DropboxConnector {
    /// Create a new Dropbox connector
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client implementation
    /// * `access_token` - OAuth 2.0 access token with `files.content.read`
    pub fn new(http_client: Arc<dyn HttpClient>, access_token: String) -> Self {
        Self {
            http_client,
            access_token,
        }
    }

    /// Authorized request, scoped to `root_context` when set.
    fn request(
        &self,
        method: HttpMethod,
        url: impl Into<String>,
        root_context: Option<&str>,
    ) -> std::result::Result<HttpRequest, DropboxError> {
        let mut request = HttpRequest::new(method, url)
            .bearer_token(&self.access_token)
            .timeout(API_TIMEOUT);

        if let Some(namespace_id) = root_context {
            let root = header_safe_json(&PathRoot {
                tag: "namespace_id",
                namespace_id,
            })?;
            request = request.header("Dropbox-API-Path-Root", root);
        }

        Ok(request)
    }

    async fn post_json<B, R>(
        &self,
        endpoint: &str,
        body: &B,
        root_context: Option<&str>,
    ) -> std::result::Result<R, DropboxError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let request = self
            .request(
                HttpMethod::Post,
                format!("{}/{}", API_BASE, endpoint),
                root_context,
            )?
            .json(body)?;

        let response = self.http_client.execute(request).await?;
        if !response.is_success() {
            return Err(error_from_response(&response));
        }

        serde_json::from_slice(&response.body).map_err(|e| {
            DropboxError::ParseError(format!("Failed to parse {} response: {}", endpoint, e))
        })
    }
}

#[async_trait]
impl SourceProvider for DropboxConnector {
    fn scheme(&self) -> &str {
        "dropbox"
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn list_entries(
        &self,
        path: &str,
        recursive: bool,
        root_context: Option<&str>,
    ) -> Result<Vec<RemoteEntry>> {
        info!("Listing Dropbox folder");

        let listed = api_path(path);
        let listed_lower = listed.to_lowercase();
        let arg = ListFolderArg {
            path: listed,
            recursive,
            include_deleted: false,
            limit: LIST_PAGE_LIMIT,
        };

        let mut page: ListFolderResult = self
            .post_json("files/list_folder", &arg, root_context)
            .await?;
        let mut entries = Vec::new();
        let mut pages = 1;

        loop {
            for metadata in page.entries {
                // The listed folder itself is not part of its contents
                if metadata.path_lower().as_deref() == Some(listed_lower.as_str()) {
                    continue;
                }
                if let Some(entry) = metadata.into_entry() {
                    entries.push(entry);
                }
            }

            if !page.has_more {
                break;
            }

            let cursor = page.cursor;
            page = self
                .post_json(
                    "files/list_folder/continue",
                    &ListFolderContinueArg { cursor: &cursor },
                    root_context,
                )
                .await?;
            pages += 1;
        }

        info!(
            entries = entries.len(),
            pages, "Listed Dropbox folder"
        );
        Ok(entries)
    }

    #[instrument(skip(self, local_path), fields(source_path = %source_path))]
    async fn download(
        &self,
        source_path: &str,
        local_path: &Path,
        root_context: Option<&str>,
    ) -> Result<()> {
        let arg = header_safe_json(&serde_json::json!({ "path": source_path }))?;
        let request = self
            .request(
                HttpMethod::Post,
                format!("{}/files/download", CONTENT_BASE),
                root_context,
            )?
            .header("Dropbox-API-Arg", arg)
            .timeout(DOWNLOAD_TIMEOUT);

        let mut reader = self
            .http_client
            .download_stream(request)
            .await
            .map_err(classify_stream_error)?;

        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(DropboxError::from)?;
        let bytes = tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| DropboxError::NetworkError(format!("Download interrupted: {}", e)))?;
        file.flush().await.map_err(DropboxError::from)?;

        debug!(bytes, "Download stream finished");
        info!(
            "Successfully downloaded {} to {}",
            source_path,
            local_path.display()
        );
        Ok(())
    }
}

/// `error_summary` of a Dropbox error body, or the raw text.
fn error_message(body: &[u8]) -> String {
    serde_json::from_slice::<ApiErrorResponse>(body)
        .ok()
        .map(|e| e.error_summary)
        .filter(|summary| !summary.is_empty())
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned())
}

/// Map a non-2xx RPC response onto a provider error.
fn error_from_response(response: &HttpResponse) -> DropboxError {
    let message = error_message(&response.body);
    match response.status {
        401 => DropboxError::AuthenticationFailed(message),
        429 => DropboxError::RateLimitExceeded {
            retry_after_seconds: response
                .header("Retry-After")
                .and_then(|value| value.trim().parse().ok()),
        },
        status => DropboxError::ApiError {
            status_code: status,
            message,
        },
    }
}

/// Streaming downloads report non-2xx statuses as `BridgeError::Api`.
fn classify_stream_error(error: BridgeError) -> DropboxError {
    match error {
        BridgeError::Api { status: 401, message } => {
            DropboxError::AuthenticationFailed(error_message(message.as_bytes()))
        }
        BridgeError::Api { status: 429, .. } => DropboxError::RateLimitExceeded {
            retry_after_seconds: None,
        },
        BridgeError::Api { status, message } => DropboxError::ApiError {
            status_code: status,
            message: error_message(message.as_bytes()),
        },
        other => DropboxError::BridgeError(other),
    }
}
