//! Google Drive API request and response types
//!
//! Data structures for the subset of the Drive API v3 used by the connector.

use serde::{Deserialize, Serialize};

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Minimal file resource as returned with `fields=files(id,name)`
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
}

/// Google Drive API files.list response
///
/// See: https://developers.google.com/drive/api/v3/reference/files/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesListResponse {
    /// List of files
    #[serde(default)]
    pub files: Vec<DriveFile>,

    /// Token for next page
    pub next_page_token: Option<String>,
}

/// Metadata body for files.create and resumable upload sessions
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<&'a str>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<&'a str>,
}

/// Error envelope returned by the Drive API
///
/// See: https://developers.google.com/drive/api/guides/handle-errors
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: u16,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub reason: String,
}

impl ErrorBody {
    /// Whether a 403 response is really a rate limit.
    pub fn is_rate_limit(&self) -> bool {
        self.errors
            .iter()
            .any(|e| e.reason == "rateLimitExceeded" || e.reason == "userRateLimitExceeded")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_files_list_response() {
        let json = r#"{
            "files": [
                { "id": "file1", "name": "report.pdf" },
                { "id": "file2", "name": "report.pdf" }
            ],
            "nextPageToken": "token123"
        }"#;

        let response: FilesListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.files.len(), 2);
        assert_eq!(response.files[0].id, "file1");
        assert_eq!(response.next_page_token, Some("token123".to_string()));
    }

    #[test]
    fn test_empty_list_response() {
        let response: FilesListResponse = serde_json::from_str("{}").unwrap();
        assert!(response.files.is_empty());
        assert!(response.next_page_token.is_none());
    }

    #[test]
    fn test_folder_metadata_serialization() {
        let metadata = FileMetadata {
            name: Some("Photos"),
            mime_type: Some(FOLDER_MIME_TYPE),
            parents: vec!["parent1"],
        };

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["name"], "Photos");
        assert_eq!(json["mimeType"], FOLDER_MIME_TYPE);
        assert_eq!(json["parents"][0], "parent1");
    }

    #[test]
    fn test_metadata_omits_empty_fields() {
        let metadata = FileMetadata {
            name: None,
            mime_type: None,
            parents: Vec::new(),
        };
        assert_eq!(serde_json::to_string(&metadata).unwrap(), "{}");
    }

    #[test]
    fn test_rate_limit_reason_detection() {
        let json = r#"{
            "error": {
                "code": 403,
                "message": "User Rate Limit Exceeded",
                "errors": [{ "domain": "usageLimits", "reason": "userRateLimitExceeded" }]
            }
        }"#;

        let response: ErrorResponse = serde_json::from_str(json).unwrap();
        assert!(response.error.is_rate_limit());
        assert_eq!(response.error.code, 403);
    }
}
