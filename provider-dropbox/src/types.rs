//! Dropbox API request and response types
//!
//! Data structures for the `files/list_folder` family of endpoints.

use bridge_traits::RemoteEntry;
use serde::{Deserialize, Serialize};

/// Body of `files/list_folder`
///
/// See: https://www.dropbox.com/developers/documentation/http/documentation#files-list_folder
#[derive(Debug, Serialize)]
pub struct ListFolderArg<'a> {
    /// `""` addresses the root
    pub path: &'a str,
    pub recursive: bool,
    pub include_deleted: bool,
    pub limit: u32,
}

/// Body of `files/list_folder/continue`
#[derive(Debug, Serialize)]
pub struct ListFolderContinueArg<'a> {
    pub cursor: &'a str,
}

/// One page of a folder listing
#[derive(Debug, Deserialize)]
pub struct ListFolderResult {
    pub entries: Vec<Metadata>,
    pub cursor: String,
    pub has_more: bool,
}

/// Entry metadata, discriminated by `.tag`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = ".tag", rename_all = "lowercase")]
pub enum Metadata {
    File {
        name: String,
        path_display: Option<String>,
        path_lower: Option<String>,
        #[serde(default)]
        size: u64,
    },
    Folder {
        name: String,
        path_display: Option<String>,
        path_lower: Option<String>,
    },
    Deleted {
        name: String,
    },
}

impl Metadata {
    /// Display path, falling back to the lower-cased path.
    pub fn path(&self) -> Option<&str> {
        match self {
            Metadata::File {
                path_display,
                path_lower,
                ..
            }
            | Metadata::Folder {
                path_display,
                path_lower,
                ..
            } => path_display.as_deref().or(path_lower.as_deref()),
            Metadata::Deleted { .. } => None,
        }
    }

    /// Lower-cased path, used for case-insensitive comparisons.
    pub fn path_lower(&self) -> Option<String> {
        match self {
            Metadata::File { path_lower, .. } | Metadata::Folder { path_lower, .. } => path_lower
                .clone()
                .or_else(|| self.path().map(str::to_lowercase)),
            Metadata::Deleted { .. } => None,
        }
    }

    /// Convert into a bridge entry; deleted entries and entries without a path are dropped.
    pub fn into_entry(self) -> Option<RemoteEntry> {
        let path = self.path()?.to_string();
        match self {
            Metadata::File { name, size, .. } => Some(RemoteEntry::file(name, path, size)),
            Metadata::Folder { name, .. } => Some(RemoteEntry::folder(name, path)),
            Metadata::Deleted { .. } => None,
        }
    }
}

/// Error envelope of a 409 response
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub error_summary: String,
}

/// Value of the `Dropbox-API-Path-Root` header for a namespace
#[derive(Debug, Serialize)]
pub struct PathRoot<'a> {
    #[serde(rename = ".tag")]
    pub tag: &'static str,
    pub namespace_id: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_list_folder_result() {
        let json = r#"{
            "entries": [
                {".tag": "folder", "name": "Photos", "path_lower": "/photos",
                 "path_display": "/Photos", "id": "id:1"},
                {".tag": "file", "name": "img.jpg", "path_lower": "/photos/img.jpg",
                 "path_display": "/Photos/img.jpg", "id": "id:2", "size": 200,
                 "rev": "015", "client_modified": "2024-01-01T00:00:00Z"},
                {".tag": "deleted", "name": "old.txt", "path_lower": "/old.txt"}
            ],
            "cursor": "c1",
            "has_more": false
        }"#;

        let result: ListFolderResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.entries.len(), 3);
        assert!(!result.has_more);

        let entries: Vec<RemoteEntry> = result
            .entries
            .into_iter()
            .filter_map(Metadata::into_entry)
            .collect();
        assert_eq!(
            entries,
            vec![
                RemoteEntry::folder("Photos", "/Photos"),
                RemoteEntry::file("img.jpg", "/Photos/img.jpg", 200),
            ]
        );
    }

    #[test]
    fn test_path_falls_back_to_lower() {
        let metadata = Metadata::Folder {
            name: "Docs".to_string(),
            path_display: None,
            path_lower: Some("/docs".to_string()),
        };
        assert_eq!(metadata.path(), Some("/docs"));
    }

    #[test]
    fn test_path_root_serialization() {
        let root = PathRoot {
            tag: "namespace_id",
            namespace_id: "12345",
        };
        assert_eq!(
            serde_json::to_string(&root).unwrap(),
            r#"{".tag":"namespace_id","namespace_id":"12345"}"#
        );
    }
}
