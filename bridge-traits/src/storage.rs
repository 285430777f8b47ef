//! Remote Storage Abstractions
//!
//! Contracts for the two sides of a migration: a [`SourceProvider`] that
//! lists and downloads a tree of files, and a [`DestinationProvider`] that
//! materializes folders and receives uploads.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

/// An entry of the source listing.
///
/// `path` is the canonical absolute identifier of the entry in the source
/// tree (e.g. `/Photos/img.jpg`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RemoteEntry {
    Folder { name: String, path: String },
    File { name: String, path: String, size: u64 },
}

impl RemoteEntry {
    pub fn folder(name: impl Into<String>, path: impl Into<String>) -> Self {
        RemoteEntry::Folder {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn file(name: impl Into<String>, path: impl Into<String>, size: u64) -> Self {
        RemoteEntry::File {
            name: name.into(),
            path: path.into(),
            size,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RemoteEntry::Folder { name, .. } | RemoteEntry::File { name, .. } => name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            RemoteEntry::Folder { path, .. } | RemoteEntry::File { path, .. } => path,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, RemoteEntry::Folder { .. })
    }

    /// Size in bytes; folders report zero.
    pub fn size(&self) -> u64 {
        match self {
            RemoteEntry::File { size, .. } => *size,
            RemoteEntry::Folder { .. } => 0,
        }
    }
}

/// An object found at the destination by name lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationItem {
    pub id: String,
    pub name: String,
}

/// Read side of a migration.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SourceProvider;
///
/// async fn count_files(source: &dyn SourceProvider) -> Result<usize> {
///     let entries = source.list_entries("/Photos", true, None).await?;
///     Ok(entries.iter().filter(|e| !e.is_folder()).count())
/// }
/// ```
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Short scheme used when rendering paths, e.g. `dropbox`.
    fn scheme(&self) -> &str;

    /// List every entry below `path`.
    ///
    /// Pagination is handled by the implementation; the returned vector is
    /// the complete listing in provider order. `root_context` scopes the call
    /// to a provider namespace (e.g. a team space) when set.
    async fn list_entries(
        &self,
        path: &str,
        recursive: bool,
        root_context: Option<&str>,
    ) -> Result<Vec<RemoteEntry>>;

    /// Download the file at `source_path` into `local_path`, replacing it.
    async fn download(
        &self,
        source_path: &str,
        local_path: &Path,
        root_context: Option<&str>,
    ) -> Result<()>;
}

/// Write side of a migration.
///
/// Parent ids of `None` address the destination root.
#[async_trait]
pub trait DestinationProvider: Send + Sync {
    /// Short scheme used when rendering paths, e.g. `gdrive`.
    fn scheme(&self) -> &str;

    /// Find objects named exactly `name` directly under `parent_id`.
    ///
    /// Returns an empty vector when nothing matches.
    async fn find_by_name(&self, name: &str, parent_id: Option<&str>)
        -> Result<Vec<DestinationItem>>;

    /// Create a folder and return its id.
    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String>;

    /// Upload a local file and return the destination object id.
    ///
    /// When `replace_id` is set the implementation replaces the content of
    /// that existing object instead of creating a sibling with the same name.
    async fn upload(
        &self,
        local_path: &Path,
        name: &str,
        parent_id: Option<&str>,
        replace_id: Option<&str>,
    ) -> Result<String>;

    /// Resolve a nested folder path such as `Backups/2024`, creating the
    /// missing segments, and return the id of the last one.
    ///
    /// An empty path (or `/`) resolves to the root, i.e. `None`.
    async fn find_or_create_folder_path(&self, path: &str) -> Result<Option<String>> {
        let mut parent_id: Option<String> = None;

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let existing = self.find_by_name(segment, parent_id.as_deref()).await?;
            let id = match existing.into_iter().next() {
                Some(item) => item.id,
                None => self.create_folder(segment, parent_id.as_deref()).await?,
            };
            parent_id = Some(id);
        }

        Ok(parent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_remote_entry_accessors() {
        let folder = RemoteEntry::folder("Photos", "/Photos");
        let file = RemoteEntry::file("img.jpg", "/Photos/img.jpg", 200);

        assert!(folder.is_folder());
        assert_eq!(folder.size(), 0);
        assert_eq!(folder.path(), "/Photos");

        assert!(!file.is_folder());
        assert_eq!(file.name(), "img.jpg");
        assert_eq!(file.size(), 200);
    }

    #[test]
    fn test_remote_entry_serde_tag() {
        let file = RemoteEntry::file("a.txt", "/a.txt", 1);
        let json = serde_json::to_string(&file).unwrap();
        assert_eq!(json, r#"{"kind":"file","name":"a.txt","path":"/a.txt","size":1}"#);
    }

    /// Destination that knows a single pre-existing folder `Backups` with id `b1`.
    #[derive(Default)]
    struct RecordingDestination {
        created: Mutex<Vec<(String, Option<String>)>>,
    }

    #[async_trait]
    impl DestinationProvider for RecordingDestination {
        fn scheme(&self) -> &str {
            "test"
        }

        async fn find_by_name(
            &self,
            name: &str,
            parent_id: Option<&str>,
        ) -> Result<Vec<DestinationItem>> {
            if name == "Backups" && parent_id.is_none() {
                return Ok(vec![DestinationItem {
                    id: "b1".to_string(),
                    name: name.to_string(),
                }]);
            }
            Ok(vec![])
        }

        async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String> {
            let mut created = self.created.lock().unwrap();
            created.push((name.to_string(), parent_id.map(str::to_string)));
            Ok(format!("new-{}", name))
        }

        async fn upload(
            &self,
            _local_path: &Path,
            _name: &str,
            _parent_id: Option<&str>,
            _replace_id: Option<&str>,
        ) -> Result<String> {
            unreachable!("not used in these tests")
        }
    }

    #[tokio::test]
    async fn test_find_or_create_folder_path_reuses_and_creates() {
        let destination = RecordingDestination::default();

        let id = destination
            .find_or_create_folder_path("/Backups/2024/")
            .await
            .unwrap();

        assert_eq!(id, Some("new-2024".to_string()));
        let created = destination.created.lock().unwrap();
        assert_eq!(
            *created,
            vec![("2024".to_string(), Some("b1".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_find_or_create_folder_path_root() {
        let destination = RecordingDestination::default();
        assert_eq!(destination.find_or_create_folder_path("/").await.unwrap(), None);
        assert_eq!(destination.find_or_create_folder_path("").await.unwrap(), None);
    }
}
