//! # Progress Store
//!
//! Durable record of migration progress.
//!
//! ## Overview
//!
//! [`ProgressState`] is the only persisted entity: migrated and skipped files,
//! the folder mapping and skipped folders. A [`ProgressStore`] loads and
//! overwrites the whole record; the [`ProgressLedger`] pairs the in-memory
//! state with its store and persists after every mutation, so a crash loses at
//! most the step that was in flight.
//!
//! ## Folder keys
//!
//! Folders are keyed by a normalized destination key (`/` followed by the
//! destination-relative path, the root is `/`). `folder_aliases` maps the
//! source path of every replicated folder to its key. Source paths are only
//! ever resolved through the alias table, so a source folder whose path
//! happens to equal a destination key (`/Backups` under `--dest Backups`)
//! is never mistaken for it.
//!
//! Records written before the alias table existed keyed folders by their
//! source path. On load they get an identity alias per folder key and are
//! stamped with [`STATE_VERSION`].

use crate::error::{MigrationError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Key of the destination root in `migrated_folders`.
pub const ROOT_KEY: &str = "/";

/// Version stamped on records that carry the alias table.
pub const STATE_VERSION: u32 = 2;

fn root_folder_map() -> BTreeMap<String, Option<String>> {
    BTreeMap::from([(ROOT_KEY.to_string(), None)])
}

/// Persisted migration progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    /// Record layout; `0` for records written before the alias table
    #[serde(default)]
    pub version: u32,

    /// Source paths transferred successfully
    #[serde(default)]
    pub migrated_files: BTreeSet<String>,

    /// Source paths the operator or policy chose to skip
    #[serde(default)]
    pub skipped_files: BTreeSet<String>,

    /// Folder key to destination folder id; `None` is the destination root
    #[serde(default = "root_folder_map")]
    pub migrated_folders: BTreeMap<String, Option<String>>,

    /// Source folder paths skipped interactively
    #[serde(default)]
    pub skipped_folders: BTreeSet<String>,

    /// Source folder path to folder key
    #[serde(default)]
    pub folder_aliases: BTreeMap<String, String>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            migrated_files: BTreeSet::new(),
            skipped_files: BTreeSet::new(),
            migrated_folders: root_folder_map(),
            skipped_folders: BTreeSet::new(),
            folder_aliases: BTreeMap::new(),
        }
    }
}

impl ProgressState {
    /// Empty skeleton with only the root mapping.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_file_migrated(&self, path: &str) -> bool {
        self.migrated_files.contains(path)
    }

    pub fn is_file_skipped(&self, path: &str) -> bool {
        self.skipped_files.contains(path)
    }

    /// Whether `path` lies below a folder that was skipped.
    pub fn is_under_skipped_folder(&self, path: &str) -> bool {
        self.skipped_folders.iter().any(|folder| {
            let folder = folder.trim_end_matches('/');
            path.len() > folder.len()
                && path.starts_with(folder)
                && path.as_bytes()[folder.len()] == b'/'
        })
    }

    /// A file still needs work in this run.
    pub fn is_file_pending(&self, path: &str) -> bool {
        !self.is_file_migrated(path)
            && !self.is_file_skipped(path)
            && !self.is_under_skipped_folder(path)
    }

    /// A source folder was replicated to `folder_key`, or skipped.
    pub fn is_folder_settled(&self, source_path: &str, folder_key: &str) -> bool {
        self.migrated_folders.contains_key(folder_key)
            || self.folder_aliases.contains_key(source_path)
            || self.skipped_folders.contains(source_path)
            || self.is_under_skipped_folder(source_path)
    }

    /// Destination id recorded under the folder key `key`.
    ///
    /// Returns `None` when nothing is recorded and `Some(None)` for the root.
    pub fn folder_id(&self, key: &str) -> Option<Option<&str>> {
        self.migrated_folders.get(key).map(|id| id.as_deref())
    }

    /// Destination id of the replicated source folder `source_path`.
    pub fn folder_id_for_source(&self, source_path: &str) -> Option<Option<&str>> {
        self.folder_aliases
            .get(source_path)
            .and_then(|key| self.folder_id(key))
    }

    /// Record a replicated folder. Keys are never removed.
    ///
    /// `source_path` is `None` for a destination folder with no source
    /// counterpart, such as the destination root of an unscoped listing.
    pub fn record_folder(
        &mut self,
        folder_key: &str,
        source_path: Option<&str>,
        id: Option<String>,
    ) {
        self.migrated_folders.insert(folder_key.to_string(), id);
        if let Some(source_path) = source_path {
            self.folder_aliases
                .insert(source_path.to_string(), folder_key.to_string());
        }
    }

    pub fn record_migrated_file(&mut self, path: &str) {
        self.skipped_files.remove(path);
        self.migrated_files.insert(path.to_string());
    }

    /// Mark a file skipped unless it was already migrated.
    pub fn record_skipped_file(&mut self, path: &str) {
        if !self.migrated_files.contains(path) {
            self.skipped_files.insert(path.to_string());
        }
    }

    pub fn record_skipped_folder(&mut self, path: &str) {
        self.skipped_folders.insert(path.to_string());
    }

    /// Forget every skip decision so the work is offered again.
    pub fn reset_skipped(&mut self) {
        self.skipped_files.clear();
        self.skipped_folders.clear();
    }

    /// Bring a loaded record up to the current layout.
    ///
    /// Restores a missing root mapping and gives pre-alias records an
    /// identity alias for each folder they hold.
    pub(crate) fn upgrade(&mut self) {
        self.migrated_folders
            .entry(ROOT_KEY.to_string())
            .or_insert(None);

        if self.version < STATE_VERSION {
            for key in self.migrated_folders.keys().filter(|key| *key != ROOT_KEY) {
                self.folder_aliases
                    .entry(key.clone())
                    .or_insert_with(|| key.clone());
            }
            self.version = STATE_VERSION;
        }
    }
}

/// Durable storage of [`ProgressState`].
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Load the persisted record, or the skeleton state when none exists.
    async fn load(&self) -> Result<ProgressState>;

    /// Overwrite the persisted record with `state`.
    async fn save(&self, state: &ProgressState) -> Result<()>;
}

/// JSON file store.
///
/// Saves write a sibling `.tmp` file and rename it over the record, so an
/// interrupted write leaves the previous record intact.
#[derive(Debug, Clone)]
pub struct JsonFileProgressStore {
    path: PathBuf,
}

impl JsonFileProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl ProgressStore for JsonFileProgressStore {
    async fn load(&self) -> Result<ProgressState> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No progress record found, starting fresh");
                return Ok(ProgressState::new());
            }
            Err(e) => {
                return Err(MigrationError::ProgressStore(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let mut state: ProgressState = serde_json::from_str(&contents).map_err(|e| {
            MigrationError::ProgressStore(format!(
                "failed to parse {}: {}",
                self.path.display(),
                e
            ))
        })?;
        state.upgrade();

        debug!(
            path = %self.path.display(),
            migrated_files = state.migrated_files.len(),
            migrated_folders = state.migrated_folders.len(),
            "Loaded progress record"
        );

        Ok(state)
    }

    async fn save(&self, state: &ProgressState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| MigrationError::ProgressStore(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MigrationError::ProgressStore(format!(
                    "failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, json).await.map_err(|e| {
            MigrationError::ProgressStore(format!("failed to write {}: {}", temp.display(), e))
        })?;
        tokio::fs::rename(&temp, &self.path).await.map_err(|e| {
            MigrationError::ProgressStore(format!(
                "failed to replace {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(())
    }
}

/// In-memory store, useful for embedding hosts and tests.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    state: Mutex<Option<ProgressState>>,
    saves: AtomicUsize,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing record.
    pub fn with_state(state: ProgressState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            saves: AtomicUsize::new(0),
        }
    }

    /// Last saved record, if any.
    pub fn snapshot(&self) -> Option<ProgressState> {
        self.state.lock().ok().and_then(|guard| guard.clone())
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn load(&self) -> Result<ProgressState> {
        let guard = self
            .state
            .lock()
            .map_err(|_| MigrationError::ProgressStore("state lock poisoned".to_string()))?;
        Ok(guard.clone().unwrap_or_default())
    }

    async fn save(&self, state: &ProgressState) -> Result<()> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| MigrationError::ProgressStore("state lock poisoned".to_string()))?;
        *guard = Some(state.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory progress paired with its store.
///
/// Every mutator persists before returning.
pub struct ProgressLedger {
    state: ProgressState,
    store: Arc<dyn ProgressStore>,
}

impl ProgressLedger {
    /// Load the record from `store`.
    pub async fn open(store: Arc<dyn ProgressStore>) -> Result<Self> {
        let mut state = store.load().await?;
        state.upgrade();
        Ok(Self { state, store })
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub async fn persist(&self) -> Result<()> {
        self.store.save(&self.state).await
    }

    pub async fn record_folder(
        &mut self,
        folder_key: &str,
        source_path: Option<&str>,
        id: Option<String>,
    ) -> Result<()> {
        self.state.record_folder(folder_key, source_path, id);
        self.persist().await
    }

    pub async fn mark_file_migrated(&mut self, path: &str) -> Result<()> {
        self.state.record_migrated_file(path);
        self.persist().await
    }

    pub async fn skip_file(&mut self, path: &str) -> Result<()> {
        self.state.record_skipped_file(path);
        self.persist().await
    }

    pub async fn skip_folder(&mut self, path: &str) -> Result<()> {
        self.state.record_skipped_folder(path);
        self.persist().await
    }

    pub async fn reset_skipped(&mut self) -> Result<()> {
        self.state.reset_skipped();
        self.persist().await
    }
}

impl std::fmt::Debug for ProgressLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressLedger")
            .field("state", &self.state)
            .field("store", &"ProgressStore { ... }")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skeleton_contains_root() {
        let state = ProgressState::new();
        assert_eq!(state.migrated_folders.get("/"), Some(&None));
        assert_eq!(state.folder_id("/"), Some(None));
        assert!(state.migrated_files.is_empty());
    }

    #[test]
    fn test_file_never_both_migrated_and_skipped() {
        let mut state = ProgressState::new();
        state.record_skipped_file("/a.txt");
        state.record_migrated_file("/a.txt");
        assert!(state.is_file_migrated("/a.txt"));
        assert!(!state.is_file_skipped("/a.txt"));

        state.record_skipped_file("/a.txt");
        assert!(!state.is_file_skipped("/a.txt"));
    }

    #[test]
    fn test_folder_lookup_by_key_or_alias() {
        let mut state = ProgressState::new();
        state.record_folder("/Backups/Photos", Some("/Team/Photos"), Some("f1".to_string()));

        assert_eq!(state.folder_id("/Backups/Photos"), Some(Some("f1")));
        assert_eq!(state.folder_id_for_source("/Team/Photos"), Some(Some("f1")));
        assert_eq!(state.folder_id("/Team/Photos"), None);
        assert_eq!(state.folder_id_for_source("/Team/Other"), None);
        assert!(state.is_folder_settled("/Team/Photos", "/Backups/Photos"));
    }

    #[test]
    fn test_source_path_equal_to_a_key_is_not_settled() {
        let mut state = ProgressState::new();
        // Destination root `Backups` with an unscoped listing
        state.record_folder("/Backups", None, Some("root-id".to_string()));

        assert!(!state.is_folder_settled("/Backups", "/Backups/Backups"));
        assert_eq!(state.folder_id_for_source("/Backups"), None);
        assert!(state.folder_aliases.is_empty());
    }

    #[test]
    fn test_skipped_folder_covers_descendants() {
        let mut state = ProgressState::new();
        state.record_skipped_folder("/Docs");

        assert!(state.is_under_skipped_folder("/Docs/a.txt"));
        assert!(state.is_under_skipped_folder("/Docs/Sub/b.txt"));
        assert!(!state.is_under_skipped_folder("/Docs"));
        assert!(!state.is_under_skipped_folder("/Docsets/c.txt"));
        assert!(!state.is_file_pending("/Docs/a.txt"));
        assert!(state.is_file_pending("/Docsets/c.txt"));
    }

    #[test]
    fn test_reset_skipped() {
        let mut state = ProgressState::new();
        state.record_skipped_file("/a.txt");
        state.record_skipped_folder("/Docs");
        state.reset_skipped();
        assert!(state.is_file_pending("/a.txt"));
        assert!(state.is_file_pending("/Docs/b.txt"));
    }

    #[test]
    fn test_legacy_record_loads_with_defaults() {
        let json = r#"{
            "migrated_files": ["/a.txt"],
            "migrated_folders": {"/": null, "/Photos": "f1"},
            "skipped_folders": []
        }"#;
        let mut state: ProgressState = serde_json::from_str(json).unwrap();
        assert_eq!(state.version, 0);
        state.upgrade();

        assert!(state.is_file_migrated("/a.txt"));
        assert!(state.skipped_files.is_empty());
        assert_eq!(state.version, STATE_VERSION);
        assert_eq!(state.folder_id("/Photos"), Some(Some("f1")));
        assert_eq!(state.folder_id_for_source("/Photos"), Some(Some("f1")));
        assert!(state.is_folder_settled("/Photos", "/Backups/Photos"));
        assert!(!state.folder_aliases.contains_key("/"));
    }

    #[test]
    fn test_current_record_gains_no_identity_aliases() {
        let mut state = ProgressState::new();
        state.record_folder("/Backups", None, Some("root-id".to_string()));

        let json = serde_json::to_string(&state).unwrap();
        let mut loaded: ProgressState = serde_json::from_str(&json).unwrap();
        loaded.upgrade();

        assert_eq!(loaded, state);
        assert!(!loaded.is_folder_settled("/Backups", "/Backups/Backups"));
    }

    #[tokio::test]
    async fn test_json_store_missing_file_yields_skeleton() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileProgressStore::new(dir.path().join("state.json"));
        assert_eq!(store.load().await.unwrap(), ProgressState::new());
    }

    #[tokio::test]
    async fn test_json_store_save_overwrites_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let store = JsonFileProgressStore::new(&path);

        let mut state = ProgressState::new();
        state.record_migrated_file("/a.txt");
        store.save(&state).await.unwrap();

        state.record_migrated_file("/b.txt");
        store.save(&state).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, state);
        assert!(!store.temp_path().exists());

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"migrated_files\""));
        assert!(raw.contains("\"/\": null"));
    }

    #[tokio::test]
    async fn test_json_store_rejects_corrupt_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = JsonFileProgressStore::new(&path).load().await;
        assert!(matches!(result, Err(MigrationError::ProgressStore(_))));
    }

    #[tokio::test]
    async fn test_json_store_restores_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"migrated_folders": {"/Photos": "f1"}}"#).unwrap();

        let state = JsonFileProgressStore::new(&path).load().await.unwrap();
        assert_eq!(state.folder_id("/"), Some(None));
    }

    #[tokio::test]
    async fn test_ledger_persists_every_mutation() {
        let store = Arc::new(MemoryProgressStore::new());
        let mut ledger = ProgressLedger::open(store.clone()).await.unwrap();

        ledger
            .record_folder("/Photos", Some("/Photos"), Some("f1".to_string()))
            .await
            .unwrap();
        ledger.mark_file_migrated("/Photos/img.jpg").await.unwrap();
        ledger.skip_file("/doc.txt").await.unwrap();
        ledger.skip_folder("/Docs").await.unwrap();

        assert_eq!(store.save_count(), 4);
        let saved = store.snapshot().unwrap();
        assert_eq!(&saved, ledger.state());
        assert_eq!(
            saved.folder_aliases.get("/Photos").map(String::as_str),
            Some("/Photos")
        );
    }
}
