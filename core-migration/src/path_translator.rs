//! Source path to destination path mapping under optional root remapping.

use crate::progress_store::{ProgressState, ROOT_KEY};

/// Maps absolute source paths to destination-relative paths and folder keys.
///
/// With `src_root = /Team/Archive` and `dest_root = Backups`, the source
/// file `/Team/Archive/2023/report.pdf` lands at `Backups/2023/report.pdf`
/// and its parent folder key is `/Backups/2023`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathTranslator {
    src_root: Option<String>,
    dest_root: Option<String>,
}

impl PathTranslator {
    pub fn new(src_root: Option<&str>, dest_root: Option<&str>) -> Self {
        let src_root = src_root
            .map(|root| root.trim_end_matches('/'))
            .filter(|root| !root.is_empty())
            .map(str::to_string);
        let dest_root = dest_root
            .map(|root| root.trim_matches('/'))
            .filter(|root| !root.is_empty())
            .map(str::to_string);

        Self {
            src_root,
            dest_root,
        }
    }

    pub fn src_root(&self) -> Option<&str> {
        self.src_root.as_deref()
    }

    pub fn dest_root(&self) -> Option<&str> {
        self.dest_root.as_deref()
    }

    /// `path` relative to the source root, without a leading separator.
    ///
    /// The source root itself maps to the empty string. Dropbox paths are
    /// case-insensitive, so `/team` scopes `/Team/...` too.
    pub fn relative_path<'p>(&self, path: &'p str) -> &'p str {
        if let Some(rest) = self
            .src_root
            .as_deref()
            .and_then(|root| strip_root(path, root))
        {
            return rest.strip_prefix('/').unwrap_or(rest);
        }
        path.trim_start_matches('/')
    }

    /// Destination path of a source entry, prefixed with the destination root.
    pub fn destination_path(&self, path: &str) -> String {
        let relative = self.relative_path(path);
        match (&self.dest_root, relative.is_empty()) {
            (Some(dest), true) => dest.clone(),
            (Some(dest), false) => format!("{}/{}", dest, relative),
            (None, _) => relative.to_string(),
        }
    }

    /// Key of the folder that receives the migrated tree.
    pub fn root_key(&self) -> String {
        match &self.dest_root {
            Some(dest) => format!("/{}", dest),
            None => ROOT_KEY.to_string(),
        }
    }

    /// Normalized folder key of a source folder.
    pub fn folder_key(&self, path: &str) -> String {
        format!("/{}", self.destination_path(path))
    }

    /// Folder key of the parent of a source entry.
    ///
    /// Direct children of the source root resolve to [`root_key`](Self::root_key).
    pub fn parent_key(&self, path: &str) -> String {
        let parent = parent_path(path);

        match &self.src_root {
            Some(root) if strip_root(parent, root) == Some("") => self.root_key(),
            _ if parent == "/" => self.root_key(),
            _ => self.folder_key(parent),
        }
    }

    /// Destination id of the parent folder of `path`.
    ///
    /// Looks up the parent key first, then the parent's source path in the
    /// alias table. When nothing is recorded, falls back to the destination
    /// root mapping.
    pub fn resolve_parent_id(&self, state: &ProgressState, path: &str) -> Option<String> {
        let key = self.parent_key(path);
        if let Some(id) = state
            .folder_id(&key)
            .or_else(|| state.folder_id_for_source(parent_path(path)))
        {
            return id.map(str::to_string);
        }

        state
            .folder_id(&self.root_key())
            .flatten()
            .map(str::to_string)
    }
}

/// Parent of an absolute path; `/` for top-level entries.
pub fn parent_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &trimmed[..idx],
    }
}

/// Number of separators, used to order folders parent-first.
pub fn depth(path: &str) -> usize {
    path.trim_end_matches('/').matches('/').count()
}

/// Remainder of `path` after the source root `root`, compared without case.
///
/// The remainder is empty or starts with `/`; `None` when `path` is outside
/// `root`.
fn strip_root<'p>(path: &'p str, root: &str) -> Option<&'p str> {
    let head = path.get(..root.len())?;
    let rest = &path[root.len()..];
    let same = head == root || head.to_lowercase() == root.to_lowercase();
    (same && (rest.is_empty() || rest.starts_with('/'))).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_path_without_roots() {
        let translator = PathTranslator::new(None, None);
        assert_eq!(translator.destination_path("/doc.txt"), "doc.txt");
        assert_eq!(translator.destination_path("/Photos/img.jpg"), "Photos/img.jpg");
        assert_eq!(translator.folder_key("/Photos"), "/Photos");
        assert_eq!(translator.root_key(), "/");
    }

    #[test]
    fn test_destination_path_with_roots() {
        let translator = PathTranslator::new(Some("/Team/Archive"), Some("Backups/2024"));
        assert_eq!(
            translator.destination_path("/Team/Archive/2023/report.pdf"),
            "Backups/2024/2023/report.pdf"
        );
        assert_eq!(translator.destination_path("/Team/Archive"), "Backups/2024");
        assert_eq!(translator.folder_key("/Team/Archive/2023"), "/Backups/2024/2023");
        assert_eq!(translator.root_key(), "/Backups/2024");
    }

    #[test]
    fn test_src_root_only() {
        let translator = PathTranslator::new(Some("/Team/"), None);
        assert_eq!(translator.destination_path("/Team/a/b.txt"), "a/b.txt");
        assert_eq!(translator.parent_key("/Team/b.txt"), "/");
        assert_eq!(translator.parent_key("/Team/a/b.txt"), "/a");
    }

    #[test]
    fn test_src_root_is_not_a_string_prefix_match() {
        let translator = PathTranslator::new(Some("/Team"), None);
        assert_eq!(translator.relative_path("/Teammates/x.txt"), "Teammates/x.txt");
    }

    #[test]
    fn test_src_root_matches_without_case() {
        let translator = PathTranslator::new(Some("/team/archive"), Some("Backups"));
        assert_eq!(
            translator.destination_path("/Team/Archive/2023/report.pdf"),
            "Backups/2023/report.pdf"
        );
        assert_eq!(translator.destination_path("/TEAM/ARCHIVE"), "Backups");
        assert_eq!(translator.parent_key("/Team/Archive/report.pdf"), "/Backups");
        assert_eq!(
            translator.parent_key("/Team/Archive/2023/report.pdf"),
            "/Backups/2023"
        );
        assert_eq!(
            translator.relative_path("/Team/Archived/x.txt"),
            "Team/Archived/x.txt"
        );
    }

    #[test]
    fn test_src_root_with_non_ascii_case() {
        let translator = PathTranslator::new(Some("/\u{c9}quipe"), None);
        assert_eq!(translator.destination_path("/\u{e9}quipe/a.txt"), "a.txt");
        assert_eq!(translator.parent_key("/\u{e9}quipe/a.txt"), "/");
    }

    #[test]
    fn test_parent_key_direct_child_of_src_root() {
        let translator = PathTranslator::new(Some("/Team/Archive"), Some("Backups"));
        assert_eq!(translator.parent_key("/Team/Archive/report.pdf"), "/Backups");
        assert_eq!(
            translator.parent_key("/Team/Archive/2023/report.pdf"),
            "/Backups/2023"
        );
    }

    #[test]
    fn test_parent_key_top_level_without_src_root() {
        let translator = PathTranslator::new(None, Some("Backups"));
        assert_eq!(translator.parent_key("/doc.txt"), "/Backups");
        assert_eq!(translator.parent_key("/Photos/img.jpg"), "/Backups/Photos");
    }

    #[test]
    fn test_parent_outside_src_root_resolves_through_alias() {
        let translator = PathTranslator::new(Some("/Team"), Some("Backups"));
        let mut state = ProgressState::new();
        state.record_folder("/Backups", Some("/Team"), Some("root-id".to_string()));
        state.record_folder("/Backups/Shared", Some("/Other"), Some("shared-id".to_string()));

        assert_eq!(translator.parent_key("/Other/x.txt"), "/Backups/Other");
        assert_eq!(
            translator.resolve_parent_id(&state, "/Other/x.txt"),
            Some("shared-id".to_string())
        );
    }

    #[test]
    fn test_resolve_parent_id_fallbacks() {
        let translator = PathTranslator::new(None, Some("Backups"));
        let mut state = ProgressState::new();
        state.record_folder("/Backups", None, Some("root-id".to_string()));
        state.record_folder("/Backups/Photos", Some("/Photos"), Some("photos-id".to_string()));

        assert_eq!(
            translator.resolve_parent_id(&state, "/Photos/img.jpg"),
            Some("photos-id".to_string())
        );
        assert_eq!(
            translator.resolve_parent_id(&state, "/doc.txt"),
            Some("root-id".to_string())
        );
        // Unknown parent falls back to the destination root
        assert_eq!(
            translator.resolve_parent_id(&state, "/Unknown/x.txt"),
            Some("root-id".to_string())
        );
    }

    #[test]
    fn test_resolve_parent_id_root_is_none() {
        let translator = PathTranslator::new(None, None);
        let state = ProgressState::new();
        assert_eq!(translator.resolve_parent_id(&state, "/doc.txt"), None);
    }

    #[test]
    fn test_parent_path_and_depth() {
        assert_eq!(parent_path("/a/b/c.txt"), "/a/b");
        assert_eq!(parent_path("/a"), "/");
        assert_eq!(depth("/a"), 1);
        assert_eq!(depth("/a/b/c"), 3);
    }
}
