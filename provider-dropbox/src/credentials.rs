//! Cached Dropbox access token.
//!
//! The token is stored as `{"access_token": "..."}` so an authorized
//! session can be reused across runs.

use crate::error::{DropboxError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Default token cache next to the working directory.
pub const DEFAULT_TOKEN_FILE: &str = "dropbox_credentials.json";

#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    access_token: Option<String>,
}

/// Read the cached token. A missing file or blank token yields `None`.
pub fn load_access_token(path: &Path) -> Result<Option<String>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No cached Dropbox token");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let stored: StoredToken = serde_json::from_str(&content)
        .map_err(|e| DropboxError::ParseError(format!("Invalid token file: {}", e)))?;

    Ok(stored
        .access_token
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty()))
}

/// Write `token` to the cache, replacing any previous one.
pub fn save_access_token(path: &Path, token: &str) -> Result<()> {
    let body = serde_json::to_string(&StoredToken {
        access_token: Some(token.to_string()),
    })
    .map_err(|e| DropboxError::ParseError(e.to_string()))?;

    std::fs::write(path, body)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_TOKEN_FILE);

        save_access_token(&path, "sl.abc").unwrap();

        assert_eq!(load_access_token(&path).unwrap(), Some("sl.abc".to_string()));
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, r#"{"access_token":"sl.abc"}"#);
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_access_token(&dir.path().join("absent.json")).unwrap(), None);
    }

    #[test]
    fn test_blank_token_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, r#"{"access_token": "  "}"#).unwrap();

        assert_eq!(load_access_token(&path).unwrap(), None);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            load_access_token(&path),
            Err(DropboxError::ParseError(_))
        ));
    }
}
