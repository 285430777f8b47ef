//! # Migration Configuration Module
//!
//! Provides configuration management for a migration run.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! [`MigrationConfig`] holding every knob the migration core reads: path
//! roots, state and staging locations, retry tuning and the policies that
//! decide whether the operator gets prompted. `build()` normalizes the path
//! roots and fails fast on values that would only surface mid-run.
//!
//! Provider credentials are loaded separately through
//! [`ProviderCredentials::load`], which layers environment variables over an
//! optional INI file.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::{ConflictMode, MigrationConfig};
//!
//! let config = MigrationConfig::builder()
//!     .src_root("/Team/Archive/")
//!     .dest_root("Backups/2024")
//!     .conflict_mode(ConflictMode::Rename)
//!     .build()
//!     .expect("valid configuration");
//!
//! assert_eq!(config.src_root.as_deref(), Some("/Team/Archive"));
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::MigrationConfig;
//!
//! // A source root must be an absolute source path
//! MigrationConfig::builder()
//!     .src_root("relative/path")
//!     .build()
//!     .expect("Should fail - relative source root");
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the durable progress record.
pub const DEFAULT_STATE_FILE: &str = "migration_state.json";

/// Default credentials file read by [`ProviderCredentials::load`].
pub const DEFAULT_CREDENTIALS_FILE: &str = "config.ini";

/// Plans larger than this need confirmation before being printed.
pub const DEFAULT_PLAN_CONFIRM_THRESHOLD: usize = 100;

/// Environment prefix for credential overrides (`MIGRATE_DROPBOX__ACCESS_TOKEN`).
const ENV_PREFIX: &str = "MIGRATE";

/// How a yes/no confirmation is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmationMode {
    /// Ask the operator on the console.
    #[default]
    Prompt,
    /// Proceed without asking.
    AssumeYes,
    /// Decline without asking.
    AssumeNo,
}

/// How name collisions at the destination are settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictMode {
    /// Ask the operator for each conflict, with an option to remember the answer.
    #[default]
    Prompt,
    Overwrite,
    Rename,
    Skip,
}

impl std::str::FromStr for ConflictMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prompt" | "ask" => Ok(ConflictMode::Prompt),
            "overwrite" | "o" => Ok(ConflictMode::Overwrite),
            "rename" | "r" => Ok(ConflictMode::Rename),
            "skip" | "s" => Ok(ConflictMode::Skip),
            other => Err(Error::Config(format!(
                "Unknown conflict mode '{}'. Expected prompt, overwrite, rename or skip.",
                other
            ))),
        }
    }
}

/// Retry tuning for remote operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrySettings {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after every retry
    pub backoff_factor: f64,
    /// Upper bound of the random jitter added to every delay
    pub max_jitter: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_jitter: Duration::from_secs(1),
        }
    }
}

impl RetrySettings {
    /// Settings that never sleep, for tests and dry runs against fakes.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            backoff_factor: 1.0,
            max_jitter: Duration::ZERO,
        }
    }
}

/// Configuration of a migration run.
///
/// Use [`MigrationConfigBuilder`] to construct instances.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Source subtree to migrate, absolute and without trailing slash. `None` migrates everything.
    pub src_root: Option<String>,

    /// Destination folder path that receives the tree, without surrounding slashes.
    pub dest_root: Option<String>,

    /// Location of the JSON progress record
    pub state_file: PathBuf,

    /// Directory for staged downloads
    pub staging_dir: PathBuf,

    /// Provider namespace that scopes source calls (e.g. a Dropbox team space)
    pub source_namespace: Option<String>,

    /// Retry tuning for every remote call
    pub retry: RetrySettings,

    /// Plans above this many files need confirmation before being printed
    pub plan_confirm_threshold: usize,

    /// Answer to the large dry-run plan confirmation
    pub large_plan: ConfirmationMode,

    /// Answer to the confirmation shown before files start transferring
    pub transfer_confirmation: ConfirmationMode,

    /// Conflict handling when a file name already exists at the destination
    pub conflict_mode: ConflictMode,
}

impl MigrationConfig {
    /// Creates a new builder for constructing a `MigrationConfig`.
    pub fn builder() -> MigrationConfigBuilder {
        MigrationConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - State file and staging paths are not empty
    /// - The source root is absolute
    /// - Retry settings can make progress
    pub fn validate(&self) -> Result<()> {
        if self.state_file.as_os_str().is_empty() {
            return Err(Error::Config("State file path cannot be empty".to_string()));
        }

        if self.staging_dir.as_os_str().is_empty() {
            return Err(Error::Config(
                "Staging directory cannot be empty".to_string(),
            ));
        }

        if let Some(root) = &self.src_root {
            if !root.starts_with('/') {
                return Err(Error::Config(format!(
                    "Source root '{}' must be an absolute path such as /Team/Archive",
                    root
                )));
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(Error::Config(
                "Retry max_attempts must be at least 1".to_string(),
            ));
        }

        if !self.retry.backoff_factor.is_finite() || self.retry.backoff_factor < 1.0 {
            return Err(Error::Config(format!(
                "Retry backoff factor must be a finite value >= 1.0, got {}",
                self.retry.backoff_factor
            )));
        }

        Ok(())
    }
}

/// Builder for constructing [`MigrationConfig`] instances.
#[derive(Debug, Default)]
pub struct MigrationConfigBuilder {
    src_root: Option<String>,
    dest_root: Option<String>,
    state_file: Option<PathBuf>,
    staging_dir: Option<PathBuf>,
    source_namespace: Option<String>,
    retry: Option<RetrySettings>,
    plan_confirm_threshold: Option<usize>,
    large_plan: ConfirmationMode,
    transfer_confirmation: Option<ConfirmationMode>,
    conflict_mode: ConflictMode,
}

impl MigrationConfigBuilder {
    /// Sets the source subtree, e.g. `/Team/Archive`.
    pub fn src_root(mut self, root: impl Into<String>) -> Self {
        self.src_root = Some(root.into());
        self
    }

    /// Sets the destination folder path, e.g. `Backups/2024`.
    pub fn dest_root(mut self, root: impl Into<String>) -> Self {
        self.dest_root = Some(root.into());
        self
    }

    pub fn state_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.state_file = Some(path.into());
        self
    }

    pub fn staging_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.staging_dir = Some(path.into());
        self
    }

    pub fn source_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.source_namespace = Some(namespace.into());
        self
    }

    pub fn retry(mut self, retry: RetrySettings) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn plan_confirm_threshold(mut self, threshold: usize) -> Self {
        self.plan_confirm_threshold = Some(threshold);
        self
    }

    pub fn large_plan(mut self, mode: ConfirmationMode) -> Self {
        self.large_plan = mode;
        self
    }

    pub fn transfer_confirmation(mut self, mode: ConfirmationMode) -> Self {
        self.transfer_confirmation = Some(mode);
        self
    }

    pub fn conflict_mode(mut self, mode: ConflictMode) -> Self {
        self.conflict_mode = mode;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when validation fails.
    pub fn build(self) -> Result<MigrationConfig> {
        let config = MigrationConfig {
            src_root: self.src_root.as_deref().and_then(normalize_src_root),
            dest_root: self.dest_root.as_deref().and_then(normalize_dest_root),
            state_file: self
                .state_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE)),
            staging_dir: self
                .staging_dir
                .unwrap_or_else(|| std::env::temp_dir().join("cloud-migrate")),
            source_namespace: self
                .source_namespace
                .map(|ns| ns.trim().to_string())
                .filter(|ns| !ns.is_empty()),
            retry: self.retry.unwrap_or_default(),
            plan_confirm_threshold: self
                .plan_confirm_threshold
                .unwrap_or(DEFAULT_PLAN_CONFIRM_THRESHOLD),
            large_plan: self.large_plan,
            transfer_confirmation: self
                .transfer_confirmation
                .unwrap_or(ConfirmationMode::AssumeYes),
            conflict_mode: self.conflict_mode,
        };

        config.validate()?;

        Ok(config)
    }
}

/// `"/"` and empty roots mean "everything"; a trailing slash is dropped.
fn normalize_src_root(root: &str) -> Option<String> {
    let trimmed = root.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn normalize_dest_root(root: &str) -> Option<String> {
    let trimmed = root.trim().trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================================================
// Provider credentials
// ============================================================================

/// Credentials for the source and destination services.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderCredentials {
    #[serde(default)]
    pub dropbox: DropboxCredentials,
    #[serde(default)]
    pub google: GoogleCredentials,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DropboxCredentials {
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoogleCredentials {
    pub access_token: Option<String>,
}

impl ProviderCredentials {
    /// Load credentials from an INI file overlaid by `MIGRATE_*` environment variables.
    ///
    /// When `path` is `None` the default `config.ini` is read if present. An
    /// explicit path must exist.
    ///
    /// ```ini
    /// [dropbox]
    /// access_token = sl.xxxxx
    ///
    /// [google]
    /// access_token = ya29.xxxxx
    /// ```
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (file, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CREDENTIALS_FILE), false),
        };

        let settings = config::Config::builder()
            .add_source(
                config::File::new(&file.to_string_lossy(), config::FileFormat::Ini)
                    .required(required),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let credentials: ProviderCredentials = settings.try_deserialize()?;
        Ok(credentials.normalized())
    }

    /// Dropbox access token, or a [`Error::CredentialsMissing`] naming where to put it.
    pub fn dropbox_token(&self) -> Result<&str> {
        self.dropbox
            .access_token
            .as_deref()
            .ok_or_else(|| Error::CredentialsMissing {
                provider: "dropbox".to_string(),
                message: "set access_token under [dropbox] in config.ini or \
                          MIGRATE_DROPBOX__ACCESS_TOKEN"
                    .to_string(),
            })
    }

    /// Google Drive access token, or a [`Error::CredentialsMissing`] naming where to put it.
    pub fn google_token(&self) -> Result<&str> {
        self.google
            .access_token
            .as_deref()
            .ok_or_else(|| Error::CredentialsMissing {
                provider: "google".to_string(),
                message: "set access_token under [google] in config.ini or \
                          MIGRATE_GOOGLE__ACCESS_TOKEN"
                    .to_string(),
            })
    }

    fn normalized(mut self) -> Self {
        fn clean(value: &mut Option<String>) {
            if let Some(v) = value.take() {
                let v = v.trim();
                if !v.is_empty() {
                    *value = Some(v.to_string());
                }
            }
        }

        clean(&mut self.dropbox.app_key);
        clean(&mut self.dropbox.app_secret);
        clean(&mut self.dropbox.access_token);
        clean(&mut self.google.access_token);
        self
    }
}
