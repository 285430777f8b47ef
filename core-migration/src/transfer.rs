//! # Transfer Pipeline
//!
//! Per-file download, upload and bookkeeping.
//!
//! ## Workflow
//!
//! For every pending file, in listing order:
//! 1. Resolve the destination parent id from the folder mapping
//! 2. Look for a name collision and consult the [`ConflictResolver`]
//! 3. Download into a sanitized staging file
//! 4. Upload under the (possibly renamed) name
//! 5. Record the file as migrated and persist
//!
//! A file that still fails after retries is recorded in the session's
//! failure set and the batch moves on. Authentication failures stop the
//! batch. Byte progress advances for every file whatever its outcome.

use crate::backoff::BackoffExecutor;
use crate::conflict_resolver::{ConflictDecision, ConflictResolver};
use crate::error::{MigrationError, Result};
use crate::path_translator::PathTranslator;
use crate::progress_store::ProgressLedger;
use bridge_traits::{BridgeError, DestinationProvider, RemoteEntry, SourceProvider};
use core_runtime::events::{CoreEvent, EventBus, MigrationEvent};
use core_runtime::logging::strip_path;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Migrated,
    SkippedByPolicy,
    Failed(String),
}

/// Session counters. Not persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub migrated_in_session: u64,
    pub skipped_in_session: u64,
    pub failed_files: BTreeSet<String>,
    pub bytes_processed: u64,
}

/// How the batch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchEnd {
    /// Every pending file was processed
    Exhausted,
    /// The transfer limit was reached
    LimitReached,
    Cancelled,
}

/// Replace characters that are unsafe in a local file name with `_`.
///
/// Covers path separators, characters Windows rejects, quotes and control
/// characters. Names that reduce to dots become `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\'' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        sanitized
    }
}

/// Staged download removed when dropped.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(file = %strip_path(&self.path.to_string_lossy()), "Removed staged file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove staged file"
            ),
        }
    }
}

/// Moves files from the source to the destination.
pub struct TransferPipeline<'a> {
    source: &'a dyn SourceProvider,
    destination: &'a dyn DestinationProvider,
    translator: &'a PathTranslator,
    executor: &'a BackoffExecutor,
    events: &'a EventBus,
    staging_dir: &'a Path,
    root_context: Option<&'a str>,
}

impl<'a> TransferPipeline<'a> {
    pub fn new(
        source: &'a dyn SourceProvider,
        destination: &'a dyn DestinationProvider,
        translator: &'a PathTranslator,
        executor: &'a BackoffExecutor,
        events: &'a EventBus,
        staging_dir: &'a Path,
    ) -> Self {
        Self {
            source,
            destination,
            translator,
            executor,
            events,
            staging_dir,
            root_context: None,
        }
    }

    /// Scope downloads to a provider namespace.
    pub fn with_root_context(mut self, root_context: Option<&'a str>) -> Self {
        self.root_context = root_context;
        self
    }

    /// Process `files` in order until done, `limit` successes, or cancellation.
    ///
    /// Counters accumulate into `stats` so a fatal error still leaves an
    /// accurate account of what happened before it.
    pub async fn run(
        &self,
        files: &[&RemoteEntry],
        ledger: &mut ProgressLedger,
        resolver: &mut ConflictResolver,
        limit: Option<usize>,
        cancel: &CancellationToken,
        stats: &mut SessionStats,
    ) -> Result<BatchEnd> {
        tokio::fs::create_dir_all(self.staging_dir).await?;

        let total_bytes: u64 = files.iter().map(|f| f.size()).sum();

        for file in files {
            if let Some(limit) = limit {
                if stats.migrated_in_session >= limit as u64 {
                    info!("Reached migration limit of {} files.", limit);
                    return Ok(BatchEnd::LimitReached);
                }
            }

            if cancel.is_cancelled() {
                info!("Cancellation requested, stopping before next file");
                return Ok(BatchEnd::Cancelled);
            }

            if !ledger.state().is_file_pending(file.path()) {
                continue;
            }

            match self.transfer_file(file, ledger, resolver).await? {
                TransferOutcome::Migrated => {
                    stats.migrated_in_session += 1;
                    self.emit(MigrationEvent::FileMigrated {
                        path: file.path().to_string(),
                        bytes: file.size(),
                    });
                }
                TransferOutcome::SkippedByPolicy => {
                    stats.skipped_in_session += 1;
                    self.emit(MigrationEvent::FileSkipped {
                        path: file.path().to_string(),
                    });
                }
                TransferOutcome::Failed(reason) => {
                    error!(path = %file.path(), reason = %reason, "File migration failed");
                    stats.failed_files.insert(file.path().to_string());
                    self.emit(MigrationEvent::FileFailed {
                        path: file.path().to_string(),
                        reason,
                    });
                }
            }

            stats.bytes_processed += file.size();
            self.emit(MigrationEvent::Progress {
                bytes_done: stats.bytes_processed,
                total_bytes,
            });
        }

        Ok(BatchEnd::Exhausted)
    }

    /// Transfer one file.
    ///
    /// Errors are reserved for conditions that must stop the batch:
    /// authentication, progress persistence and operator input.
    pub async fn transfer_file(
        &self,
        file: &RemoteEntry,
        ledger: &mut ProgressLedger,
        resolver: &mut ConflictResolver,
    ) -> Result<TransferOutcome> {
        let path = file.path();
        let name = file.name();
        let parent_id = self.translator.resolve_parent_id(ledger.state(), path);

        let existing = match self
            .executor
            .execute("find_by_name", || {
                self.destination.find_by_name(name, parent_id.as_deref())
            })
            .await
        {
            Ok(existing) => existing,
            Err(e) => return failure(e),
        };

        let mut target_name = name.to_string();
        let mut replace_id = None;

        if let Some(collision) = existing.first() {
            match resolver.resolve(name).await? {
                ConflictDecision::Skip => {
                    info!(path = %path, "Skipping file that already exists at destination");
                    ledger.skip_file(path).await?;
                    return Ok(TransferOutcome::SkippedByPolicy);
                }
                ConflictDecision::Rename => {
                    target_name = match resolver
                        .unique_name(
                            self.destination,
                            self.executor,
                            name,
                            parent_id.as_deref(),
                        )
                        .await
                    {
                        Ok(renamed) => renamed,
                        Err(e) => return failure(e),
                    };
                }
                ConflictDecision::Overwrite => {
                    replace_id = Some(collision.id.clone());
                }
            }
        }

        let staged = StagedFile::new(self.staging_dir.join(sanitize_file_name(name)));

        if let Err(e) = self
            .executor
            .execute("download", || {
                self.source
                    .download(path, staged.path(), self.root_context)
            })
            .await
        {
            return failure(e);
        }

        let file_id = match self
            .executor
            .execute("upload", || {
                self.destination.upload(
                    staged.path(),
                    &target_name,
                    parent_id.as_deref(),
                    replace_id.as_deref(),
                )
            })
            .await
        {
            Ok(id) => id,
            Err(e) => return failure(e),
        };

        ledger.mark_file_migrated(path).await?;

        info!(
            path = %path,
            name = %target_name,
            file_id = %file_id,
            bytes = file.size(),
            "Migrated file"
        );

        Ok(TransferOutcome::Migrated)
    }

    fn emit(&self, event: MigrationEvent) {
        self.events.emit(CoreEvent::Migration(event)).ok();
    }
}

/// Per-file failure, unless the error invalidates the whole session.
fn failure(error: BridgeError) -> Result<TransferOutcome> {
    if error.is_auth() {
        return Err(MigrationError::Authentication(error.to_string()));
    }
    Ok(TransferOutcome::Failed(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report.pdf"), "report.pdf");
        assert_eq!(sanitize_file_name("it's done.txt"), "it_s done.txt");
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name("a:b*c?.txt"), "a_b_c_.txt");
        assert_eq!(sanitize_file_name("tab\there"), "tab_here");
        assert_eq!(sanitize_file_name(".."), "_");
        assert_eq!(sanitize_file_name(""), "_");
    }

    #[test]
    fn test_staged_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staged.bin");
        std::fs::write(&path, b"data").unwrap();

        {
            let staged = StagedFile::new(path.clone());
            assert!(staged.path().exists());
        }

        assert!(!path.exists());
    }

    #[test]
    fn test_staged_file_missing_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        drop(StagedFile::new(dir.path().join("never-written")));
    }

    #[test]
    fn test_failure_classification() {
        assert!(matches!(
            failure(BridgeError::Network("reset".to_string())),
            Ok(TransferOutcome::Failed(_))
        ));
        assert!(matches!(
            failure(BridgeError::Unauthorized("expired".to_string())),
            Err(MigrationError::Authentication(_))
        ));
    }
}
