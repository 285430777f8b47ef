//! # Folder Replicator
//!
//! Builds the destination folder tree before any file moves.
//!
//! Folders are processed shallowest first (stable on listing order), so a
//! parent is always recorded before its children look it up. Existing
//! destination folders with the same name under the same parent are reused
//! rather than duplicated. In interactive mode the operator confirms each
//! folder and may skip it (with everything below it) or quit the run.

use crate::backoff::BackoffExecutor;
use crate::error::{MigrationError, Result};
use crate::path_translator::{depth, parent_path, PathTranslator};
use crate::progress_store::ProgressLedger;
use bridge_traits::{DestinationProvider, OperatorConsole, RemoteEntry};
use core_runtime::events::{CoreEvent, EventBus, MigrationEvent};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

const FOLDER_PROMPT: &str =
    "Press Enter to continue, 's' to skip this folder, or 'esc' to quit: ";

/// Folder counters for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderStats {
    pub created: u64,
    pub reused: u64,
    pub skipped: u64,
}

/// How replication ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationOutcome {
    Completed,
    /// The operator asked to stop the run
    Quit,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FolderChoice {
    Continue,
    Skip,
    Quit,
}

/// Replicates source folders at the destination.
pub struct FolderReplicator<'a> {
    destination: &'a dyn DestinationProvider,
    translator: &'a PathTranslator,
    executor: &'a BackoffExecutor,
    events: &'a EventBus,
}

impl<'a> FolderReplicator<'a> {
    pub fn new(
        destination: &'a dyn DestinationProvider,
        translator: &'a PathTranslator,
        executor: &'a BackoffExecutor,
        events: &'a EventBus,
    ) -> Self {
        Self {
            destination,
            translator,
            executor,
            events,
        }
    }

    /// Replicate every folder in `entries` not yet migrated or skipped.
    ///
    /// `console` enables per-folder confirmation. Remote errors that survive
    /// the retry policy stop replication and propagate.
    #[instrument(skip_all, fields(entries = entries.len()))]
    pub async fn replicate(
        &self,
        entries: &[RemoteEntry],
        ledger: &mut ProgressLedger,
        console: Option<&dyn OperatorConsole>,
        cancel: &CancellationToken,
        stats: &mut FolderStats,
    ) -> Result<ReplicationOutcome> {
        let mut folders: Vec<&RemoteEntry> = entries.iter().filter(|e| e.is_folder()).collect();
        folders.sort_by_key(|folder| depth(folder.path()));

        for folder in folders {
            if cancel.is_cancelled() {
                ledger.persist().await?;
                return Ok(ReplicationOutcome::Cancelled);
            }

            let path = folder.path();
            let key = self.translator.folder_key(path);
            if ledger.state().is_folder_settled(path, &key) {
                continue;
            }

            if let Some(console) = console {
                match confirm_folder(console, folder, entries).await? {
                    FolderChoice::Continue => {}
                    FolderChoice::Skip => {
                        info!(path = %path, "Skipping folder");
                        ledger.skip_folder(path).await?;
                        stats.skipped += 1;
                        self.emit(MigrationEvent::FolderSkipped {
                            path: path.to_string(),
                        });
                        continue;
                    }
                    FolderChoice::Quit => {
                        info!("Quitting migration.");
                        ledger.persist().await?;
                        return Ok(ReplicationOutcome::Quit);
                    }
                }
            }

            let parent_id = self.translator.resolve_parent_id(ledger.state(), path);
            let name = folder.name();

            let existing = self
                .executor
                .execute("find_by_name", || {
                    self.destination.find_by_name(name, parent_id.as_deref())
                })
                .await?;

            let folder_id = match existing.into_iter().next() {
                Some(item) => {
                    info!(path = %path, folder_id = %item.id, "Folder '{}' already exists. Using existing folder.", name);
                    stats.reused += 1;
                    self.emit(MigrationEvent::FolderReused {
                        path: path.to_string(),
                        folder_id: item.id.clone(),
                    });
                    item.id
                }
                None => {
                    let id = self
                        .executor
                        .execute("create_folder", || {
                            self.destination.create_folder(name, parent_id.as_deref())
                        })
                        .await?;
                    info!(path = %path, folder_id = %id, "Created folder");
                    stats.created += 1;
                    self.emit(MigrationEvent::FolderCreated {
                        path: path.to_string(),
                        folder_id: id.clone(),
                    });
                    id
                }
            };

            ledger.record_folder(&key, Some(path), Some(folder_id)).await?;
        }

        Ok(ReplicationOutcome::Completed)
    }

    fn emit(&self, event: MigrationEvent) {
        self.events.emit(CoreEvent::Migration(event)).ok();
    }
}

/// Show the folder and its direct files, then ask until a valid answer arrives.
async fn confirm_folder(
    console: &dyn OperatorConsole,
    folder: &RemoteEntry,
    entries: &[RemoteEntry],
) -> Result<FolderChoice> {
    let files: Vec<&str> = entries
        .iter()
        .filter(|e| !e.is_folder() && parent_path(e.path()) == folder.path())
        .map(|e| e.name())
        .collect();

    console.print("");
    console.print(&format!("Folder: {}", folder.path()));
    if files.is_empty() {
        console.print("This folder is empty.");
    } else {
        console.print("Files to be migrated in this folder:");
        for name in files {
            console.print(&format!("- {}", name));
        }
    }

    loop {
        let answer = console
            .read_line(FOLDER_PROMPT)
            .await
            .map_err(|e| MigrationError::Input(e.to_string()))?;

        match answer.trim().to_lowercase().as_str() {
            "" => return Ok(FolderChoice::Continue),
            "s" | "skip" => return Ok(FolderChoice::Skip),
            "esc" | "q" | "quit" | "\u{1b}" => return Ok(FolderChoice::Quit),
            other => {
                warn!(answer = other, "Invalid folder choice");
                console.print("Invalid choice. Press Enter, 's' or 'esc'.");
            }
        }
    }
}
