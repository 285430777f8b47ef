//! # Core Migration Module
//!
//! Resumable migration of a folder tree from a [`SourceProvider`] to a
//! [`DestinationProvider`].
//!
//! ## Overview
//!
//! This module turns a flat source listing into an ordered, idempotent
//! sequence of folder creations and file transfers:
//! - **Progress Store**: durable record of migrated and skipped work, saved after every mutation
//! - **Backoff Executor**: bounded exponential retry with jitter for transient remote errors
//! - **Path Translator**: source to destination path mapping under optional root remapping
//! - **Folder Replicator**: parent-first folder creation with reuse of existing folders
//! - **Conflict Resolver**: overwrite / rename / skip decisions with a sticky choice per run
//! - **Transfer Pipeline**: staged download and upload, one file at a time, failures isolated
//! - **Planner**: dry-run rendering of every pending transfer
//! - **Coordinator**: the run loop tying the above together
//!
//! Every fatal condition leaves the progress record consistent, so rerunning
//! with the same state file picks up exactly where the last run stopped.
//!
//! [`SourceProvider`]: bridge_traits::SourceProvider
//! [`DestinationProvider`]: bridge_traits::DestinationProvider

pub mod backoff;
pub mod conflict_resolver;
pub mod error;
pub mod folder_replicator;
pub mod orchestrator;
pub mod path_translator;
pub mod planner;
pub mod progress_store;
pub mod transfer;

pub use backoff::{BackoffExecutor, BackoffPolicy, Retryable};
pub use conflict_resolver::{
    ConflictDecision, ConflictPolicy, ConflictResolver, FixedConflictPolicy,
    InteractiveConflictPolicy, PolicyAnswer,
};
pub use error::{MigrationError, Result};
pub use folder_replicator::{FolderReplicator, FolderStats, ReplicationOutcome};
pub use orchestrator::{MigrationCoordinator, MigrationOutcome, MigrationReport, StartOptions};
pub use path_translator::PathTranslator;
pub use planner::{MigrationPlan, PlanEntry, PlanOutcome, PlanPrinter};
pub use progress_store::{
    JsonFileProgressStore, MemoryProgressStore, ProgressLedger, ProgressState, ProgressStore,
    ROOT_KEY, STATE_VERSION,
};
pub use transfer::{sanitize_file_name, BatchEnd, SessionStats, TransferOutcome, TransferPipeline};
