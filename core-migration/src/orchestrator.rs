//! # Migration Coordinator
//!
//! Drives one migration run from listing to the last transfer.
//!
//! ## Workflow
//!
//! 1. Optionally clear skipped work so it is offered again
//! 2. Resolve (creating if needed) the destination root folder
//! 3. List the full source tree once
//! 4. Replicate folders through the [`FolderReplicator`]
//! 5. Confirm, then transfer pending files through the [`TransferPipeline`]
//!
//! A dry run stops after the listing and prints a plan instead. It never
//! writes the progress record; `retry_skipped` only widens the printed plan.
//!
//! Progress is persisted after every mutation, so any abort (operator quit,
//! cancellation, fatal error) leaves a record that the next run resumes
//! from. Cancelling the token also interrupts pending retry waits, and an
//! error raised after cancellation ends the run as
//! [`MigrationOutcome::Cancelled`]. Events are published on the [`EventBus`] for progress reporting.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_migration::{MigrationCoordinator, StartOptions};
//!
//! let mut coordinator = MigrationCoordinator::new(
//!     config, source, destination, store, console, event_bus,
//! ).await?;
//! let report = coordinator.start(StartOptions::default()).await?;
//! println!("{} files migrated", report.stats.migrated_in_session);
//! ```

use crate::backoff::BackoffExecutor;
use crate::conflict_resolver::ConflictResolver;
use crate::error::{MigrationError, Result};
use crate::folder_replicator::{FolderReplicator, FolderStats, ReplicationOutcome};
use crate::path_translator::PathTranslator;
use crate::planner::{MigrationPlan, PlanOutcome, PlanPrinter};
use crate::progress_store::{ProgressLedger, ProgressState, ProgressStore};
use crate::transfer::{BatchEnd, SessionStats, TransferPipeline};
use bridge_traits::{DestinationProvider, OperatorConsole, RemoteEntry, SourceProvider};
use core_runtime::config::{ConfirmationMode, MigrationConfig};
use core_runtime::events::{CoreEvent, EventBus, MigrationEvent};
use std::borrow::Cow;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Per-run switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// Print the plan instead of migrating
    pub dry_run: bool,
    /// Confirm each folder on the console
    pub interactive: bool,
    /// Stop after this many successful transfers (or plan lines)
    pub limit: Option<usize>,
    /// Offer previously skipped files and folders again
    pub retry_skipped: bool,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Every pending file was processed, or the limit was reached
    Completed,
    DryRun(PlanOutcome),
    /// Nothing was left to migrate
    NothingToDo,
    /// The operator stopped the run
    Aborted(String),
    Cancelled,
}

/// Summary of a run.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub run_id: Uuid,
    pub outcome: MigrationOutcome,
    pub folders: FolderStats,
    pub stats: SessionStats,
}

impl MigrationReport {
    fn new(run_id: Uuid, outcome: MigrationOutcome) -> Self {
        Self {
            run_id,
            outcome,
            folders: FolderStats::default(),
            stats: SessionStats::default(),
        }
    }
}

/// Owns the progress ledger and the per-run conflict state.
pub struct MigrationCoordinator {
    config: MigrationConfig,
    source: Arc<dyn SourceProvider>,
    destination: Arc<dyn DestinationProvider>,
    console: Arc<dyn OperatorConsole>,
    event_bus: Arc<EventBus>,
    ledger: ProgressLedger,
    translator: PathTranslator,
    executor: BackoffExecutor,
    resolver: ConflictResolver,
    cancellation: CancellationToken,
}

impl MigrationCoordinator {
    /// Load progress from `store` and prepare a coordinator.
    ///
    /// A missing progress record starts an empty migration.
    pub async fn new(
        config: MigrationConfig,
        source: Arc<dyn SourceProvider>,
        destination: Arc<dyn DestinationProvider>,
        store: Arc<dyn ProgressStore>,
        console: Arc<dyn OperatorConsole>,
        event_bus: Arc<EventBus>,
    ) -> Result<Self> {
        config.validate()?;

        let ledger = ProgressLedger::open(store).await?;
        let translator =
            PathTranslator::new(config.src_root.as_deref(), config.dest_root.as_deref());
        let cancellation = CancellationToken::new();
        let executor =
            BackoffExecutor::new(config.retry.into()).with_cancellation(cancellation.clone());
        let resolver = ConflictResolver::for_mode(config.conflict_mode, Arc::clone(&console));

        info!(
            migrated_files = ledger.state().migrated_files.len(),
            migrated_folders = ledger.state().migrated_folders.len(),
            "Loaded migration progress"
        );

        Ok(Self {
            config,
            source,
            destination,
            console,
            event_bus,
            ledger,
            translator,
            executor,
            resolver,
            cancellation,
        })
    }

    /// Share `cancellation` with the host, e.g. with its console.
    pub fn with_cancellation_token(mut self, cancellation: CancellationToken) -> Self {
        self.executor = self.executor.with_cancellation(cancellation.clone());
        self.cancellation = cancellation;
        self
    }

    /// Token that stops the run before its next operation when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Current progress record.
    pub fn state(&self) -> &ProgressState {
        self.ledger.state()
    }

    pub fn translator(&self) -> &PathTranslator {
        &self.translator
    }

    /// Run a migration (or a dry run) to completion.
    ///
    /// Operator aborts and cancellation are reported through
    /// [`MigrationOutcome`]; errors are reserved for conditions that need
    /// attention before resuming (authentication, unreachable destination
    /// root, progress persistence).
    #[instrument(skip(self), fields(src = ?self.config.src_root, dest = ?self.config.dest_root))]
    pub async fn start(&mut self, options: StartOptions) -> Result<MigrationReport> {
        let run_id = Uuid::new_v4();
        info!(%run_id, "Starting migration...");
        self.resolver.clear_sticky();

        let dry_run = options.dry_run;
        match self.run(run_id, options).await {
            Err(e) if self.cancellation.is_cancelled() => {
                info!(error = %e, "Migration cancelled");
                if !dry_run {
                    self.ledger.persist().await?;
                }
                Ok(MigrationReport::new(run_id, MigrationOutcome::Cancelled))
            }
            result => result,
        }
    }

    async fn run(&mut self, run_id: Uuid, options: StartOptions) -> Result<MigrationReport> {
        if options.dry_run {
            let entries = self.list_source().await?;
            let outcome = self
                .print_plan(&entries, options.limit, options.retry_skipped)
                .await?;
            return Ok(MigrationReport::new(run_id, MigrationOutcome::DryRun(outcome)));
        }

        if options.retry_skipped {
            info!("Clearing previously skipped files and folders");
            self.ledger.reset_skipped().await?;
        }

        self.resolve_destination_root().await?;

        let entries = self.list_source().await?;
        if entries.is_empty() {
            info!("Source listing is empty");
            self.console.print("No files to migrate.");
            return Ok(MigrationReport::new(run_id, MigrationOutcome::NothingToDo));
        }

        let mut report = MigrationReport::new(run_id, MigrationOutcome::Completed);

        let replication = {
            let replicator = FolderReplicator::new(
                self.destination.as_ref(),
                &self.translator,
                &self.executor,
                &self.event_bus,
            );
            let console = options
                .interactive
                .then(|| self.console.as_ref() as &dyn OperatorConsole);
            replicator
                .replicate(
                    &entries,
                    &mut self.ledger,
                    console,
                    &self.cancellation,
                    &mut report.folders,
                )
                .await
        };

        match replication {
            Ok(ReplicationOutcome::Completed) => {}
            Ok(ReplicationOutcome::Quit) => {
                return Ok(self.abort(report, "Operator quit during folder replication"));
            }
            Ok(ReplicationOutcome::Cancelled) => {
                info!("Migration cancelled during folder replication");
                report.outcome = MigrationOutcome::Cancelled;
                return Ok(report);
            }
            Err(e) => return Err(self.fail(e).await),
        }

        let pending: Vec<&RemoteEntry> = entries
            .iter()
            .filter(|entry| !entry.is_folder())
            .filter(|file| self.ledger.state().is_file_pending(file.path()))
            .collect();

        if pending.is_empty() {
            info!("All files are already migrated or skipped");
            self.console.print("No files to migrate.");
            report.outcome = MigrationOutcome::NothingToDo;
            return Ok(report);
        }

        let total_bytes: u64 = pending.iter().map(|file| file.size()).sum();
        info!(
            files = pending.len(),
            bytes = total_bytes,
            "Files pending migration"
        );

        if !self.confirm_transfer(pending.len(), total_bytes).await? {
            self.ledger.persist().await?;
            return Ok(self.abort(report, "Operator declined to start the transfer"));
        }

        self.emit(MigrationEvent::Started {
            run_id: run_id.to_string(),
            total_files: pending.len() as u64,
            total_bytes,
        });

        let batch = {
            let pipeline = TransferPipeline::new(
                self.source.as_ref(),
                self.destination.as_ref(),
                &self.translator,
                &self.executor,
                &self.event_bus,
                &self.config.staging_dir,
            )
            .with_root_context(self.config.source_namespace.as_deref());
            pipeline
                .run(
                    &pending,
                    &mut self.ledger,
                    &mut self.resolver,
                    options.limit,
                    &self.cancellation,
                    &mut report.stats,
                )
                .await
        };

        let batch = match batch {
            Ok(batch) => batch,
            Err(e) => return Err(self.fail(e).await),
        };

        if batch == BatchEnd::Cancelled {
            self.ledger.persist().await?;
            report.outcome = MigrationOutcome::Cancelled;
            return Ok(report);
        }

        let stats = &report.stats;
        if !stats.failed_files.is_empty() {
            warn!(
                failed = stats.failed_files.len(),
                files = ?stats.failed_files,
                "Some files failed to migrate and will be retried on the next run"
            );
        }

        self.emit(MigrationEvent::Completed {
            migrated: stats.migrated_in_session,
            failed: stats.failed_files.len() as u64,
            skipped: stats.skipped_in_session,
        });
        info!(
            migrated = stats.migrated_in_session,
            skipped = stats.skipped_in_session,
            failed = stats.failed_files.len(),
            "Migration complete."
        );

        Ok(report)
    }

    async fn list_source(&self) -> Result<Vec<RemoteEntry>> {
        let path = self.config.src_root.as_deref().unwrap_or("");
        let namespace = self.config.source_namespace.as_deref();
        let source = self.source.as_ref();

        let entries = self
            .executor
            .execute("list_entries", || source.list_entries(path, true, namespace))
            .await?;

        info!(
            entries = entries.len(),
            files = entries.iter().filter(|e| !e.is_folder()).count(),
            "Listed source tree"
        );
        Ok(entries)
    }

    /// Print the pending work. With `include_skipped`, skips are cleared on a
    /// copy of the record only.
    async fn print_plan(
        &self,
        entries: &[RemoteEntry],
        limit: Option<usize>,
        include_skipped: bool,
    ) -> Result<PlanOutcome> {
        let mut state = Cow::Borrowed(self.ledger.state());
        if include_skipped {
            state.to_mut().reset_skipped();
        }
        let pending: Vec<&RemoteEntry> = entries
            .iter()
            .filter(|entry| !entry.is_folder() && state.is_file_pending(entry.path()))
            .collect();
        let plan = MigrationPlan::build(&self.translator, &pending);

        PlanPrinter::new(
            self.console.as_ref(),
            self.source.scheme(),
            self.destination.scheme(),
        )
        .with_confirmation(self.config.plan_confirm_threshold, self.config.large_plan)
        .print(&plan, &self.translator, limit)
        .await
    }

    /// Map the destination root folder into the progress record.
    async fn resolve_destination_root(&mut self) -> Result<()> {
        let root_key = self.translator.root_key();
        if self.ledger.state().folder_id(&root_key).is_some() && self.translator.dest_root().is_some()
        {
            return Ok(());
        }

        let dest_path = self.translator.dest_root().unwrap_or("").to_string();
        let destination = self.destination.as_ref();
        let folder_id = self
            .executor
            .execute("find_or_create_folder_path", || {
                destination.find_or_create_folder_path(&dest_path)
            })
            .await
            .map_err(|e| {
                if e.is_auth() {
                    MigrationError::Authentication(e.to_string())
                } else {
                    MigrationError::DestinationRoot {
                        path: dest_path.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        // Without a source root the destination root has no source folder
        let source_root = self.translator.src_root().map(str::to_string);
        info!(root = %root_key, folder_id = ?folder_id, "Resolved destination root");
        self.ledger
            .record_folder(&root_key, source_root.as_deref(), folder_id)
            .await
    }

    async fn confirm_transfer(&self, files: usize, bytes: u64) -> Result<bool> {
        match self.config.transfer_confirmation {
            ConfirmationMode::AssumeYes => Ok(true),
            ConfirmationMode::AssumeNo => Ok(false),
            ConfirmationMode::Prompt => {
                self.console
                    .print(&format!("Files to migrate: {} ({} bytes)", files, bytes));
                let answer = self
                    .console
                    .read_line("Proceed with migration? (y/n): ")
                    .await
                    .map_err(|e| MigrationError::Input(e.to_string()))?;
                Ok(answer.trim().eq_ignore_ascii_case("y"))
            }
        }
    }

    fn abort(&self, mut report: MigrationReport, reason: &str) -> MigrationReport {
        info!(reason, "Migration aborted");
        self.emit(MigrationEvent::Aborted {
            reason: reason.to_string(),
        });
        report.outcome = MigrationOutcome::Aborted(reason.to_string());
        report
    }

    /// Persist what is known and surface a fatal error.
    async fn fail(&self, error: MigrationError) -> MigrationError {
        error!(error = %error, "Migration stopped");
        if let Err(persist_error) = self.ledger.persist().await {
            error!(error = %persist_error, "Failed to persist progress after fatal error");
        }
        self.emit(MigrationEvent::Aborted {
            reason: error.to_string(),
        });
        error
    }

    fn emit(&self, event: MigrationEvent) {
        self.event_bus.emit(CoreEvent::Migration(event)).ok();
    }
}

impl std::fmt::Debug for MigrationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationCoordinator")
            .field("translator", &self.translator)
            .field("ledger", &self.ledger)
            .field("resolver", &self.resolver)
            .finish()
    }
}
