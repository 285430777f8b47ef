//! # Planner
//!
//! Dry-run rendering of where every pending file would land. Never contacts
//! the destination.

use crate::error::{MigrationError, Result};
use crate::path_translator::PathTranslator;
use bridge_traits::{OperatorConsole, RemoteEntry};
use core_runtime::config::ConfirmationMode;

/// One planned transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub source_path: String,
    pub destination_path: String,
    pub size: u64,
}

/// Ordered list of planned transfers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationPlan {
    pub entries: Vec<PlanEntry>,
}

impl MigrationPlan {
    /// Plan `pending` files in listing order.
    pub fn build(translator: &PathTranslator, pending: &[&RemoteEntry]) -> Self {
        let entries = pending
            .iter()
            .map(|file| PlanEntry {
                source_path: file.path().to_string(),
                destination_path: translator.destination_path(file.path()),
                size: file.size(),
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

/// What the dry run printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOutcome {
    /// No pending files
    Empty,
    /// This many plan lines were printed
    Printed(usize),
    /// The operator declined to print a large plan
    Cancelled,
}

/// Prints plans on an operator console.
pub struct PlanPrinter<'a> {
    console: &'a dyn OperatorConsole,
    source_scheme: &'a str,
    destination_scheme: &'a str,
    confirm_threshold: usize,
    large_plan: ConfirmationMode,
}

impl<'a> PlanPrinter<'a> {
    pub fn new(
        console: &'a dyn OperatorConsole,
        source_scheme: &'a str,
        destination_scheme: &'a str,
    ) -> Self {
        Self {
            console,
            source_scheme,
            destination_scheme,
            confirm_threshold: core_runtime::config::DEFAULT_PLAN_CONFIRM_THRESHOLD,
            large_plan: ConfirmationMode::Prompt,
        }
    }

    /// Plans above `threshold` files are confirmed according to `mode`.
    pub fn with_confirmation(mut self, threshold: usize, mode: ConfirmationMode) -> Self {
        self.confirm_threshold = threshold;
        self.large_plan = mode;
        self
    }

    /// Print the summary block and up to `limit` plan lines.
    ///
    /// An explicit `limit` suppresses the large-plan confirmation.
    pub async fn print(
        &self,
        plan: &MigrationPlan,
        translator: &PathTranslator,
        limit: Option<usize>,
    ) -> Result<PlanOutcome> {
        if plan.is_empty() {
            self.console.print("No files to migrate.");
            return Ok(PlanOutcome::Empty);
        }

        self.console.print("--- Migration Plan Summary ---");
        self.console
            .print(&format!("Files to migrate: {}", plan.len()));
        if let Some(src) = translator.src_root() {
            self.console.print(&format!("Source path: {}", src));
        }
        if let Some(dest) = translator.dest_root() {
            self.console.print(&format!("Destination path: {}", dest));
        }
        self.console.print("--------------------------");

        if limit.is_none() && plan.len() > self.confirm_threshold {
            self.console.print(&format!(
                "Warning: This will print a plan for {} files.",
                plan.len()
            ));
            if !self.confirm_large_plan().await? {
                self.console.print("Operation cancelled.");
                return Ok(PlanOutcome::Cancelled);
            }
        }

        let shown = limit.unwrap_or(plan.len()).min(plan.len());
        for entry in plan.entries.iter().take(shown) {
            self.console.print(&format!(
                "{}:{} -> {}:{}",
                self.source_scheme,
                entry.source_path,
                self.destination_scheme,
                entry.destination_path
            ));
        }

        Ok(PlanOutcome::Printed(shown))
    }

    async fn confirm_large_plan(&self) -> Result<bool> {
        match self.large_plan {
            ConfirmationMode::AssumeYes => Ok(true),
            ConfirmationMode::AssumeNo => Ok(false),
            ConfirmationMode::Prompt => {
                let answer = self
                    .console
                    .read_line("Do you want to continue? (y/n): ")
                    .await
                    .map_err(|e| MigrationError::Input(e.to_string()))?;
                Ok(answer.trim().eq_ignore_ascii_case("y"))
            }
        }
    }
}
