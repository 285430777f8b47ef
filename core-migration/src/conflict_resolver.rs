//! # Conflict Resolver
//!
//! Decides what happens when a file's target name already exists under its
//! destination parent.
//!
//! ## Decision procedure
//!
//! 1. A sticky decision from an earlier conflict in this run is applied
//!    without asking.
//! 2. Otherwise the [`ConflictPolicy`] is consulted. The interactive policy
//!    prompts the operator and offers to remember the answer; a fixed policy
//!    always answers the same way.
//!
//! `Rename` derives `name (n).ext`, incrementing `n` until the destination
//! reports no collision. `Overwrite` keeps the name and hands the colliding
//! object's id to the upload so it is replaced in place.

use crate::backoff::BackoffExecutor;
use crate::error::{MigrationError, Result};
use async_trait::async_trait;
use bridge_traits::{BridgeError, DestinationProvider, OperatorConsole};
use core_runtime::config::ConflictMode;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a name collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictDecision {
    Overwrite,
    Rename,
    Skip,
}

impl ConflictDecision {
    /// Fixed decision for a non-interactive conflict mode.
    pub fn from_mode(mode: ConflictMode) -> Option<Self> {
        match mode {
            ConflictMode::Prompt => None,
            ConflictMode::Overwrite => Some(ConflictDecision::Overwrite),
            ConflictMode::Rename => Some(ConflictDecision::Rename),
            ConflictMode::Skip => Some(ConflictDecision::Skip),
        }
    }
}

/// Answer of a [`ConflictPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyAnswer {
    pub decision: ConflictDecision,
    /// Apply this decision to every later conflict in the run.
    pub remember: bool,
}

/// Source of conflict decisions.
#[async_trait]
pub trait ConflictPolicy: Send + Sync {
    async fn decide(&self, file_name: &str) -> Result<PolicyAnswer>;
}

/// Asks the operator on the console.
pub struct InteractiveConflictPolicy {
    console: Arc<dyn OperatorConsole>,
}

impl InteractiveConflictPolicy {
    pub fn new(console: Arc<dyn OperatorConsole>) -> Self {
        Self { console }
    }

    async fn ask(&self, prompt: &str) -> Result<String> {
        self.console
            .read_line(prompt)
            .await
            .map(|answer| answer.trim().to_lowercase())
            .map_err(|e| MigrationError::Input(e.to_string()))
    }
}

#[async_trait]
impl ConflictPolicy for InteractiveConflictPolicy {
    async fn decide(&self, file_name: &str) -> Result<PolicyAnswer> {
        let prompt = format!(
            "File '{}' already exists. Overwrite, rename, or skip? (o/r/s): ",
            file_name
        );

        let decision = loop {
            match self.ask(&prompt).await?.as_str() {
                "o" | "overwrite" => break ConflictDecision::Overwrite,
                "r" | "rename" => break ConflictDecision::Rename,
                "s" | "skip" => break ConflictDecision::Skip,
                other => {
                    warn!(answer = other, "Invalid conflict choice");
                    self.console
                        .print("Invalid choice. Please enter 'o', 'r', or 's'.");
                }
            }
        };

        let remember = loop {
            match self
                .ask("Apply this choice to all remaining conflicts? (y/n): ")
                .await?
                .as_str()
            {
                "y" | "yes" => break true,
                "n" | "no" | "" => break false,
                _ => self.console.print("Please enter 'y' or 'n'."),
            }
        };

        Ok(PolicyAnswer { decision, remember })
    }
}

/// Always answers with the same decision.
#[derive(Debug, Clone, Copy)]
pub struct FixedConflictPolicy(pub ConflictDecision);

#[async_trait]
impl ConflictPolicy for FixedConflictPolicy {
    async fn decide(&self, _file_name: &str) -> Result<PolicyAnswer> {
        Ok(PolicyAnswer {
            decision: self.0,
            remember: true,
        })
    }
}

/// Per-run conflict resolution with a sticky decision.
pub struct ConflictResolver {
    policy: Arc<dyn ConflictPolicy>,
    sticky: Option<ConflictDecision>,
}

impl ConflictResolver {
    pub fn new(policy: Arc<dyn ConflictPolicy>) -> Self {
        Self {
            policy,
            sticky: None,
        }
    }

    /// Resolver for a configured conflict mode; `Prompt` asks on `console`.
    pub fn for_mode(mode: ConflictMode, console: Arc<dyn OperatorConsole>) -> Self {
        let policy: Arc<dyn ConflictPolicy> = match ConflictDecision::from_mode(mode) {
            Some(decision) => Arc::new(FixedConflictPolicy(decision)),
            None => Arc::new(InteractiveConflictPolicy::new(console)),
        };
        Self::new(policy)
    }

    pub fn sticky(&self) -> Option<ConflictDecision> {
        self.sticky
    }

    /// Forget the remembered decision, e.g. at the start of a new run.
    pub fn clear_sticky(&mut self) {
        self.sticky = None;
    }

    pub async fn resolve(&mut self, file_name: &str) -> Result<ConflictDecision> {
        if let Some(decision) = self.sticky {
            debug!(file = file_name, ?decision, "Applying remembered conflict decision");
            return Ok(decision);
        }

        let answer = self.policy.decide(file_name).await?;
        if answer.remember {
            self.sticky = Some(answer.decision);
        }

        info!(file = file_name, decision = ?answer.decision, "Resolved name conflict");
        Ok(answer.decision)
    }

    /// First `name (n).ext` with no collision under `parent_id`.
    pub async fn unique_name(
        &self,
        destination: &dyn DestinationProvider,
        executor: &BackoffExecutor,
        name: &str,
        parent_id: Option<&str>,
    ) -> std::result::Result<String, BridgeError> {
        let mut n = 1u32;
        loop {
            let candidate = numbered_name(name, n);
            let existing = executor
                .execute("find_by_name", || {
                    destination.find_by_name(&candidate, parent_id)
                })
                .await?;

            if existing.is_empty() {
                debug!(original = name, renamed = %candidate, "Derived unique name");
                return Ok(candidate);
            }
            n += 1;
        }
    }
}

impl std::fmt::Debug for ConflictResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConflictResolver")
            .field("sticky", &self.sticky)
            .finish()
    }
}

/// Split `name` into stem and extension; leading dots never start an extension.
///
/// `report.tar.gz` splits into `report.tar` and `.gz`, `.bashrc` has no extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    let leading_dots = name.len() - name.trim_start_matches('.').len();
    match name[leading_dots..].rfind('.') {
        Some(idx) => name.split_at(leading_dots + idx),
        None => (name, ""),
    }
}

/// `doc.txt` with `n = 2` becomes `doc (2).txt`.
pub fn numbered_name(name: &str, n: u32) -> String {
    let (stem, extension) = split_extension(name);
    format!("{} ({}){}", stem, n, extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::DestinationItem;
    use core_runtime::config::RetrySettings;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Mutex;

    struct ScriptedConsole {
        answers: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
        printed: Mutex<Vec<String>>,
    }

    impl ScriptedConsole {
        fn new(answers: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
                printed: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl OperatorConsole for ScriptedConsole {
        async fn read_line(&self, prompt: &str) -> bridge_traits::error::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| BridgeError::NotAvailable("no more answers".to_string()))
        }

        fn print(&self, line: &str) {
            self.printed.lock().unwrap().push(line.to_string());
        }
    }

    /// Destination where `taken` names already exist under every parent.
    struct TakenNames {
        taken: Vec<&'static str>,
    }

    #[async_trait]
    impl DestinationProvider for TakenNames {
        fn scheme(&self) -> &str {
            "test"
        }

        async fn find_by_name(
            &self,
            name: &str,
            _parent_id: Option<&str>,
        ) -> bridge_traits::error::Result<Vec<DestinationItem>> {
            Ok(self
                .taken
                .iter()
                .filter(|taken| **taken == name)
                .map(|taken| DestinationItem {
                    id: format!("id-{}", taken),
                    name: taken.to_string(),
                })
                .collect())
        }

        async fn create_folder(
            &self,
            _name: &str,
            _parent_id: Option<&str>,
        ) -> bridge_traits::error::Result<String> {
            unreachable!()
        }

        async fn upload(
            &self,
            _local_path: &Path,
            _name: &str,
            _parent_id: Option<&str>,
            _replace_id: Option<&str>,
        ) -> bridge_traits::error::Result<String> {
            unreachable!()
        }
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("doc.txt"), ("doc", ".txt"));
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_extension("README"), ("README", ""));
        assert_eq!(split_extension(".bashrc"), (".bashrc", ""));
        assert_eq!(split_extension("..hidden.cfg"), ("..hidden", ".cfg"));
    }

    #[test]
    fn test_numbered_name() {
        assert_eq!(numbered_name("doc.txt", 1), "doc (1).txt");
        assert_eq!(numbered_name("Makefile", 3), "Makefile (3)");
    }

    #[tokio::test]
    async fn test_invalid_input_reprompts() {
        let console = ScriptedConsole::new(&["x", "R", "n"]);
        let policy = InteractiveConflictPolicy::new(console.clone());

        let answer = policy.decide("doc.txt").await.unwrap();

        assert_eq!(answer.decision, ConflictDecision::Rename);
        assert!(!answer.remember);
        assert_eq!(console.prompts.lock().unwrap().len(), 3);
        assert_eq!(
            console.printed.lock().unwrap().as_slice(),
            ["Invalid choice. Please enter 'o', 'r', or 's'."]
        );
    }

    #[tokio::test]
    async fn test_sticky_decision_stops_prompting() {
        let console = ScriptedConsole::new(&["s", "y"]);
        let mut resolver =
            ConflictResolver::new(Arc::new(InteractiveConflictPolicy::new(console.clone())));

        assert_eq!(resolver.resolve("a.txt").await.unwrap(), ConflictDecision::Skip);
        assert_eq!(resolver.resolve("b.txt").await.unwrap(), ConflictDecision::Skip);
        assert_eq!(resolver.resolve("c.txt").await.unwrap(), ConflictDecision::Skip);

        assert_eq!(resolver.sticky(), Some(ConflictDecision::Skip));
        assert_eq!(console.prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_non_sticky_decision_prompts_again() {
        let console = ScriptedConsole::new(&["o", "n", "r", "n"]);
        let mut resolver =
            ConflictResolver::new(Arc::new(InteractiveConflictPolicy::new(console.clone())));

        assert_eq!(
            resolver.resolve("a.txt").await.unwrap(),
            ConflictDecision::Overwrite
        );
        assert_eq!(resolver.resolve("b.txt").await.unwrap(), ConflictDecision::Rename);
        assert_eq!(resolver.sticky(), None);
    }

    #[tokio::test]
    async fn test_closed_console_is_input_error() {
        let console = ScriptedConsole::new(&[]);
        let mut resolver = ConflictResolver::for_mode(ConflictMode::Prompt, console);
        assert!(matches!(
            resolver.resolve("a.txt").await,
            Err(MigrationError::Input(_))
        ));
    }

    #[tokio::test]
    async fn test_fixed_mode_never_prompts() {
        let console = ScriptedConsole::new(&[]);
        let mut resolver = ConflictResolver::for_mode(ConflictMode::Rename, console.clone());

        assert_eq!(resolver.resolve("a.txt").await.unwrap(), ConflictDecision::Rename);
        assert!(console.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unique_name_skips_taken_candidates() {
        let destination = TakenNames {
            taken: vec!["doc.txt", "doc (1).txt"],
        };
        let executor = BackoffExecutor::new(RetrySettings::immediate(1).into());
        let resolver = ConflictResolver::new(Arc::new(FixedConflictPolicy(
            ConflictDecision::Rename,
        )));

        let name = resolver
            .unique_name(&destination, &executor, "doc.txt", None)
            .await
            .unwrap();
        assert_eq!(name, "doc (2).txt");
    }
}
