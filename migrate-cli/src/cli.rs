//! Command-line surface of `cloud-migrate`.

use clap::Parser;
use core_migration::StartOptions;
use core_runtime::config::{ConfirmationMode, ConflictMode, MigrationConfig};
use core_runtime::logging::{LogLevel, LoggingConfig};
use std::path::PathBuf;

/// Files transferred by `--test-run`.
pub const TEST_RUN_LIMIT: usize = 10;

#[derive(Parser, Debug)]
#[command(
    name = "cloud-migrate",
    version,
    about = "Migrate files from Dropbox to Google Drive."
)]
pub struct Cli {
    /// The source directory path in Dropbox
    #[arg(long)]
    pub src: Option<String>,

    /// The destination directory path in Google Drive
    #[arg(long)]
    pub dest: Option<String>,

    /// Print the migration plan without changing anything
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Confirm each folder before it is created
    #[arg(long, default_value_t = false, conflicts_with = "test_run")]
    pub interactive: bool,

    /// Migrate only the first 10 pending files
    #[arg(long, default_value_t = false, conflicts_with = "limit")]
    pub test_run: bool,

    /// Stop after this many files have been processed
    #[arg(long)]
    pub limit: Option<usize>,

    /// Answer yes to plan and transfer confirmations
    #[arg(long, short = 'y', default_value_t = false)]
    pub yes: bool,

    /// How to settle files that already exist at the destination
    #[arg(long, value_name = "prompt|overwrite|rename|skip", default_value = "prompt")]
    pub on_conflict: ConflictMode,

    /// Retry files and folders skipped in earlier runs
    #[arg(long, default_value_t = false)]
    pub retry_skipped: bool,

    /// Progress record that makes runs resumable
    #[arg(long, default_value = core_runtime::config::DEFAULT_STATE_FILE)]
    pub state_file: PathBuf,

    /// Credentials file (INI with [dropbox] and [google] sections)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Dropbox namespace id to read from (team spaces)
    #[arg(long)]
    pub namespace: Option<String>,

    /// Directory for staged downloads
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,

    /// Log file; terminal output is kept for prompts and the progress bar
    #[arg(long, default_value = "migration.log")]
    pub log_file: PathBuf,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: LogLevel,
}

impl Cli {
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::default()
            .with_level(self.log_level)
            .with_log_file(&self.log_file)
    }

    /// Build the run configuration from the flags.
    pub fn migration_config(&self) -> core_runtime::Result<MigrationConfig> {
        let mut builder = MigrationConfig::builder()
            .state_file(&self.state_file)
            .conflict_mode(self.on_conflict);

        if let Some(src) = &self.src {
            builder = builder.src_root(src);
        }
        if let Some(dest) = &self.dest {
            builder = builder.dest_root(dest);
        }
        if let Some(namespace) = &self.namespace {
            builder = builder.source_namespace(namespace);
        }
        if let Some(staging_dir) = &self.staging_dir {
            builder = builder.staging_dir(staging_dir);
        }

        builder = if self.yes {
            builder
                .large_plan(ConfirmationMode::AssumeYes)
                .transfer_confirmation(ConfirmationMode::AssumeYes)
        } else if self.interactive {
            builder.transfer_confirmation(ConfirmationMode::Prompt)
        } else {
            builder
        };

        builder.build()
    }

    pub fn start_options(&self) -> StartOptions {
        StartOptions {
            dry_run: self.dry_run,
            interactive: self.interactive,
            limit: if self.test_run {
                Some(TEST_RUN_LIMIT)
            } else {
                self.limit
            },
            retry_skipped: self.retry_skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("cloud-migrate").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        let config = cli.migration_config().unwrap();

        assert_eq!(config.src_root, None);
        assert_eq!(config.dest_root, None);
        assert_eq!(config.state_file, PathBuf::from("migration_state.json"));
        assert_eq!(config.conflict_mode, ConflictMode::Prompt);
        assert_eq!(config.large_plan, ConfirmationMode::Prompt);
        assert_eq!(cli.log_file, PathBuf::from("migration.log"));
        assert_eq!(cli.log_level, LogLevel::Info);

        let options = cli.start_options();
        assert!(!options.dry_run);
        assert!(!options.interactive);
        assert_eq!(options.limit, None);
    }

    #[test]
    fn test_roots_and_namespace() {
        let cli = parse(&[
            "--src",
            "/Team/Archive/",
            "--dest",
            "/Backups/2024/",
            "--namespace",
            "ns-1",
        ]);
        let config = cli.migration_config().unwrap();

        assert_eq!(config.src_root.as_deref(), Some("/Team/Archive"));
        assert_eq!(config.dest_root.as_deref(), Some("Backups/2024"));
        assert_eq!(config.source_namespace.as_deref(), Some("ns-1"));
    }

    #[test]
    fn test_relative_source_root_is_rejected() {
        let cli = parse(&["--src", "Team"]);
        assert!(cli.migration_config().is_err());
    }

    #[test]
    fn test_test_run_limits_to_ten_files() {
        let options = parse(&["--test-run"]).start_options();
        assert_eq!(options.limit, Some(TEST_RUN_LIMIT));
    }

    #[test]
    fn test_interactive_conflicts_with_test_run() {
        let result = Cli::try_parse_from(["cloud-migrate", "--interactive", "--test-run"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_interactive_prompts_before_transfer() {
        let cli = parse(&["--interactive"]);
        let config = cli.migration_config().unwrap();

        assert!(cli.start_options().interactive);
        assert_eq!(config.transfer_confirmation, ConfirmationMode::Prompt);
    }

    #[test]
    fn test_yes_assumes_confirmations() {
        let config = parse(&["--yes", "--interactive"]).migration_config().unwrap();

        assert_eq!(config.large_plan, ConfirmationMode::AssumeYes);
        assert_eq!(config.transfer_confirmation, ConfirmationMode::AssumeYes);
    }

    #[test]
    fn test_conflict_mode_flag() {
        let cli = parse(&["--on-conflict", "rename", "--retry-skipped", "--limit", "3"]);

        assert_eq!(cli.on_conflict, ConflictMode::Rename);
        let options = cli.start_options();
        assert!(options.retry_skipped);
        assert_eq!(options.limit, Some(3));
    }

    #[test]
    fn test_unknown_conflict_mode_is_rejected() {
        assert!(Cli::try_parse_from(["cloud-migrate", "--on-conflict", "merge"]).is_err());
    }
}
