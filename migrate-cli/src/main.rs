//! `cloud-migrate`: resumable Dropbox to Google Drive migration.

mod cli;
mod progress;

use anyhow::{Context, Result};
use bridge_desktop::{ReqwestHttpClient, TerminalConsole};
use bridge_traits::{DestinationProvider, HttpClient, OperatorConsole, SourceProvider};
use clap::Parser;
use core_migration::{
    JsonFileProgressStore, MigrationCoordinator, MigrationOutcome, MigrationReport, ProgressStore,
};
use core_runtime::config::ProviderCredentials;
use core_runtime::events::{EventBus, DEFAULT_EVENT_BUFFER_SIZE};
use core_runtime::logging::{init_logging, redact_if_sensitive};
use provider_dropbox::{load_access_token, save_access_token, DropboxConnector, DEFAULT_TOKEN_FILE};
use provider_google_drive::GoogleDriveConnector;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.logging_config()) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(report) => {
            info!(run_id = %report.run_id, outcome = ?report.outcome, "Run finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{:#}", e), "Migration failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<MigrationReport> {
    let config = cli
        .migration_config()
        .context("Invalid migration settings")?;
    let options = cli.start_options();

    let credentials =
        ProviderCredentials::load(cli.config.as_deref()).context("Failed to load credentials")?;
    let dropbox_token = resolve_dropbox_token(&credentials, Path::new(DEFAULT_TOKEN_FILE))?;
    let google_token = credentials
        .google_token()
        .context("Google Drive credentials not found")?
        .to_string();

    debug!(
        dropbox_token = %redact_if_sensitive("dropbox_token", &dropbox_token),
        google_token = %redact_if_sensitive("google_token", &google_token),
        "Loaded provider credentials"
    );

    let http_client: Arc<dyn HttpClient> =
        Arc::new(ReqwestHttpClient::new().context("Failed to build HTTP client")?);
    let source: Arc<dyn SourceProvider> =
        Arc::new(DropboxConnector::new(Arc::clone(&http_client), dropbox_token));
    let destination: Arc<dyn DestinationProvider> =
        Arc::new(GoogleDriveConnector::new(http_client, google_token));
    let store: Arc<dyn ProgressStore> = Arc::new(JsonFileProgressStore::new(&config.state_file));
    // Shared by console prompts and the coordinator
    let cancellation = CancellationToken::new();
    let console: Arc<dyn OperatorConsole> =
        Arc::new(TerminalConsole::with_cancellation(cancellation.clone()));
    let event_bus = Arc::new(EventBus::new(DEFAULT_EVENT_BUFFER_SIZE));

    let progress = progress::spawn_progress_bar(&event_bus);

    let mut coordinator = MigrationCoordinator::new(
        config,
        source,
        destination,
        store,
        Arc::clone(&console),
        Arc::clone(&event_bus),
    )
    .await
    .context("Failed to load migration progress")?
    .with_cancellation_token(cancellation.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current operation");
            cancellation.cancel();
        }
    });

    let result = coordinator.start(options).await;

    // The bar task ends once every sender is gone
    drop(coordinator);
    drop(event_bus);
    if let Err(e) = progress.await {
        debug!(error = %e, "Progress bar task ended abnormally");
    }

    let report = result?;
    summarize(console.as_ref(), &report);
    Ok(report)
}

/// Token from the credentials file or environment, else the cached one.
///
/// A configured token refreshes the cache for later runs.
fn resolve_dropbox_token(credentials: &ProviderCredentials, cache: &Path) -> Result<String> {
    match credentials.dropbox_token() {
        Ok(token) => {
            if let Err(e) = save_access_token(cache, token) {
                warn!(error = %e, path = %cache.display(), "Failed to cache Dropbox token");
            }
            Ok(token.to_string())
        }
        Err(missing) => match load_access_token(cache)? {
            Some(token) => {
                info!(path = %cache.display(), "Using cached Dropbox token");
                Ok(token)
            }
            None => Err(missing).context("Dropbox credentials not found"),
        },
    }
}

fn summarize(console: &dyn OperatorConsole, report: &MigrationReport) {
    match &report.outcome {
        MigrationOutcome::Completed => {
            console.print(&format!(
                "Migrated {} files ({} bytes), skipped {}, failed {}.",
                report.stats.migrated_in_session,
                report.stats.bytes_processed,
                report.stats.skipped_in_session,
                report.stats.failed_files.len()
            ));
            for path in &report.stats.failed_files {
                console.print(&format!("  failed: {}", path));
            }
            if !report.stats.failed_files.is_empty() {
                console.print("Run again to retry the failed files.");
            }
        }
        MigrationOutcome::Aborted(reason) => {
            console.print(&format!("Migration stopped: {}", reason));
        }
        MigrationOutcome::Cancelled => {
            console.print("Migration interrupted. Progress was saved; run again to resume.");
        }
        MigrationOutcome::DryRun(_) | MigrationOutcome::NothingToDo => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_runtime::config::{DropboxCredentials, GoogleCredentials};

    fn credentials(dropbox_token: Option<&str>) -> ProviderCredentials {
        ProviderCredentials {
            dropbox: DropboxCredentials {
                access_token: dropbox_token.map(str::to_string),
                ..Default::default()
            },
            google: GoogleCredentials::default(),
        }
    }

    #[test]
    fn test_configured_token_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join(DEFAULT_TOKEN_FILE);

        let token = resolve_dropbox_token(&credentials(Some("sl.configured")), &cache).unwrap();

        assert_eq!(token, "sl.configured");
        assert_eq!(
            load_access_token(&cache).unwrap(),
            Some("sl.configured".to_string())
        );
    }

    #[test]
    fn test_cached_token_is_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join(DEFAULT_TOKEN_FILE);
        save_access_token(&cache, "sl.cached").unwrap();

        let token = resolve_dropbox_token(&credentials(None), &cache).unwrap();
        assert_eq!(token, "sl.cached");
    }

    #[test]
    fn test_missing_token_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let error = resolve_dropbox_token(&credentials(None), &dir.path().join(DEFAULT_TOKEN_FILE))
            .unwrap_err();

        assert!(error.to_string().contains("Dropbox credentials not found"));
    }
}
