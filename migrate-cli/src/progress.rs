//! Terminal progress bar fed by migration events.

use core_runtime::events::{CoreEvent, EventBus, EventStream, MigrationEvent};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::debug;

const BAR_TEMPLATE: &str =
    "[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {wide_msg}";

/// Render byte progress until the bus closes.
///
/// The bar appears on `Started`, so dry runs and folder prompts stay
/// undisturbed.
pub fn spawn_progress_bar(event_bus: &EventBus) -> JoinHandle<()> {
    let mut events = EventStream::new(event_bus.subscribe());

    tokio::spawn(async move {
        let mut bar: Option<ProgressBar> = None;
        loop {
            match events.recv().await {
                Ok(CoreEvent::Migration(event)) => {
                    if !render(&mut bar, event) {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    debug!(missed, "Progress bar lagged behind migration events");
                }
                Err(RecvError::Closed) => break,
            }
        }

        if let Some(bar) = bar {
            if !bar.is_finished() {
                bar.abandon();
            }
        }
    })
}

/// Apply one event; returns `false` once the run is over.
fn render(bar: &mut Option<ProgressBar>, event: MigrationEvent) -> bool {
    match event {
        MigrationEvent::Started { total_bytes, .. } => {
            let progress = ProgressBar::new(total_bytes);
            if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
                progress.set_style(style.progress_chars("#>-"));
            }
            *bar = Some(progress);
        }
        MigrationEvent::Progress { bytes_done, .. } => {
            if let Some(bar) = bar {
                bar.set_position(bytes_done);
            }
        }
        MigrationEvent::FileMigrated { path, .. } => {
            if let Some(bar) = bar {
                bar.set_message(path);
            }
        }
        MigrationEvent::FileFailed { path, .. } => {
            if let Some(bar) = bar {
                bar.println(format!("Failed: {}", path));
            }
        }
        MigrationEvent::Completed {
            migrated,
            failed,
            skipped,
        } => {
            if let Some(bar) = bar {
                bar.finish_with_message(format!(
                    "{} migrated, {} skipped, {} failed",
                    migrated, skipped, failed
                ));
            }
            return false;
        }
        MigrationEvent::Aborted { reason } => {
            if let Some(bar) = bar {
                bar.abandon_with_message(reason);
            }
            return false;
        }
        _ => {}
    }
    true
}
