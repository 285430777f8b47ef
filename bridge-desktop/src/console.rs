//! Operator console backed by the process's standard streams

use async_trait::async_trait;
use bridge_traits::{
    console::OperatorConsole,
    error::{BridgeError, Result},
};
use std::io::BufRead;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::warn;

type InputLines = mpsc::UnboundedReceiver<std::io::Result<String>>;

/// Terminal console reading answers from stdin.
///
/// Prompts are written to stdout without a trailing newline and flushed
/// before waiting for input. Stdin is read on a dedicated thread, so a
/// pending prompt never holds up runtime shutdown, and a cancelled token
/// ends the wait at once.
pub struct TerminalConsole {
    input: Mutex<InputLines>,
    cancellation: CancellationToken,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    /// Console whose pending reads fail with [`BridgeError::NotAvailable`]
    /// once `cancellation` fires.
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        let (lines, input) = mpsc::unbounded_channel();
        let spawned = std::thread::Builder::new()
            .name("console-input".to_string())
            .spawn(move || {
                for line in std::io::stdin().lock().lines() {
                    if lines.send(line).is_err() {
                        break;
                    }
                }
            });
        if let Err(e) = spawned {
            warn!(error = %e, "Failed to start console input thread");
        }

        Self::from_lines(input, cancellation)
    }

    fn from_lines(input: InputLines, cancellation: CancellationToken) -> Self {
        Self {
            input: Mutex::new(input),
            cancellation,
        }
    }
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OperatorConsole for TerminalConsole {
    async fn read_line(&self, prompt: &str) -> Result<String> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.flush().await?;

        let mut input = self.input.lock().await;
        let line = tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => {
                return Err(BridgeError::NotAvailable("input interrupted".to_string()));
            }
            line = input.recv() => line,
        };

        match line {
            Some(line) => Ok(line?.trim_end_matches('\r').to_string()),
            None => Err(BridgeError::NotAvailable(
                "standard input is closed".to_string(),
            )),
        }
    }

    fn print(&self, line: &str) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_answer_is_trimmed_of_carriage_return() {
        let (lines, input) = mpsc::unbounded_channel();
        let console = TerminalConsole::from_lines(input, CancellationToken::new());
        lines.send(Ok("y\r".to_string())).unwrap();

        assert_eq!(console.read_line("Proceed? ").await.unwrap(), "y");
    }

    #[tokio::test]
    async fn test_closed_input_is_not_available() {
        let (lines, input) = mpsc::unbounded_channel::<std::io::Result<String>>();
        let console = TerminalConsole::from_lines(input, CancellationToken::new());
        drop(lines);

        let result = console.read_line("Proceed? ").await;
        assert!(matches!(result, Err(BridgeError::NotAvailable(_))));
    }

    #[tokio::test]
    async fn test_cancellation_ends_pending_prompt() {
        let (_lines, input) = mpsc::unbounded_channel::<std::io::Result<String>>();
        let cancellation = CancellationToken::new();
        let console = TerminalConsole::from_lines(input, cancellation.clone());

        let canceller = tokio::spawn(async move {
            tokio::task::yield_now().await;
            cancellation.cancel();
        });

        let result = console.read_line("Proceed? ").await;
        canceller.await.unwrap();

        match result {
            Err(BridgeError::NotAvailable(message)) => assert_eq!(message, "input interrupted"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
