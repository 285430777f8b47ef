//! Operator Console Abstraction
//!
//! Interactive prompts (folder confirmation, conflict resolution, large plan
//! confirmation) go through this trait so the core can run against a real
//! terminal, a scripted console in tests, or a headless host.

use async_trait::async_trait;

use crate::error::Result;

/// Line-oriented operator console.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::console::OperatorConsole;
///
/// async fn confirm(console: &dyn OperatorConsole) -> Result<bool> {
///     let answer = console.read_line("Do you want to continue? (y/n): ").await?;
///     Ok(answer.trim().eq_ignore_ascii_case("y"))
/// }
/// ```
#[async_trait]
pub trait OperatorConsole: Send + Sync {
    /// Show `prompt` and block until the operator answers.
    ///
    /// The returned line has its trailing newline removed. A closed input
    /// stream is reported as [`BridgeError::NotAvailable`](crate::BridgeError::NotAvailable)
    /// so callers never spin on an empty answer.
    async fn read_line(&self, prompt: &str) -> Result<String>;

    /// Print one line of operator-facing output.
    fn print(&self, line: &str);
}
