//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides production-ready implementations of the host-facing
//! bridge traits using desktop-appropriate libraries:
//! - `HttpClient` using `reqwest`
//! - `OperatorConsole` using tokio's stdin/stdout
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, TerminalConsole};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let http_client = Arc::new(ReqwestHttpClient::new()?);
//!     let console = Arc::new(TerminalConsole::new());
//!
//!     // Hand both to the provider connectors and the migration coordinator
//!     Ok(())
//! }
//! ```

mod console;
mod http;

pub use console::TerminalConsole;
pub use http::ReqwestHttpClient;
