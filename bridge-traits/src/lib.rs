//! # Host Bridge Traits
//!
//! Capability traits that the migration core consumes but never implements
//! itself.
//!
//! ## Overview
//!
//! This crate defines the contract between the migration core and the
//! concrete remote services and host environment. Each trait represents a
//! capability that the core requires but that lives outside of it.
//!
//! ## Traits
//!
//! ### Remote Storage
//! - [`SourceProvider`](storage::SourceProvider) - Recursive listing and downloads
//! - [`DestinationProvider`](storage::DestinationProvider) - Folder creation, lookup and uploads
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Single-attempt async HTTP used by provider connectors
//!
//! ### Host Integration
//! - [`OperatorConsole`](console::OperatorConsole) - Interactive prompts and operator output
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Provider
//! implementations convert their own errors into it so the core can classify
//! failures uniformly:
//!
//! - Transient (rate limits, 5xx, transport) are retried by the core
//! - [`BridgeError::Unauthorized`] is fatal and requires re-authentication
//! - Everything else fails the single operation it belongs to
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so implementations can be
//! shared behind `Arc` across async tasks.

pub mod console;
pub mod error;
pub mod http;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use console::OperatorConsole;
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use storage::{DestinationItem, DestinationProvider, RemoteEntry, SourceProvider};
