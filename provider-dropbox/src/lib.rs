//! # Dropbox Provider
//!
//! Implements `SourceProvider` for the Dropbox HTTP API v2.
//!
//! ## Overview
//!
//! This module provides:
//! - Recursive folder listing with cursor pagination (`list_folder` / `list_folder/continue`)
//! - Streaming downloads to a local staging file
//! - Team space access through the `Dropbox-API-Path-Root` header
//! - Loading and saving a cached access token (`dropbox_credentials.json`)

pub mod connector;
pub mod credentials;
pub mod error;
pub mod types;

pub use connector::DropboxConnector;
pub use credentials::{load_access_token, save_access_token, DEFAULT_TOKEN_FILE};
pub use error::{DropboxError, Result};
