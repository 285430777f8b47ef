//! # Google Drive Provider
//!
//! Implements `DestinationProvider` for the Google Drive API v3.
//!
//! ## Overview
//!
//! This module provides:
//! - Exact name lookup under a parent folder (`files.list` with an escaped query)
//! - Folder creation
//! - Chunked resumable uploads, including in-place content replacement
//! - Mapping of Drive error responses onto the bridge error taxonomy
//!
//! Every method performs a single attempt. Retries are applied by the
//! migration core.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::GoogleDriveConnector;
pub use error::{GoogleDriveError, Result};
