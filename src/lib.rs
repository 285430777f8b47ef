//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (e.g., `provider-dropbox`, `provider-google-drive`).
//! Host applications can depend on `migrate-workspace` and enable the documented
//! features without needing to wire each crate individually.

pub use core_migration as migration;
pub use core_runtime as runtime;

#[cfg(feature = "desktop")]
pub use bridge_desktop as desktop;

#[cfg(feature = "dropbox")]
pub use provider_dropbox as dropbox;

#[cfg(feature = "google-drive")]
pub use provider_google_drive as google_drive;
