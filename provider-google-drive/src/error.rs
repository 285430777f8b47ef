//! Error types for Google Drive provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Google Drive provider errors
#[derive(Error, Debug)]
pub enum GoogleDriveError {
    /// Access token missing, expired or revoked
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned an error
    #[error("Google Drive API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Rate limit exceeded (429, or 403 with a rate limit reason)
    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded {
        retry_after_seconds: Option<u64>,
        message: String,
    },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// The resumable upload session could not be opened
    #[error("Upload session error: {0}")]
    UploadSession(String),

    /// Local file could not be read for upload
    #[error("Local file error: {0}")]
    Io(#[from] std::io::Error),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Google Drive operations
pub type Result<T> = std::result::Result<T, GoogleDriveError>;

impl From<GoogleDriveError> for BridgeError {
    fn from(error: GoogleDriveError) -> Self {
        match error {
            GoogleDriveError::AuthenticationFailed(msg) => BridgeError::Unauthorized(msg),
            GoogleDriveError::ApiError {
                status_code,
                message,
            } => BridgeError::Api {
                status: status_code,
                message,
            },
            GoogleDriveError::RateLimitExceeded {
                retry_after_seconds,
                ..
            } => BridgeError::RateLimited {
                retry_after_secs: retry_after_seconds,
            },
            GoogleDriveError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            GoogleDriveError::UploadSession(msg) => {
                BridgeError::OperationFailed(format!("Upload session error: {}", msg))
            }
            GoogleDriveError::Io(e) => BridgeError::Io(e),
            GoogleDriveError::BridgeError(e) => e,
        }
    }
}
