//! Error types for Dropbox provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Dropbox provider errors
#[derive(Error, Debug)]
pub enum DropboxError {
    /// Access token missing, expired or revoked
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Endpoint-specific rejection (409) or other API error
    #[error("Dropbox API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Too many requests
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after_seconds: Option<u64> },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Download stream broke off
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Local file error
    #[error("Local file error: {0}")]
    Io(#[from] std::io::Error),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Dropbox operations
pub type Result<T> = std::result::Result<T, DropboxError>;

impl From<DropboxError> for BridgeError {
    fn from(error: DropboxError) -> Self {
        match error {
            DropboxError::AuthenticationFailed(msg) => BridgeError::Unauthorized(msg),
            DropboxError::ApiError {
                status_code,
                message,
            } => BridgeError::Api {
                status: status_code,
                message,
            },
            DropboxError::RateLimitExceeded {
                retry_after_seconds,
            } => BridgeError::RateLimited {
                retry_after_secs: retry_after_seconds,
            },
            DropboxError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            DropboxError::NetworkError(msg) => BridgeError::Network(msg),
            DropboxError::Io(e) => BridgeError::Io(e),
            DropboxError::BridgeError(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = DropboxError::ApiError {
            status_code: 409,
            message: "path/not_found/..".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Dropbox API error (status 409): path/not_found/.."
        );
    }

    #[test]
    fn test_error_conversion() {
        let bridge_error: BridgeError =
            DropboxError::AuthenticationFailed("expired_access_token".to_string()).into();
        assert!(bridge_error.is_auth());

        let bridge_error: BridgeError = DropboxError::RateLimitExceeded {
            retry_after_seconds: Some(3),
        }
        .into();
        assert!(bridge_error.is_transient());

        let bridge_error: BridgeError = DropboxError::ApiError {
            status_code: 409,
            message: "path/not_found".to_string(),
        }
        .into();
        assert!(!bridge_error.is_transient());
    }
}
