use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Remote API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited by remote service{}", retry_after_secs.map(|s| format!(", retry after {} seconds", s)).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Remote authentication failed: {0}")]
    Unauthorized(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether a retry has a reasonable chance of succeeding.
    ///
    /// Rate limiting, 5xx responses and transport failures are transient.
    /// Client errors and authentication failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            BridgeError::RateLimited { .. } | BridgeError::Network(_) => true,
            BridgeError::Api { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }

    /// Authentication failures must be surfaced to the caller for re-authentication.
    pub fn is_auth(&self) -> bool {
        matches!(self, BridgeError::Unauthorized(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
