use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Provider error: {0}")]
    Provider(BridgeError),

    #[error("Authentication failed, re-authenticate and resume: {0}")]
    Authentication(String),

    #[error("Progress store error: {0}")]
    ProgressStore(String),

    #[error("Destination root '{path}' could not be resolved: {reason}")]
    DestinationRoot { path: String, reason: String },

    #[error("Operator input unavailable: {0}")]
    Input(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Staging error: {0}")]
    Staging(#[from] std::io::Error),

    #[error("Migration cancelled")]
    Cancelled,
}

impl From<BridgeError> for MigrationError {
    fn from(error: BridgeError) -> Self {
        if error.is_auth() {
            MigrationError::Authentication(error.to_string())
        } else {
            MigrationError::Provider(error)
        }
    }
}

impl From<core_runtime::Error> for MigrationError {
    fn from(error: core_runtime::Error) -> Self {
        MigrationError::Config(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors_are_not_wrapped_as_provider_errors() {
        let error: MigrationError = BridgeError::Unauthorized("expired token".to_string()).into();
        assert!(matches!(error, MigrationError::Authentication(msg) if msg.contains("expired")));

        let error: MigrationError = BridgeError::Network("reset".to_string()).into();
        assert!(matches!(error, MigrationError::Provider(BridgeError::Network(_))));
    }
}
