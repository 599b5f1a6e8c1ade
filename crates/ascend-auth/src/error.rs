//! Error types for authentication operations

use ascend_types::StreamError;

/// Errors that can occur while loading credentials or signing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// A required credential field is missing or empty
    #[error("Missing credential field: {0}")]
    MissingField(&'static str),

    /// Signing secret is empty
    #[error("Signing secret is empty")]
    EmptySecret,

    /// Invalid API credentials
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Environment variable not set
    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    /// Credentials file could not be read
    #[error("Failed to read credentials file {path}: {reason}")]
    File { path: String, reason: String },
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

impl From<AuthError> for StreamError {
    fn from(err: AuthError) -> Self {
        StreamError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascend_types::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = AuthError::EnvVarNotSet("ASCENDEX_API_KEY".to_string());
        assert!(err.to_string().contains("ASCENDEX_API_KEY"));
    }

    #[test]
    fn test_converts_to_configuration_error() {
        let err: StreamError = AuthError::MissingField("host").into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("host"));
    }
}
