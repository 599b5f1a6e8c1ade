//! Error types for the streaming client

use std::time::Duration;
use thiserror::Error;

/// Broad error classes, used to pick a recovery policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or invalid credentials, host or group. Fatal, never retried.
    Configuration,
    /// Socket open/send/receive failure. Triggers reconnection.
    Connection,
    /// Malformed or unexpected inbound message. Logged and dropped.
    Protocol,
    /// Server rejected the credentials
    Authentication,
    /// Missed server heartbeats. Handled like a connection failure.
    Liveness,
}

/// Main error type for streaming operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    // === Configuration Errors ===
    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    // === Connection Errors ===
    /// Socket level failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Opening the socket took too long
    #[error("Connection timeout after {timeout:?} to {url}")]
    ConnectionTimeout { url: String, timeout: Duration },

    /// Reconnection budget exhausted
    #[error("Reconnection attempts exhausted after {attempts} tries")]
    ReconnectExhausted { attempts: u32 },

    // === Protocol Errors ===
    /// Malformed or semantically invalid message
    #[error("Protocol error: {message}")]
    Protocol { message: String, raw: Option<String> },

    /// Failed to encode an outbound message
    #[error("Serialization error: {0}")]
    Serialization(String),

    // === Authentication Errors ===
    /// Server reported an authentication failure
    #[error("Authentication failed (code {code}): {message}")]
    Authentication { code: i64, message: String },

    /// Server never answered the auth request
    #[error("No auth response within {0:?}")]
    AuthTimeout(Duration),

    // === Liveness Errors ===
    /// Consecutive server heartbeats missed
    #[error("Missed {missed} consecutive server heartbeats")]
    Liveness { missed: u32 },

    // === Internal Errors ===
    /// The session was closed by an explicit disconnect
    #[error("Session is closed")]
    SessionClosed,
}

impl StreamError {
    /// Create a protocol error, keeping the offending frame for diagnostics
    pub fn protocol(message: impl Into<String>, raw: Option<&str>) -> Self {
        Self::Protocol {
            message: message.into(),
            raw: raw.map(str::to_string),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) | Self::SessionClosed => ErrorKind::Configuration,
            Self::Connection(_) | Self::ConnectionTimeout { .. } | Self::ReconnectExhausted { .. } => {
                ErrorKind::Connection
            }
            Self::Protocol { .. } | Self::Serialization(_) => ErrorKind::Protocol,
            Self::Authentication { .. } | Self::AuthTimeout(_) => ErrorKind::Authentication,
            Self::Liveness { .. } => ErrorKind::Liveness,
        }
    }

    /// Returns true if this error is potentially recoverable via retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection(_)
                | Self::ConnectionTimeout { .. }
                | Self::Liveness { .. }
                | Self::AuthTimeout(_)
        )
    }

    /// Returns true if this error means the current socket must be replaced
    pub fn requires_reconnect(&self) -> bool {
        matches!(self.kind(), ErrorKind::Connection | ErrorKind::Liveness)
            && !matches!(self, Self::ReconnectExhausted { .. })
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for streaming operations
pub type StreamResult<T> = Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            StreamError::Configuration("no host".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(StreamError::Connection("reset".into()).kind(), ErrorKind::Connection);
        assert_eq!(StreamError::protocol("bad", None).kind(), ErrorKind::Protocol);
        assert_eq!(
            StreamError::Authentication {
                code: 200006,
                message: "invalid key".into()
            }
            .kind(),
            ErrorKind::Authentication
        );
        assert_eq!(StreamError::Liveness { missed: 3 }.kind(), ErrorKind::Liveness);
    }

    #[test]
    fn test_error_retryable() {
        assert!(StreamError::Connection("reset".into()).is_retryable());
        assert!(StreamError::Liveness { missed: 3 }.is_retryable());
        assert!(!StreamError::Configuration("no key".into()).is_retryable());
        assert!(!StreamError::Authentication {
            code: 1,
            message: "bad sig".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_error_requires_reconnect() {
        assert!(StreamError::Liveness { missed: 3 }.requires_reconnect());
        assert!(StreamError::Connection("eof".into()).requires_reconnect());
        assert!(!StreamError::ReconnectExhausted { attempts: 5 }.requires_reconnect());
        assert!(!StreamError::protocol("bad", Some("{}")).requires_reconnect());
    }

    #[test]
    fn test_protocol_keeps_raw() {
        let err = StreamError::protocol("missing symbol", Some(r#"{"m":"bbo"}"#));
        match err {
            StreamError::Protocol { raw, .. } => assert_eq!(raw.as_deref(), Some(r#"{"m":"bbo"}"#)),
            _ => panic!("expected protocol error"),
        }
    }
}
