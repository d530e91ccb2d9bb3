//! Error types for the live feed client

use thiserror::Error;

/// Errors that can occur while running a live feed client
///
/// None of these are fatal: transport failures lead to a scheduled retry and
/// decode failures drop the offending frame.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Connection to the data source failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// The socket failed after it was opened
    #[error("Transport error: {0}")]
    Transport(String),

    /// An inbound frame was not a valid envelope
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The endpoint could not be built from the configuration
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The connection attempt did not complete in time
    #[error("Operation timed out")]
    Timeout,
}

/// Result type for live feed operations
pub type Result<T> = std::result::Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_connection() {
        let err = FeedError::Connection("connection refused".to_string());
        assert_eq!(err.to_string(), "Connection error: connection refused");
    }

    #[test]
    fn test_error_display_transport() {
        let err = FeedError::Transport("reset by peer".to_string());
        assert_eq!(err.to_string(), "Transport error: reset by peer");
    }

    #[test]
    fn test_error_display_invalid_endpoint() {
        let err = FeedError::InvalidEndpoint("empty host".to_string());
        assert_eq!(err.to_string(), "Invalid endpoint: empty host");
    }

    #[test]
    fn test_error_display_timeout() {
        assert_eq!(FeedError::Timeout.to_string(), "Operation timed out");
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: FeedError = json_err.into();
        assert!(matches!(err, FeedError::Decode(_)));
        assert!(err.to_string().starts_with("Decode error:"));
    }
}
