//! # Store Errors
//!
//! Error types for the key-value persistence layer.

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by a key-value backend
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backend could not be reached
    #[error("Store connection failed: {0}")]
    Connection(String),

    /// A command was rejected or failed mid-flight
    #[error("Store command failed: {0}")]
    Command(String),

    /// A stored record could not be decoded back into its type
    #[error("Malformed record: {0}")]
    Corrupt(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = StoreError::Connection("refused".to_string());
        assert!(err.to_string().contains("refused"));

        let err = StoreError::Corrupt("bad field".to_string());
        assert!(err.to_string().contains("Malformed"));
    }
}
