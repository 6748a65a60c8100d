//! Errors shared by the crypto, JWT, and session layers.

use thiserror::Error;

use crate::store::StoreError;

pub type AuthResult<T> = Result<T, AuthError>;

/// Login, token, and session failures.
///
/// `InvalidCredentials` stays deliberately vague: the response must
/// not reveal whether the email or the password was the wrong half.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The session record is gone: logged out, purged, or never issued.
    #[error("Session is no longer valid")]
    SessionInvalid,

    #[error("Token expired")]
    TokenExpired,

    #[error("Malformed token")]
    MalformedToken,

    #[error("Token signature mismatch")]
    InvalidSignature,

    #[error("Password hashing failed")]
    HashingFailed,

    #[error("Token generation failed")]
    TokenGenerationFailed,

    #[error("Store error: {0}")]
    Storage(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_error_stays_vague() {
        let message = AuthError::InvalidCredentials.to_string();
        assert!(!message.contains("password"));
        assert!(!message.contains("email"));
    }

    #[test]
    fn test_store_error_converts() {
        let err: AuthError = StoreError::Command("boom".to_string()).into();
        assert!(matches!(err, AuthError::Storage(_)));
    }
}
