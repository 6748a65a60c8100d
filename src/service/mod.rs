//! Application services.
//!
//! One service per feature area. Services own the use-case flow
//! (rate limit, validate, persist, notify, audit) and return
//! [`ServiceError`]; the HTTP layer turns that into an envelope via
//! [`ServiceError::api_error`] without knowing the flow.

use serde_json::json;
use thiserror::Error;

use crate::api::{ApiError, ErrorCode};
use crate::auth::AuthError;
use crate::model::ValidationError;
use crate::ratelimit::RateLimitError;
use crate::store::StoreError;

pub mod auth;
pub mod contact;
pub mod features;
pub mod newsletter;
pub mod notifications;

pub use auth::{AdminCredentials, AuthService, LoginRequest, LoginSession};
pub use contact::ContactService;
pub use features::FeatureService;
pub use newsletter::{NewsletterService, SendReport, SubscribeOutcome};
pub use notifications::NotificationService;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Anything a service call can fail with.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    /// The envelope error this failure surfaces as.
    ///
    /// Internal failures collapse to a generic message; details of
    /// store or hashing problems belong in logs, not responses.
    pub fn api_error(&self) -> ApiError {
        match self {
            ServiceError::Validation(err) => {
                ApiError::new(ErrorCode::ValidationError, "Validation failed")
                    .with_details(json!({ "fields": err.errors }))
            }
            ServiceError::NotFound(_) => ApiError::not_found(self.to_string()),
            ServiceError::Auth(err) => match err {
                AuthError::TokenExpired => ApiError::unauthorized("Session expired"),
                AuthError::HashingFailed
                | AuthError::TokenGenerationFailed
                | AuthError::Storage(_) => {
                    ApiError::new(ErrorCode::InternalError, "Internal server error")
                }
                other => ApiError::unauthorized(other.to_string()),
            },
            ServiceError::RateLimit(RateLimitError::Exceeded {
                retry_after_secs, ..
            }) => ApiError::new(ErrorCode::RateLimited, "Too many requests")
                .with_details(json!({ "retryAfterSecs": retry_after_secs })),
            ServiceError::RateLimit(RateLimitError::Store(_)) | ServiceError::Store(_) => {
                ApiError::new(ErrorCode::InternalError, "Internal server error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldError;

    #[test]
    fn test_validation_maps_to_field_details() {
        let err = ServiceError::Validation(ValidationError {
            errors: vec![FieldError {
                field: "email",
                message: "A valid email address is required".to_string(),
            }],
        });
        let api = err.api_error();
        assert_eq!(api.code, ErrorCode::ValidationError);
        let details = api.details.unwrap();
        assert_eq!(details["fields"][0]["field"], "email");
    }

    #[test]
    fn test_internal_failures_stay_generic() {
        let err = ServiceError::Store(StoreError::Connection("redis gone".to_string()));
        let api = err.api_error();
        assert_eq!(api.code, ErrorCode::InternalError);
        assert!(!api.message.contains("redis"));
    }

    #[test]
    fn test_rate_limit_carries_retry_after() {
        let err = ServiceError::RateLimit(RateLimitError::Exceeded {
            scope: "contact".to_string(),
            retry_after_secs: 42,
        });
        let api = err.api_error();
        assert_eq!(api.code, ErrorCode::RateLimited);
        assert_eq!(api.details.unwrap()["retryAfterSecs"], 42);
    }

    #[test]
    fn test_expired_session_message() {
        let err = ServiceError::Auth(AuthError::TokenExpired);
        let api = err.api_error();
        assert_eq!(api.code, ErrorCode::Unauthorized);
        assert_eq!(api.message, "Session expired");
    }
}
