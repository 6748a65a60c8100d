//! Domain records and their typed stores.
//!
//! Each submodule owns one record type: the entity, the request
//! payloads that create or mutate it, and a store that wraps the
//! generic record layer with the entity's index maintenance. Input
//! validation collects every failing field so clients can show all
//! problems at once.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

pub mod audit;
pub mod feature;
pub mod message;
pub mod notification;
pub mod subscriber;

pub use audit::{AuditAction, AuditEntry, AuditOutcome, AuditTrail};
pub use feature::{
    FeatureRequest, FeatureStatus, FeatureStore, SubmitFeatureRequest, UpdateFeatureRequest,
};
pub use message::{
    ContactMessage, MessageStatus, MessageStore, SubmitMessageRequest, UpdateMessageRequest,
};
pub use notification::{Notification, NotificationKind, NotificationStore};
pub use subscriber::{
    SendNewsletterRequest, SubscribeRequest, Subscriber, SubscriberStatus, SubscriberStore,
};

/// One failing field in a rejected payload.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All failing fields of a rejected payload.
#[derive(Debug, Clone, Error)]
#[error("validation failed")]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

/// Collects field failures so one pass reports them all.
pub(crate) struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn require(&mut self, field: &'static str, ok: bool, message: impl Into<String>) {
        if !ok {
            self.errors.push(FieldError {
                field,
                message: message.into(),
            });
        }
    }

    pub fn finish(self) -> Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                errors: self.errors,
            })
        }
    }
}

/// Syntactic email check.
///
/// One non-space run, an `@`, a domain with at least one dot. Anything
/// stricter rejects real addresses; actual deliverability is proven by
/// sending mail.
pub fn is_valid_email(raw: &str) -> bool {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    let re = EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap()
    });
    let trimmed = raw.trim();
    trimmed.len() <= 254 && re.is_match(trimmed)
}

/// Canonical form used for storage and dedupe.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}
