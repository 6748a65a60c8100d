//! Audit log for admin-relevant events.
//!
//! Entries are append-only and best-effort: a failed audit write is
//! logged and swallowed so it can never fail the action it describes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{encode_fields, Entity, KvStore, RecordStore, StoreResult, WriteBatch};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    LoginSucceeded,
    LoginFailed,
    LoggedOut,
    MessageStatusChanged,
    MessageDeleted,
    SubscriberRemoved,
    NewsletterSent,
    FeatureStatusChanged,
    FeatureDeleted,
    SessionsPurged,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::LoginSucceeded => "LOGIN_SUCCEEDED",
            AuditAction::LoginFailed => "LOGIN_FAILED",
            AuditAction::LoggedOut => "LOGGED_OUT",
            AuditAction::MessageStatusChanged => "MESSAGE_STATUS_CHANGED",
            AuditAction::MessageDeleted => "MESSAGE_DELETED",
            AuditAction::SubscriberRemoved => "SUBSCRIBER_REMOVED",
            AuditAction::NewsletterSent => "NEWSLETTER_SENT",
            AuditAction::FeatureStatusChanged => "FEATURE_STATUS_CHANGED",
            AuditAction::FeatureDeleted => "FEATURE_DELETED",
            AuditAction::SessionsPurged => "SESSIONS_PURGED",
        }
    }
}

/// How it went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Success => "SUCCESS",
            AuditOutcome::Rejected => "REJECTED",
            AuditOutcome::Failed => "FAILED",
        }
    }
}

/// One audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub action: AuditAction,
    pub outcome: AuditOutcome,
    /// Who did it: an admin email, or "system" for the sweeper.
    pub actor: String,
    /// Record the action touched, when there is one.
    pub target: Option<String>,
    pub detail: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(action: AuditAction, outcome: AuditOutcome, actor: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            action,
            outcome,
            actor: actor.into(),
            target: None,
            detail: None,
            ip_address: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_ip(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }
}

impl Entity for AuditEntry {
    const PREFIX: &'static str = "audit";

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

/// Append-only audit store.
#[derive(Clone)]
pub struct AuditTrail {
    kv: Arc<dyn KvStore>,
    records: RecordStore<AuditEntry>,
}

impl AuditTrail {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            records: RecordStore::new(kv.clone()),
            kv,
        }
    }

    /// Append an entry. Failures are logged, never propagated.
    pub async fn record(&self, entry: AuditEntry) {
        let result = async {
            let batch = WriteBatch::new().put_hash(
                RecordStore::<AuditEntry>::key(&entry.id),
                encode_fields(&entry)?,
            );
            self.kv.apply(batch).await
        }
        .await;

        if let Err(err) = result {
            tracing::warn!(
                action = entry.action.as_str(),
                error = %err,
                "failed to write audit entry"
            );
        }
    }

    /// Newest first.
    pub async fn list(&self) -> StoreResult<Vec<AuditEntry>> {
        let mut entries = self.records.all().await?;
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }
}
