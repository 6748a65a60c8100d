//! Newsletter subscribers.
//!
//! The email index enforces one record per address; resubscribing
//! reactivates the existing record instead of minting a new one. The
//! token index resolves one-click unsubscribe links without exposing
//! subscriber ids.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::crypto::generate_token;
use crate::store::{
    encode_fields, touch, Entity, KvStore, RecordStore, SetIndex, StoreResult, UniqueIndex,
    WriteBatch,
};

use super::{is_valid_email, normalize_email, ValidationError, Validator};

const EMAIL_INDEX: UniqueIndex = UniqueIndex::new("subscriber", "email");
const TOKEN_INDEX: UniqueIndex = UniqueIndex::new("subscriber", "token");
const STATUS_INDEX: SetIndex = SetIndex::new("subscriber", "status");

pub const MAX_NEWSLETTER_SUBJECT_LEN: usize = 200;
pub const MAX_NEWSLETTER_BODY_LEN: usize = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriberStatus {
    Active,
    Unsubscribed,
}

impl SubscriberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriberStatus::Active => "active",
            SubscriberStatus::Unsubscribed => "unsubscribed",
        }
    }
}

/// One newsletter recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub id: String,
    /// Stored normalized (trimmed, lowercased).
    pub email: String,
    pub status: SubscriberStatus,
    /// Capability for the unsubscribe link; knowing it is proof enough.
    pub unsubscribe_token: String,
    pub unsubscribed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Subscriber {
    const PREFIX: &'static str = "subscriber";

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

/// Body of `POST /api/newsletter/subscribe`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
}

impl SubscribeRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Validator::new();
        v.require(
            "email",
            is_valid_email(&self.email),
            "A valid email address is required",
        );
        v.finish()
    }
}

/// Body of `POST /api/admin/newsletter/send`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendNewsletterRequest {
    pub subject: String,
    pub body: String,
}

impl SendNewsletterRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Validator::new();

        let subject = self.subject.trim();
        v.require("subject", !subject.is_empty(), "Subject is required");
        v.require(
            "subject",
            subject.len() <= MAX_NEWSLETTER_SUBJECT_LEN,
            format!(
                "Subject must be at most {} characters",
                MAX_NEWSLETTER_SUBJECT_LEN
            ),
        );

        let body = self.body.trim();
        v.require("body", !body.is_empty(), "Body is required");
        v.require(
            "body",
            body.len() <= MAX_NEWSLETTER_BODY_LEN,
            format!(
                "Body must be at most {} characters",
                MAX_NEWSLETTER_BODY_LEN
            ),
        );

        v.finish()
    }
}

/// Typed store for subscribers and their three indexes.
#[derive(Clone)]
pub struct SubscriberStore {
    kv: Arc<dyn KvStore>,
    records: RecordStore<Subscriber>,
}

impl SubscriberStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            records: RecordStore::new(kv.clone()),
            kv,
        }
    }

    /// Create an active subscriber. The caller checks for an existing
    /// record first; this does not.
    pub async fn create(&self, email: &str) -> StoreResult<Subscriber> {
        let now = Utc::now();
        let subscriber = Subscriber {
            id: Uuid::new_v4().to_string(),
            email: normalize_email(email),
            status: SubscriberStatus::Active,
            unsubscribe_token: generate_token(),
            unsubscribed_at: None,
            created_at: now,
            updated_at: now,
        };

        let batch = WriteBatch::new()
            .put_hash(
                RecordStore::<Subscriber>::key(&subscriber.id),
                encode_fields(&subscriber)?,
            )
            .push(EMAIL_INDEX.put_op(&subscriber.email, &subscriber.id))
            .push(TOKEN_INDEX.put_op(&subscriber.unsubscribe_token, &subscriber.id))
            .push(STATUS_INDEX.add_op(subscriber.status.as_str(), &subscriber.id));
        self.kv.apply(batch).await?;

        Ok(subscriber)
    }

    pub async fn find(&self, id: &str) -> StoreResult<Option<Subscriber>> {
        self.records.find(id).await
    }

    pub async fn find_by_email(&self, email: &str) -> StoreResult<Option<Subscriber>> {
        let normalized = normalize_email(email);
        match EMAIL_INDEX.get(self.kv.as_ref(), &normalized).await? {
            Some(id) => self.records.find(&id).await,
            None => Ok(None),
        }
    }

    pub async fn find_by_token(&self, token: &str) -> StoreResult<Option<Subscriber>> {
        match TOKEN_INDEX.get(self.kv.as_ref(), token).await? {
            Some(id) => self.records.find(&id).await,
            None => Ok(None),
        }
    }

    /// Newest first, optionally only one status.
    pub async fn list(&self, status: Option<SubscriberStatus>) -> StoreResult<Vec<Subscriber>> {
        let mut subscribers = match status {
            Some(status) => {
                let ids = STATUS_INDEX
                    .members(self.kv.as_ref(), status.as_str())
                    .await?;
                let mut found = Vec::with_capacity(ids.len());
                for id in ids {
                    if let Some(subscriber) = self.records.find(&id).await? {
                        found.push(subscriber);
                    }
                }
                found
            }
            None => self.records.all().await?,
        };
        subscribers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(subscribers)
    }

    /// Flip a subscriber's status, stamping `unsubscribed_at` on the
    /// way out and clearing it on reactivation.
    pub async fn set_status(
        &self,
        id: &str,
        status: SubscriberStatus,
    ) -> StoreResult<Option<Subscriber>> {
        let Some(mut subscriber) = self.records.find(id).await? else {
            return Ok(None);
        };

        let previous = subscriber.status;
        subscriber.status = status;
        subscriber.unsubscribed_at = match status {
            SubscriberStatus::Unsubscribed => Some(Utc::now()),
            SubscriberStatus::Active => None,
        };
        touch(&mut subscriber);

        let mut batch = WriteBatch::new().put_hash(
            RecordStore::<Subscriber>::key(id),
            encode_fields(&subscriber)?,
        );
        if previous != status {
            batch = batch
                .push(STATUS_INDEX.remove_op(previous.as_str(), id))
                .push(STATUS_INDEX.add_op(status.as_str(), id));
        }
        self.kv.apply(batch).await?;

        Ok(Some(subscriber))
    }

    /// Remove a subscriber and all three index entries.
    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        let Some(subscriber) = self.records.find(id).await? else {
            return Ok(false);
        };

        let batch = WriteBatch::new()
            .delete(RecordStore::<Subscriber>::key(id))
            .push(EMAIL_INDEX.remove_op(&subscriber.email))
            .push(TOKEN_INDEX.remove_op(&subscriber.unsubscribe_token))
            .push(STATUS_INDEX.remove_op(subscriber.status.as_str(), id));
        self.kv.apply(batch).await?;

        Ok(true)
    }
}
