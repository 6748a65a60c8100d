//! Admin dashboard notifications.
//!
//! Every public-facing event (new message, new subscriber, new feature
//! request) leaves one notification. The read flag is indexed so the
//! dashboard badge query never walks the full history.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{
    encode_fields, touch, Entity, KvStore, RecordStore, SetIndex, StoreResult, WriteBatch,
};

const READ_INDEX: SetIndex = SetIndex::new("notification", "read");

/// How long a notification body preview can get.
const PREVIEW_LEN: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ContactMessage,
    Subscriber,
    FeatureRequest,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ContactMessage => "contact_message",
            NotificationKind::Subscriber => "subscriber",
            NotificationKind::FeatureRequest => "feature_request",
        }
    }
}

fn read_flag(read: bool) -> &'static str {
    if read {
        "true"
    } else {
        "false"
    }
}

/// Shorten free text for a notification body.
pub(crate) fn preview(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= PREVIEW_LEN {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(PREVIEW_LEN).collect();
    format!("{}...", cut)
}

/// One dashboard notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub read: bool,
    /// Id of the record that caused this, when there is one.
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Notification {
    const PREFIX: &'static str = "notification";

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

/// Typed store for notifications plus the read-flag index.
#[derive(Clone)]
pub struct NotificationStore {
    kv: Arc<dyn KvStore>,
    records: RecordStore<Notification>,
}

impl NotificationStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            records: RecordStore::new(kv.clone()),
            kv,
        }
    }

    /// Record an unread notification.
    pub async fn create(
        &self,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
        reference: Option<String>,
    ) -> StoreResult<Notification> {
        let now = Utc::now();
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            kind,
            title: title.into(),
            body: body.into(),
            read: false,
            reference,
            created_at: now,
            updated_at: now,
        };

        let batch = WriteBatch::new()
            .put_hash(
                RecordStore::<Notification>::key(&notification.id),
                encode_fields(&notification)?,
            )
            .push(READ_INDEX.add_op(read_flag(false), &notification.id));
        self.kv.apply(batch).await?;

        Ok(notification)
    }

    /// Newest first; optionally only unread.
    pub async fn list(&self, unread_only: bool) -> StoreResult<Vec<Notification>> {
        let mut notifications = if unread_only {
            let ids = READ_INDEX.members(self.kv.as_ref(), read_flag(false)).await?;
            let mut found = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(notification) = self.records.find(&id).await? {
                    found.push(notification);
                }
            }
            found
        } else {
            self.records.all().await?
        };
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    /// Mark one notification read. Already-read ones come back
    /// unchanged.
    pub async fn mark_read(&self, id: &str) -> StoreResult<Option<Notification>> {
        let Some(mut notification) = self.records.find(id).await? else {
            return Ok(None);
        };
        if notification.read {
            return Ok(Some(notification));
        }

        notification.read = true;
        touch(&mut notification);

        let batch = WriteBatch::new()
            .put_hash(
                RecordStore::<Notification>::key(id),
                encode_fields(&notification)?,
            )
            .push(READ_INDEX.remove_op(read_flag(false), id))
            .push(READ_INDEX.add_op(read_flag(true), id));
        self.kv.apply(batch).await?;

        Ok(Some(notification))
    }

    /// Mark everything read in one write. Returns how many flipped.
    pub async fn mark_all_read(&self) -> StoreResult<usize> {
        let ids = READ_INDEX.members(self.kv.as_ref(), read_flag(false)).await?;
        if ids.is_empty() {
            return Ok(0);
        }

        let mut batch = WriteBatch::new();
        let mut flipped = 0;
        for id in ids {
            match self.records.find(&id).await? {
                Some(mut notification) => {
                    notification.read = true;
                    touch(&mut notification);
                    batch = batch
                        .put_hash(
                            RecordStore::<Notification>::key(&id),
                            encode_fields(&notification)?,
                        )
                        .push(READ_INDEX.remove_op(read_flag(false), &id))
                        .push(READ_INDEX.add_op(read_flag(true), &id));
                    flipped += 1;
                }
                None => {
                    // Stale member left by a crashed delete.
                    batch = batch.push(READ_INDEX.remove_op(read_flag(false), &id));
                }
            }
        }
        self.kv.apply(batch).await?;

        Ok(flipped)
    }

    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        let Some(notification) = self.records.find(id).await? else {
            return Ok(false);
        };

        let batch = WriteBatch::new()
            .delete(RecordStore::<Notification>::key(id))
            .push(READ_INDEX.remove_op(read_flag(notification.read), id));
        self.kv.apply(batch).await?;

        Ok(true)
    }
}
