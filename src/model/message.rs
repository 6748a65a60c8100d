//! Contact messages sent through the public form.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{
    encode_fields, touch, Entity, KvStore, RecordStore, SetIndex, StoreResult, WriteBatch,
};

use super::{is_valid_email, normalize_email, ValidationError, Validator};

const STATUS_INDEX: SetIndex = SetIndex::new("message", "status");

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_SUBJECT_LEN: usize = 200;
pub const MAX_MESSAGE_LEN: usize = 5000;

/// Where a message sits in the owner's triage flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Unread,
    Read,
    Replied,
    Archived,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Unread => "unread",
            MessageStatus::Read => "read",
            MessageStatus::Replied => "replied",
            MessageStatus::Archived => "archived",
        }
    }
}

/// One message from the contact form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    pub id: String,
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
    pub status: MessageStatus,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for ContactMessage {
    const PREFIX: &'static str = "message";

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

/// Body of `POST /api/contact`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitMessageRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub message: String,
}

impl SubmitMessageRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Validator::new();

        let name = self.name.trim();
        v.require("name", !name.is_empty(), "Name is required");
        v.require(
            "name",
            name.len() <= MAX_NAME_LEN,
            format!("Name must be at most {} characters", MAX_NAME_LEN),
        );

        v.require(
            "email",
            is_valid_email(&self.email),
            "A valid email address is required",
        );

        if let Some(subject) = &self.subject {
            v.require(
                "subject",
                subject.trim().len() <= MAX_SUBJECT_LEN,
                format!("Subject must be at most {} characters", MAX_SUBJECT_LEN),
            );
        }

        let message = self.message.trim();
        v.require("message", !message.is_empty(), "Message is required");
        v.require(
            "message",
            message.len() <= MAX_MESSAGE_LEN,
            format!("Message must be at most {} characters", MAX_MESSAGE_LEN),
        );

        v.finish()
    }
}

/// Body of `PATCH /api/admin/messages/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMessageRequest {
    pub status: MessageStatus,
}

/// Typed store for contact messages plus their status index.
#[derive(Clone)]
pub struct MessageStore {
    kv: Arc<dyn KvStore>,
    records: RecordStore<ContactMessage>,
}

impl MessageStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            records: RecordStore::new(kv.clone()),
            kv,
        }
    }

    /// Persist a validated submission as an unread message.
    pub async fn create(
        &self,
        request: &SubmitMessageRequest,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> StoreResult<ContactMessage> {
        let now = Utc::now();
        let subject = request
            .subject
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let message = ContactMessage {
            id: Uuid::new_v4().to_string(),
            name: request.name.trim().to_string(),
            email: normalize_email(&request.email),
            subject,
            message: request.message.trim().to_string(),
            status: MessageStatus::Unread,
            ip_address,
            user_agent,
            created_at: now,
            updated_at: now,
        };

        let batch = WriteBatch::new()
            .put_hash(
                RecordStore::<ContactMessage>::key(&message.id),
                encode_fields(&message)?,
            )
            .push(STATUS_INDEX.add_op(message.status.as_str(), &message.id));
        self.kv.apply(batch).await?;

        Ok(message)
    }

    pub async fn find(&self, id: &str) -> StoreResult<Option<ContactMessage>> {
        self.records.find(id).await
    }

    /// Newest first, optionally only one status.
    pub async fn list(&self, status: Option<MessageStatus>) -> StoreResult<Vec<ContactMessage>> {
        let mut messages = match status {
            Some(status) => {
                let ids = STATUS_INDEX
                    .members(self.kv.as_ref(), status.as_str())
                    .await?;
                let mut found = Vec::with_capacity(ids.len());
                for id in ids {
                    if let Some(message) = self.records.find(&id).await? {
                        found.push(message);
                    }
                }
                found
            }
            None => self.records.all().await?,
        };
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(messages)
    }

    /// Move a message to `status`. Returns the updated record, or None
    /// when the id is unknown.
    pub async fn set_status(
        &self,
        id: &str,
        status: MessageStatus,
    ) -> StoreResult<Option<ContactMessage>> {
        let Some(mut message) = self.records.find(id).await? else {
            return Ok(None);
        };

        let previous = message.status;
        message.status = status;
        touch(&mut message);

        let mut batch = WriteBatch::new().put_hash(
            RecordStore::<ContactMessage>::key(id),
            encode_fields(&message)?,
        );
        if previous != status {
            batch = batch
                .push(STATUS_INDEX.remove_op(previous.as_str(), id))
                .push(STATUS_INDEX.add_op(status.as_str(), id));
        }
        self.kv.apply(batch).await?;

        Ok(Some(message))
    }

    /// Delete a message and its index entry. Returns false when the id
    /// is unknown.
    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        let Some(message) = self.records.find(id).await? else {
            return Ok(false);
        };

        let batch = WriteBatch::new()
            .delete(RecordStore::<ContactMessage>::key(id))
            .push(STATUS_INDEX.remove_op(message.status.as_str(), id));
        self.kv.apply(batch).await?;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn request(name: &str, email: &str, message: &str) -> SubmitMessageRequest {
        SubmitMessageRequest {
            name: name.to_string(),
            email: email.to_string(),
            subject: None,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_validation_rules() {
        assert!(request("Ada", "ada@example.com", "Hello there").validate().is_ok());

        let err = request("", "nope", "").validate().unwrap_err();
        let fields: Vec<_> = err.errors.iter().map(|e| e.field).collect();
        assert!(fields.contains(&"name"));
        assert!(fields.contains(&"email"));
        assert!(fields.contains(&"message"));

        let mut too_long = request("Ada", "ada@example.com", "hi");
        too_long.subject = Some("s".repeat(MAX_SUBJECT_LEN + 1));
        assert!(too_long.validate().is_err());

        let long_message = request("Ada", "ada@example.com", &"m".repeat(MAX_MESSAGE_LEN + 1));
        assert!(long_message.validate().is_err());
    }

    #[tokio::test]
    async fn test_create_starts_unread_and_indexed() {
        let kv = Arc::new(MemoryStore::new());
        let store = MessageStore::new(kv.clone());

        let created = store
            .create(
                &request("Ada", " Ada@Example.com ", "  Hello  "),
                Some("1.2.3.4".to_string()),
                None,
            )
            .await
            .unwrap();

        assert_eq!(created.status, MessageStatus::Unread);
        assert_eq!(created.email, "ada@example.com");
        assert_eq!(created.message, "Hello");

        let loaded = store.find(&created.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, created.id);

        let unread = store.list(Some(MessageStatus::Unread)).await.unwrap();
        assert_eq!(unread.len(), 1);
    }

    #[tokio::test]
    async fn test_set_status_moves_index_and_bumps_updated_at() {
        let kv = Arc::new(MemoryStore::new());
        let store = MessageStore::new(kv);

        let created = store
            .create(&request("Ada", "ada@example.com", "Hello"), None, None)
            .await
            .unwrap();

        let updated = store
            .set_status(&created.id, MessageStatus::Read)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, MessageStatus::Read);
        assert!(updated.updated_at > created.updated_at);

        assert!(store.list(Some(MessageStatus::Unread)).await.unwrap().is_empty());
        assert_eq!(store.list(Some(MessageStatus::Read)).await.unwrap().len(), 1);

        assert!(store
            .set_status("missing", MessageStatus::Read)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_record_and_index() {
        let kv = Arc::new(MemoryStore::new());
        let store = MessageStore::new(kv.clone());

        let created = store
            .create(&request("Ada", "ada@example.com", "Hello"), None, None)
            .await
            .unwrap();

        assert!(store.delete(&created.id).await.unwrap());
        assert!(!store.delete(&created.id).await.unwrap());
        assert!(store.find(&created.id).await.unwrap().is_none());
        assert!(kv.scan_keys("message:").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_sorts_newest_first() {
        let kv = Arc::new(MemoryStore::new());
        let store = MessageStore::new(kv);

        let first = store
            .create(&request("A", "a@example.com", "one"), None, None)
            .await
            .unwrap();
        let second = store
            .create(&request("B", "b@example.com", "two"), None, None)
            .await
            .unwrap();

        let all = store.list(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);
    }
}
