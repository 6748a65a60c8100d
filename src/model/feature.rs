//! Feature requests and their vote counters.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{
    encode_fields, touch, Entity, KvStore, RecordStore, SetIndex, StoreResult, WriteBatch,
};

use super::{is_valid_email, normalize_email, ValidationError, Validator};

const STATUS_INDEX: SetIndex = SetIndex::new("feature", "status");

pub const MAX_TITLE_LEN: usize = 150;
pub const MAX_DESCRIPTION_LEN: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    Proposed,
    Planned,
    InProgress,
    Completed,
    Declined,
}

impl FeatureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureStatus::Proposed => "proposed",
            FeatureStatus::Planned => "planned",
            FeatureStatus::InProgress => "in_progress",
            FeatureStatus::Completed => "completed",
            FeatureStatus::Declined => "declined",
        }
    }
}

/// One visitor-submitted feature request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRequest {
    pub id: String,
    pub title: String,
    pub description: String,
    pub requester_email: Option<String>,
    pub status: FeatureStatus,
    /// Mutated through HINCRBY only, so concurrent votes all count.
    pub votes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for FeatureRequest {
    const PREFIX: &'static str = "feature";

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

/// Body of `POST /api/features`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitFeatureRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl SubmitFeatureRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Validator::new();

        let title = self.title.trim();
        v.require("title", !title.is_empty(), "Title is required");
        v.require(
            "title",
            title.len() <= MAX_TITLE_LEN,
            format!("Title must be at most {} characters", MAX_TITLE_LEN),
        );

        let description = self.description.trim();
        v.require(
            "description",
            !description.is_empty(),
            "Description is required",
        );
        v.require(
            "description",
            description.len() <= MAX_DESCRIPTION_LEN,
            format!(
                "Description must be at most {} characters",
                MAX_DESCRIPTION_LEN
            ),
        );

        if let Some(email) = &self.email {
            v.require(
                "email",
                is_valid_email(email),
                "A valid email address is required",
            );
        }

        v.finish()
    }
}

/// Body of `PATCH /api/admin/features/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateFeatureRequest {
    pub status: FeatureStatus,
}

/// Typed store for feature requests.
#[derive(Clone)]
pub struct FeatureStore {
    kv: Arc<dyn KvStore>,
    records: RecordStore<FeatureRequest>,
}

impl FeatureStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            records: RecordStore::new(kv.clone()),
            kv,
        }
    }

    /// Persist a validated submission as a proposed feature.
    pub async fn create(&self, request: &SubmitFeatureRequest) -> StoreResult<FeatureRequest> {
        let now = Utc::now();
        let feature = FeatureRequest {
            id: Uuid::new_v4().to_string(),
            title: request.title.trim().to_string(),
            description: request.description.trim().to_string(),
            requester_email: request
                .email
                .as_deref()
                .map(normalize_email)
                .filter(|e| !e.is_empty()),
            status: FeatureStatus::Proposed,
            votes: 0,
            created_at: now,
            updated_at: now,
        };

        let batch = WriteBatch::new()
            .put_hash(
                RecordStore::<FeatureRequest>::key(&feature.id),
                encode_fields(&feature)?,
            )
            .push(STATUS_INDEX.add_op(feature.status.as_str(), &feature.id));
        self.kv.apply(batch).await?;

        Ok(feature)
    }

    pub async fn find(&self, id: &str) -> StoreResult<Option<FeatureRequest>> {
        self.records.find(id).await
    }

    /// Most voted first, ties broken newest first.
    pub async fn list(&self, status: Option<FeatureStatus>) -> StoreResult<Vec<FeatureRequest>> {
        let mut features = match status {
            Some(status) => {
                let ids = STATUS_INDEX
                    .members(self.kv.as_ref(), status.as_str())
                    .await?;
                let mut found = Vec::with_capacity(ids.len());
                for id in ids {
                    if let Some(feature) = self.records.find(&id).await? {
                        found.push(feature);
                    }
                }
                found
            }
            None => self.records.all().await?,
        };
        features.sort_by(|a, b| {
            b.votes
                .cmp(&a.votes)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(features)
    }

    /// Count one vote. Returns the new total, or None when the id is
    /// unknown.
    pub async fn vote(&self, id: &str) -> StoreResult<Option<i64>> {
        if self.records.find(id).await?.is_none() {
            return Ok(None);
        }
        let total = self
            .kv
            .hash_incr(&RecordStore::<FeatureRequest>::key(id), "votes", 1)
            .await?;
        Ok(Some(total))
    }

    pub async fn set_status(
        &self,
        id: &str,
        status: FeatureStatus,
    ) -> StoreResult<Option<FeatureRequest>> {
        let Some(mut feature) = self.records.find(id).await? else {
            return Ok(None);
        };

        let previous = feature.status;
        feature.status = status;
        touch(&mut feature);

        let mut batch = WriteBatch::new().put_hash(
            RecordStore::<FeatureRequest>::key(id),
            encode_fields(&feature)?,
        );
        if previous != status {
            batch = batch
                .push(STATUS_INDEX.remove_op(previous.as_str(), id))
                .push(STATUS_INDEX.add_op(status.as_str(), id));
        }
        self.kv.apply(batch).await?;

        Ok(Some(feature))
    }

    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        let Some(feature) = self.records.find(id).await? else {
            return Ok(false);
        };

        let batch = WriteBatch::new()
            .delete(RecordStore::<FeatureRequest>::key(id))
            .push(STATUS_INDEX.remove_op(feature.status.as_str(), id));
        self.kv.apply(batch).await?;

        Ok(true)
    }
}
