//! Feature request flows: submit, vote, and admin curation.

use crate::api::ClientInfo;
use crate::model::notification::preview;
use crate::model::{
    AuditAction, AuditEntry, AuditOutcome, AuditTrail, FeatureRequest, FeatureStatus,
    FeatureStore, NotificationKind, NotificationStore, SubmitFeatureRequest,
};
use crate::ratelimit::{Quota, RateLimiter};

use super::{ServiceError, ServiceResult};

pub struct FeatureService {
    features: FeatureStore,
    notifications: NotificationStore,
    audit: AuditTrail,
    limiter: RateLimiter,
    submit_quota: Quota,
    vote_quota: Quota,
}

impl FeatureService {
    pub fn new(
        features: FeatureStore,
        notifications: NotificationStore,
        audit: AuditTrail,
        limiter: RateLimiter,
        submit_quota: Quota,
        vote_quota: Quota,
    ) -> Self {
        Self {
            features,
            notifications,
            audit,
            limiter,
            submit_quota,
            vote_quota,
        }
    }

    pub async fn submit(
        &self,
        request: SubmitFeatureRequest,
        client: &ClientInfo,
    ) -> ServiceResult<FeatureRequest> {
        self.limiter
            .check("feature", client.key(), self.submit_quota)
            .await?;
        request.validate()?;

        let feature = self.features.create(&request).await?;

        if let Err(err) = self
            .notifications
            .create(
                NotificationKind::FeatureRequest,
                format!("New feature request: {}", feature.title),
                preview(&feature.description),
                Some(feature.id.clone()),
            )
            .await
        {
            tracing::warn!(feature_id = %feature.id, error = %err, "failed to record notification");
        }

        Ok(feature)
    }

    pub async fn list(&self, status: Option<FeatureStatus>) -> ServiceResult<Vec<FeatureRequest>> {
        Ok(self.features.list(status).await?)
    }

    /// Count one vote for `id` from this client.
    ///
    /// The limiter key includes the feature id, so the quota is per
    /// client per feature rather than per client overall.
    pub async fn vote(&self, id: &str, client: &ClientInfo) -> ServiceResult<i64> {
        let limiter_key = format!("{}:{}", client.key(), id);
        self.limiter
            .check("vote", &limiter_key, self.vote_quota)
            .await?;

        self.features
            .vote(id)
            .await?
            .ok_or(ServiceError::NotFound("Feature"))
    }

    pub async fn set_status(
        &self,
        id: &str,
        status: FeatureStatus,
        actor: &str,
        ip: Option<String>,
    ) -> ServiceResult<FeatureRequest> {
        let updated = self
            .features
            .set_status(id, status)
            .await?
            .ok_or(ServiceError::NotFound("Feature"))?;

        self.audit
            .record(
                AuditEntry::new(AuditAction::FeatureStatusChanged, AuditOutcome::Success, actor)
                    .with_target(id)
                    .with_detail(status.as_str())
                    .with_ip(ip),
            )
            .await;

        Ok(updated)
    }

    pub async fn delete(&self, id: &str, actor: &str, ip: Option<String>) -> ServiceResult<()> {
        if !self.features.delete(id).await? {
            return Err(ServiceError::NotFound("Feature"));
        }

        self.audit
            .record(
                AuditEntry::new(AuditAction::FeatureDeleted, AuditOutcome::Success, actor)
                    .with_target(id)
                    .with_ip(ip),
            )
            .await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::RateLimitError;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn service(kv: Arc<MemoryStore>) -> FeatureService {
        FeatureService::new(
            FeatureStore::new(kv.clone()),
            NotificationStore::new(kv.clone()),
            AuditTrail::new(kv.clone()),
            RateLimiter::new(kv),
            Quota::new(5, 3600),
            Quota::new(2, 3600),
        )
    }

    fn request(title: &str) -> SubmitFeatureRequest {
        SubmitFeatureRequest {
            title: title.to_string(),
            description: "Would be great".to_string(),
            email: None,
        }
    }

    fn client(ip: &str) -> ClientInfo {
        ClientInfo {
            ip: Some(ip.to_string()),
            user_agent: None,
        }
    }

    #[tokio::test]
    async fn test_submit_creates_notification() {
        let kv = Arc::new(MemoryStore::new());
        let svc = service(kv.clone());

        let feature = svc
            .submit(request("Dark mode"), &client("1.1.1.1"))
            .await
            .unwrap();
        assert_eq!(feature.status, FeatureStatus::Proposed);

        let notifications = NotificationStore::new(kv).list(true).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert!(notifications[0].title.contains("Dark mode"));
    }

    #[tokio::test]
    async fn test_vote_quota_is_per_feature() {
        let kv = Arc::new(MemoryStore::new());
        let svc = service(kv);

        let a = svc
            .submit(request("Feature A"), &client("1.1.1.1"))
            .await
            .unwrap();
        let b = svc
            .submit(request("Feature B"), &client("1.1.1.1"))
            .await
            .unwrap();

        let caller = client("2.2.2.2");
        assert_eq!(svc.vote(&a.id, &caller).await.unwrap(), 1);
        assert_eq!(svc.vote(&a.id, &caller).await.unwrap(), 2);
        let err = svc.vote(&a.id, &caller).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::RateLimit(RateLimitError::Exceeded { .. })
        ));

        // A different feature has its own window.
        assert_eq!(svc.vote(&b.id, &caller).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_vote_unknown_feature_is_not_found() {
        let kv = Arc::new(MemoryStore::new());
        let svc = service(kv);

        let err = svc.vote("missing", &client("1.1.1.1")).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("Feature")));
    }
}
