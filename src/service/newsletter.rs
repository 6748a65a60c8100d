//! Newsletter flows: subscribe, unsubscribe, and sending an issue.

use std::sync::Arc;

use serde::Serialize;

use crate::api::ClientInfo;
use crate::email::{Mailer, OutboundEmail};
use crate::model::{
    AuditAction, AuditEntry, AuditOutcome, AuditTrail, NotificationKind, NotificationStore,
    SendNewsletterRequest, SubscribeRequest, Subscriber, SubscriberStatus, SubscriberStore,
};
use crate::ratelimit::{Quota, RateLimiter};

use super::{ServiceError, ServiceResult};

/// Result of a subscribe call.
pub struct SubscribeOutcome {
    pub subscriber: Subscriber,
    /// True when the address was already active; the call is a no-op
    /// then, but still reports success.
    pub already_subscribed: bool,
}

/// What happened when an issue went out.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReport {
    pub recipients: usize,
    pub sent: usize,
    pub failed: usize,
}

pub struct NewsletterService {
    subscribers: SubscriberStore,
    notifications: NotificationStore,
    audit: AuditTrail,
    mailer: Arc<dyn Mailer>,
    limiter: RateLimiter,
    quota: Quota,
    /// Public base URL, used to build unsubscribe links.
    public_url: String,
}

impl NewsletterService {
    pub fn new(
        subscribers: SubscriberStore,
        notifications: NotificationStore,
        audit: AuditTrail,
        mailer: Arc<dyn Mailer>,
        limiter: RateLimiter,
        quota: Quota,
        public_url: String,
    ) -> Self {
        Self {
            subscribers,
            notifications,
            audit,
            mailer,
            limiter,
            quota,
            public_url,
        }
    }

    /// Subscribe an address. Re-subscribing is always reported as
    /// success so the endpoint cannot be used to probe who subscribes.
    pub async fn subscribe(
        &self,
        request: SubscribeRequest,
        client: &ClientInfo,
    ) -> ServiceResult<SubscribeOutcome> {
        self.limiter
            .check("subscribe", client.key(), self.quota)
            .await?;
        request.validate()?;

        if let Some(existing) = self.subscribers.find_by_email(&request.email).await? {
            match existing.status {
                SubscriberStatus::Active => {
                    return Ok(SubscribeOutcome {
                        subscriber: existing,
                        already_subscribed: true,
                    });
                }
                SubscriberStatus::Unsubscribed => {
                    if let Some(reactivated) = self
                        .subscribers
                        .set_status(&existing.id, SubscriberStatus::Active)
                        .await?
                    {
                        self.send_welcome(&reactivated).await;
                        return Ok(SubscribeOutcome {
                            subscriber: reactivated,
                            already_subscribed: false,
                        });
                    }
                    // Deleted between find and update; fall through and
                    // create a fresh record.
                }
            }
        }

        let subscriber = self.subscribers.create(&request.email).await?;

        if let Err(err) = self
            .notifications
            .create(
                NotificationKind::Subscriber,
                "New newsletter subscriber",
                subscriber.email.clone(),
                Some(subscriber.id.clone()),
            )
            .await
        {
            tracing::warn!(subscriber_id = %subscriber.id, error = %err, "failed to record notification");
        }

        self.send_welcome(&subscriber).await;

        Ok(SubscribeOutcome {
            subscriber,
            already_subscribed: false,
        })
    }

    /// Resolve an unsubscribe link.
    pub async fn unsubscribe(&self, token: &str) -> ServiceResult<Subscriber> {
        let Some(subscriber) = self.subscribers.find_by_token(token).await? else {
            return Err(ServiceError::NotFound("Subscription"));
        };

        if subscriber.status == SubscriberStatus::Unsubscribed {
            return Ok(subscriber);
        }

        self.subscribers
            .set_status(&subscriber.id, SubscriberStatus::Unsubscribed)
            .await?
            .ok_or(ServiceError::NotFound("Subscription"))
    }

    pub async fn list(&self, status: Option<SubscriberStatus>) -> ServiceResult<Vec<Subscriber>> {
        Ok(self.subscribers.list(status).await?)
    }

    pub async fn remove(&self, id: &str, actor: &str, ip: Option<String>) -> ServiceResult<()> {
        if !self.subscribers.delete(id).await? {
            return Err(ServiceError::NotFound("Subscriber"));
        }

        self.audit
            .record(
                AuditEntry::new(AuditAction::SubscriberRemoved, AuditOutcome::Success, actor)
                    .with_target(id)
                    .with_ip(ip),
            )
            .await;

        Ok(())
    }

    /// Send one issue to every active subscriber, sequentially.
    ///
    /// Individual failures don't stop the run; the report says how far
    /// it got.
    pub async fn send_issue(
        &self,
        request: SendNewsletterRequest,
        actor: &str,
        ip: Option<String>,
    ) -> ServiceResult<SendReport> {
        request.validate()?;

        let subject = request.subject.trim().to_string();
        let body = request.body.trim().to_string();

        let recipients = self.subscribers.list(Some(SubscriberStatus::Active)).await?;
        let mut sent = 0;
        let mut failed = 0;

        for subscriber in &recipients {
            let issue = OutboundEmail::NewsletterIssue {
                to: subscriber.email.clone(),
                subject: subject.clone(),
                body: body.clone(),
                unsubscribe_url: self.unsubscribe_url(&subscriber.unsubscribe_token),
            };
            match self.mailer.send(issue).await {
                Ok(()) => sent += 1,
                Err(err) => {
                    failed += 1;
                    tracing::warn!(subscriber_id = %subscriber.id, error = %err, "newsletter send failed");
                }
            }
        }

        let outcome = if sent == 0 && failed > 0 {
            AuditOutcome::Failed
        } else {
            AuditOutcome::Success
        };
        self.audit
            .record(
                AuditEntry::new(AuditAction::NewsletterSent, outcome, actor)
                    .with_detail(format!("sent {} of {}, failed {}", sent, recipients.len(), failed))
                    .with_ip(ip),
            )
            .await;

        Ok(SendReport {
            recipients: recipients.len(),
            sent,
            failed,
        })
    }

    fn unsubscribe_url(&self, token: &str) -> String {
        format!(
            "{}/api/newsletter/unsubscribe?token={}",
            self.public_url.trim_end_matches('/'),
            token
        )
    }

    async fn send_welcome(&self, subscriber: &Subscriber) {
        let welcome = OutboundEmail::SubscriberWelcome {
            to: subscriber.email.clone(),
            unsubscribe_url: self.unsubscribe_url(&subscriber.unsubscribe_token),
        };
        if let Err(err) = self.mailer.send(welcome).await {
            tracing::warn!(subscriber_id = %subscriber.id, error = %err, "welcome email failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::MockMailer;
    use crate::store::MemoryStore;

    fn service(kv: Arc<MemoryStore>, mailer: Arc<MockMailer>) -> NewsletterService {
        NewsletterService::new(
            SubscriberStore::new(kv.clone()),
            NotificationStore::new(kv.clone()),
            AuditTrail::new(kv.clone()),
            mailer,
            RateLimiter::new(kv),
            Quota::new(5, 3600),
            "http://localhost:8080".to_string(),
        )
    }

    fn subscribe_request(email: &str) -> SubscribeRequest {
        SubscribeRequest {
            email: email.to_string(),
        }
    }

    fn client() -> ClientInfo {
        ClientInfo {
            ip: Some("9.9.9.9".to_string()),
            user_agent: None,
        }
    }

    #[tokio::test]
    async fn test_subscribe_welcomes_once_and_dedupes() {
        let kv = Arc::new(MemoryStore::new());
        let mailer = Arc::new(MockMailer::new());
        let svc = service(kv, mailer.clone());

        let first = svc
            .subscribe(subscribe_request("Reader@Example.com"), &client())
            .await
            .unwrap();
        assert!(!first.already_subscribed);
        assert_eq!(mailer.sent_count(), 1);

        // Same address, different casing: no new record, no new mail.
        let second = svc
            .subscribe(subscribe_request("reader@example.COM"), &client())
            .await
            .unwrap();
        assert!(second.already_subscribed);
        assert_eq!(second.subscriber.id, first.subscriber.id);
        assert_eq!(mailer.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_then_resubscribe_reactivates() {
        let kv = Arc::new(MemoryStore::new());
        let mailer = Arc::new(MockMailer::new());
        let svc = service(kv, mailer.clone());

        let outcome = svc
            .subscribe(subscribe_request("reader@example.com"), &client())
            .await
            .unwrap();
        let token = outcome.subscriber.unsubscribe_token.clone();

        let gone = svc.unsubscribe(&token).await.unwrap();
        assert_eq!(gone.status, SubscriberStatus::Unsubscribed);

        // Unknown token is a 404, not a silent success.
        let err = svc.unsubscribe("bogus").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("Subscription")));

        let back = svc
            .subscribe(subscribe_request("reader@example.com"), &client())
            .await
            .unwrap();
        assert!(!back.already_subscribed);
        assert_eq!(back.subscriber.id, outcome.subscriber.id);
        assert_eq!(back.subscriber.status, SubscriberStatus::Active);
        // Welcome went out again on reactivation.
        assert_eq!(mailer.sent_count(), 2);
    }

    #[tokio::test]
    async fn test_send_issue_reports_counts() {
        let kv = Arc::new(MemoryStore::new());
        let mailer = Arc::new(MockMailer::new());
        let svc = service(kv.clone(), mailer.clone());

        svc.subscribe(subscribe_request("a@example.com"), &client())
            .await
            .unwrap();
        svc.subscribe(subscribe_request("b@example.com"), &client())
            .await
            .unwrap();
        // Unsubscribed readers are skipped.
        let c = svc
            .subscribe(subscribe_request("c@example.com"), &client())
            .await
            .unwrap();
        svc.unsubscribe(&c.subscriber.unsubscribe_token)
            .await
            .unwrap();
        mailer.clear();

        let report = svc
            .send_issue(
                SendNewsletterRequest {
                    subject: "Issue #1".to_string(),
                    body: "Fresh post".to_string(),
                },
                "admin@example.com",
                None,
            )
            .await
            .unwrap();

        assert_eq!(report.recipients, 2);
        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(mailer.sent_count(), 2);

        let entries = AuditTrail::new(kv).list().await.unwrap();
        assert!(entries
            .iter()
            .any(|e| e.action == AuditAction::NewsletterSent));
    }
}
