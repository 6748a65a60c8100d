//! Contact form flow.
//!
//! A submission is rate limited, validated and persisted; the
//! notification and the email to the site owner are best-effort
//! extras that never fail the request.

use std::sync::Arc;

use crate::api::ClientInfo;
use crate::email::{Mailer, OutboundEmail};
use crate::model::notification::preview;
use crate::model::{
    AuditAction, AuditEntry, AuditOutcome, AuditTrail, ContactMessage, MessageStatus,
    MessageStore, NotificationKind, NotificationStore, SubmitMessageRequest,
};
use crate::ratelimit::{Quota, RateLimiter};

use super::{ServiceError, ServiceResult};

pub struct ContactService {
    messages: MessageStore,
    notifications: NotificationStore,
    audit: AuditTrail,
    mailer: Arc<dyn Mailer>,
    limiter: RateLimiter,
    quota: Quota,
    /// Where "you got a message" mail goes.
    recipient: String,
}

impl ContactService {
    pub fn new(
        messages: MessageStore,
        notifications: NotificationStore,
        audit: AuditTrail,
        mailer: Arc<dyn Mailer>,
        limiter: RateLimiter,
        quota: Quota,
        recipient: String,
    ) -> Self {
        Self {
            messages,
            notifications,
            audit,
            mailer,
            limiter,
            quota,
            recipient,
        }
    }

    /// Handle one contact form submission.
    pub async fn submit(
        &self,
        request: SubmitMessageRequest,
        client: &ClientInfo,
    ) -> ServiceResult<ContactMessage> {
        self.limiter
            .check("contact", client.key(), self.quota)
            .await?;
        request.validate()?;

        let message = self
            .messages
            .create(&request, client.ip.clone(), client.user_agent.clone())
            .await?;

        if let Err(err) = self
            .notifications
            .create(
                NotificationKind::ContactMessage,
                format!("New message from {}", message.name),
                preview(&message.message),
                Some(message.id.clone()),
            )
            .await
        {
            tracing::warn!(message_id = %message.id, error = %err, "failed to record notification");
        }

        let email = OutboundEmail::ContactReceived {
            to: self.recipient.clone(),
            sender_name: message.name.clone(),
            sender_email: message.email.clone(),
            subject: message.subject.clone(),
            message: message.message.clone(),
            message_id: message.id.clone(),
        };
        if let Err(err) = self.mailer.send(email).await {
            tracing::warn!(message_id = %message.id, error = %err, "contact notification email failed");
        }

        Ok(message)
    }

    pub async fn list(&self, status: Option<MessageStatus>) -> ServiceResult<Vec<ContactMessage>> {
        Ok(self.messages.list(status).await?)
    }

    pub async fn get(&self, id: &str) -> ServiceResult<ContactMessage> {
        self.messages
            .find(id)
            .await?
            .ok_or(ServiceError::NotFound("Message"))
    }

    pub async fn set_status(
        &self,
        id: &str,
        status: MessageStatus,
        actor: &str,
        ip: Option<String>,
    ) -> ServiceResult<ContactMessage> {
        let updated = self
            .messages
            .set_status(id, status)
            .await?
            .ok_or(ServiceError::NotFound("Message"))?;

        self.audit
            .record(
                AuditEntry::new(AuditAction::MessageStatusChanged, AuditOutcome::Success, actor)
                    .with_target(id)
                    .with_detail(status.as_str())
                    .with_ip(ip),
            )
            .await;

        Ok(updated)
    }

    pub async fn delete(&self, id: &str, actor: &str, ip: Option<String>) -> ServiceResult<()> {
        if !self.messages.delete(id).await? {
            return Err(ServiceError::NotFound("Message"));
        }

        self.audit
            .record(
                AuditEntry::new(AuditAction::MessageDeleted, AuditOutcome::Success, actor)
                    .with_target(id)
                    .with_ip(ip),
            )
            .await;

        Ok(())
    }
}
