//! Shared state handed to every request handler.

use std::sync::Arc;

use crate::auth::{SessionService, TokenSigner};
use crate::config::AppConfig;
use crate::email::Mailer;
use crate::model::{
    AuditTrail, FeatureStore, MessageStore, NotificationStore, SubscriberStore,
};
use crate::ratelimit::RateLimiter;
use crate::service::{
    AdminCredentials, AuthService, ContactService, FeatureService, NewsletterService,
    NotificationService,
};
use crate::store::KvStore;

/// Wired service graph. One instance lives behind an `Arc` for the
/// whole server; everything inside is cheaply cloneable.
pub struct AppState {
    pub kv: Arc<dyn KvStore>,
    pub auth: AuthService,
    pub contact: ContactService,
    pub newsletter: NewsletterService,
    pub features: FeatureService,
    pub notifications: NotificationService,
    pub audit: AuditTrail,
}

impl AppState {
    pub fn new(
        kv: Arc<dyn KvStore>,
        mailer: Arc<dyn Mailer>,
        config: &AppConfig,
    ) -> Self {
        let limiter = RateLimiter::new(kv.clone());
        let audit = AuditTrail::new(kv.clone());
        let notifications = NotificationStore::new(kv.clone());

        let sessions = SessionService::new(kv.clone(), TokenSigner::new(config.jwt_config()));
        let auth = AuthService::new(
            sessions,
            AdminCredentials {
                email: config.admin_email.clone(),
                password_hash: config.admin_password_hash.clone(),
            },
            audit.clone(),
            limiter.clone(),
            config.rate_limits.login,
        );

        let contact = ContactService::new(
            MessageStore::new(kv.clone()),
            notifications.clone(),
            audit.clone(),
            mailer.clone(),
            limiter.clone(),
            config.rate_limits.contact,
            config.contact_recipient.clone(),
        );

        let newsletter = NewsletterService::new(
            SubscriberStore::new(kv.clone()),
            notifications.clone(),
            audit.clone(),
            mailer,
            limiter.clone(),
            config.rate_limits.subscribe,
            config.public_url.clone(),
        );

        let features = FeatureService::new(
            FeatureStore::new(kv.clone()),
            notifications.clone(),
            audit.clone(),
            limiter,
            config.rate_limits.feature,
            config.rate_limits.vote,
        );

        Self {
            kv,
            auth,
            contact,
            newsletter,
            features,
            notifications: NotificationService::new(notifications),
            audit,
        }
    }
}
