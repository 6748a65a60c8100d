//! Admin login and session flows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::ClientInfo;
use crate::auth::crypto::{constant_time_str_eq, verify_password};
use crate::auth::{AuthError, SessionClaims, SessionService};
use crate::model::{
    normalize_email, AuditAction, AuditEntry, AuditOutcome, AuditTrail, ValidationError, Validator,
};
use crate::ratelimit::{Quota, RateLimiter};

use super::ServiceResult;

/// The single admin account, loaded from configuration.
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    /// Normalized email.
    pub email: String,
    /// Argon2id hash.
    pub password_hash: String,
}

/// Body of `POST /api/auth/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Validator::new();
        v.require("email", !self.email.trim().is_empty(), "Email is required");
        v.require("password", !self.password.is_empty(), "Password is required");
        v.finish()
    }
}

/// Successful login payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub email: String,
}

#[derive(Clone)]
pub struct AuthService {
    sessions: SessionService,
    credentials: AdminCredentials,
    audit: AuditTrail,
    limiter: RateLimiter,
    quota: Quota,
}

impl AuthService {
    pub fn new(
        sessions: SessionService,
        credentials: AdminCredentials,
        audit: AuditTrail,
        limiter: RateLimiter,
        quota: Quota,
    ) -> Self {
        Self {
            sessions,
            credentials,
            audit,
            limiter,
            quota,
        }
    }

    /// Check credentials and open a session.
    pub async fn login(
        &self,
        request: LoginRequest,
        client: &ClientInfo,
    ) -> ServiceResult<LoginSession> {
        self.limiter.check("login", client.key(), self.quota).await?;
        request.validate()?;

        // Both checks always run so a wrong email costs the same time
        // as a wrong password.
        let email = normalize_email(&request.email);
        let email_ok = constant_time_str_eq(&email, &self.credentials.email);
        let password_ok =
            verify_password(&request.password, &self.credentials.password_hash).unwrap_or(false);

        if !(email_ok && password_ok) {
            self.audit
                .record(
                    AuditEntry::new(AuditAction::LoginFailed, AuditOutcome::Rejected, email)
                        .with_ip(client.ip.clone()),
                )
                .await;
            return Err(AuthError::InvalidCredentials.into());
        }

        let (session, token, expires_at) = self
            .sessions
            .create_session(
                &self.credentials.email,
                client.user_agent.clone(),
                client.ip.clone(),
            )
            .await?;

        self.audit
            .record(
                AuditEntry::new(
                    AuditAction::LoginSucceeded,
                    AuditOutcome::Success,
                    &self.credentials.email,
                )
                .with_target(&session.id)
                .with_ip(client.ip.clone()),
            )
            .await;

        Ok(LoginSession {
            token,
            expires_at,
            email: self.credentials.email.clone(),
        })
    }

    /// Validate a bearer token against its session record.
    pub async fn verify(&self, token: &str) -> ServiceResult<SessionClaims> {
        Ok(self.sessions.verify(token).await?)
    }

    /// Close the session behind `token`.
    pub async fn logout(
        &self,
        token: &str,
        actor: &str,
        ip: Option<String>,
    ) -> ServiceResult<bool> {
        let revoked = self.sessions.revoke(token).await?;
        if revoked {
            self.audit
                .record(
                    AuditEntry::new(AuditAction::LoggedOut, AuditOutcome::Success, actor)
                        .with_ip(ip),
                )
                .await;
        }
        Ok(revoked)
    }

    /// Remove expired session records. `actor` is the admin email, or
    /// "system" when the background sweeper runs it.
    pub async fn purge_expired(&self, actor: &str) -> ServiceResult<usize> {
        let purged = self.sessions.purge_expired().await?;
        if purged > 0 {
            self.audit
                .record(
                    AuditEntry::new(AuditAction::SessionsPurged, AuditOutcome::Success, actor)
                        .with_detail(purged.to_string()),
                )
                .await;
        }
        Ok(purged)
    }
}
