//! Server-side session records behind the admin JWTs.
//! Sessions live under `session:{id}` with a digest index at
//! `session:index:token:{digest}`.
//!
//! ## Invariants
//! - A token is only accepted while its session record exists
//! - Logout deletes the record, invalidating the token immediately
//! - Expired records are removed lazily on verify and by the sweeper

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{Entity, KvStore, RecordStore, UniqueIndex, WriteBatch};

use super::crypto::{constant_time_str_eq, hash_token};
use super::errors::{AuthError, AuthResult};
use super::jwt::{SessionClaims, TokenSigner};

/// Token digest to session id.
const TOKEN_INDEX: UniqueIndex = UniqueIndex::new("session", "token");

/// One admin login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,

    pub admin_email: String,

    /// SHA-256 digest of the token; the raw token only goes to the client
    pub token_hash: String,

    pub created_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,

    /// Where the login came from
    pub user_agent: Option<String>,

    pub ip_address: Option<String>,

    pub updated_at: DateTime<Utc>,
}

impl Entity for Session {
    const PREFIX: &'static str = "session";

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

/// Creates, verifies and revokes sessions
#[derive(Clone)]
pub struct SessionService {
    kv: Arc<dyn KvStore>,
    records: RecordStore<Session>,
    jwt: TokenSigner,
}

impl SessionService {
    pub fn new(kv: Arc<dyn KvStore>, jwt: TokenSigner) -> Self {
        Self {
            records: RecordStore::new(kv.clone()),
            kv,
            jwt,
        }
    }

    /// Create a session and sign its token.
    ///
    /// Returns the raw token (never stored) alongside the record.
    pub async fn create_session(
        &self,
        email: &str,
        user_agent: Option<String>,
        ip_address: Option<String>,
    ) -> AuthResult<(Session, String, DateTime<Utc>)> {
        let id = Uuid::new_v4().to_string();
        let (token, expires_at) = self.jwt.issue(email, &id)?;
        let token_hash = hash_token(&token);

        let now = Utc::now();
        let session = Session {
            id: id.clone(),
            admin_email: email.to_string(),
            token_hash: token_hash.clone(),
            created_at: now,
            expires_at,
            user_agent,
            ip_address,
            updated_at: now,
        };

        let batch = WriteBatch::new()
            .put_hash(
                RecordStore::<Session>::key(&id),
                crate::store::encode_fields(&session)?,
            )
            .push(TOKEN_INDEX.put_op(&token_hash, &id));
        self.kv.apply(batch).await?;

        Ok((session, token, expires_at))
    }

    /// Validate a token against both its signature and its record.
    pub async fn verify(&self, token: &str) -> AuthResult<SessionClaims> {
        let token_hash = hash_token(token);

        let claims = match self.jwt.verify(token) {
            Ok(claims) => claims,
            Err(AuthError::TokenExpired) => {
                // The record is dead weight now; drop it on the way out.
                if let Err(err) = self.remove_by_digest(&token_hash).await {
                    tracing::warn!(error = %err, "failed to clean up expired session");
                }
                return Err(AuthError::TokenExpired);
            }
            Err(err) => return Err(err),
        };

        let Some(id) = TOKEN_INDEX.get(self.kv.as_ref(), &token_hash).await? else {
            return Err(AuthError::SessionInvalid);
        };

        let Some(session) = self.records.find(&id).await? else {
            // Orphaned index entry; remove it so it cannot shadow a
            // future session.
            let batch = WriteBatch::new().push(TOKEN_INDEX.remove_op(&token_hash));
            self.kv.apply(batch).await?;
            return Err(AuthError::SessionInvalid);
        };

        if !constant_time_str_eq(&session.token_hash, &token_hash) {
            return Err(AuthError::SessionInvalid);
        }

        // Guards records whose expiry was shortened after issue.
        if session.expires_at <= Utc::now() {
            self.delete(&session).await?;
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }

    /// Delete the session behind a token. Returns false when no record
    /// was found.
    pub async fn revoke(&self, token: &str) -> AuthResult<bool> {
        self.remove_by_digest(&hash_token(token)).await
    }

    /// Delete a session record and its token index entry.
    pub async fn delete(&self, session: &Session) -> AuthResult<()> {
        let batch = WriteBatch::new()
            .delete(RecordStore::<Session>::key(&session.id))
            .push(TOKEN_INDEX.remove_op(&session.token_hash));
        self.kv.apply(batch).await?;
        Ok(())
    }

    /// Drop every expired session record. Returns how many went.
    pub async fn purge_expired(&self) -> AuthResult<usize> {
        let now = Utc::now();
        let mut purged = 0;
        for session in self.records.all().await? {
            if session.expires_at <= now {
                self.delete(&session).await?;
                purged += 1;
            }
        }
        Ok(purged)
    }

    async fn remove_by_digest(&self, token_hash: &str) -> AuthResult<bool> {
        let Some(id) = TOKEN_INDEX.get(self.kv.as_ref(), token_hash).await? else {
            return Ok(false);
        };
        match self.records.find(&id).await? {
            Some(session) => {
                self.delete(&session).await?;
                Ok(true)
            }
            None => {
                let batch = WriteBatch::new().push(TOKEN_INDEX.remove_op(token_hash));
                self.kv.apply(batch).await?;
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::JwtConfig;
    use crate::store::MemoryStore;

    fn service(kv: Arc<MemoryStore>) -> SessionService {
        let jwt = TokenSigner::new(JwtConfig {
            secret: "test_secret_key_for_testing_only".to_string(),
            ..JwtConfig::default()
        });
        SessionService::new(kv, jwt)
    }

    #[tokio::test]
    async fn test_session_creation_persists_record_and_index() {
        let kv = Arc::new(MemoryStore::new());
        let sessions = service(kv.clone());

        let (session, token, expires_at) = sessions
            .create_session(
                "admin@example.com",
                Some("Test Agent".to_string()),
                Some("127.0.0.1".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(session.admin_email, "admin@example.com");
        assert!(expires_at > Utc::now());
        // Raw token is never stored, only its digest.
        assert_ne!(session.token_hash, token);

        let keys = kv.scan_keys("session:").await.unwrap();
        assert_eq!(keys.len(), 2);
    }

    #[tokio::test]
    async fn test_verify_returns_claims() {
        let kv = Arc::new(MemoryStore::new());
        let sessions = service(kv);

        let (session, token, _) = sessions
            .create_session("admin@example.com", None, None)
            .await
            .unwrap();

        let claims = sessions.verify(&token).await.unwrap();
        assert_eq!(claims.sub, "admin@example.com");
        assert_eq!(claims.sid, session.id);
    }

    #[tokio::test]
    async fn test_revoked_session_stops_verifying() {
        let kv = Arc::new(MemoryStore::new());
        let sessions = service(kv.clone());

        let (_, token, _) = sessions
            .create_session("admin@example.com", None, None)
            .await
            .unwrap();

        assert!(sessions.revoke(&token).await.unwrap());

        let result = sessions.verify(&token).await;
        assert!(matches!(result, Err(AuthError::SessionInvalid)));

        // Revoking again is a no-op.
        assert!(!sessions.revoke(&token).await.unwrap());

        // Record and index are both gone.
        assert!(kv.scan_keys("session:").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_garbage_token_rejected() {
        let kv = Arc::new(MemoryStore::new());
        let sessions = service(kv);

        let result = sessions.verify("not.a.token").await;
        assert!(matches!(
            result,
            Err(AuthError::MalformedToken) | Err(AuthError::InvalidSignature)
        ));
    }
}
