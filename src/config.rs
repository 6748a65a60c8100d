//! Application configuration from environment variables.
//!
//! All variables use the `FOLIO_` prefix. Only the JWT secret and the
//! admin account are required; everything else has a development
//! default. A `.env` file is honored when present (see `main.rs`).

use std::str::FromStr;

use thiserror::Error;

use crate::auth::crypto::hash_password;
use crate::auth::JwtConfig;
use crate::email::EmailConfig;
use crate::http::HttpConfig;
use crate::ratelimit::Quota;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVariable(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Per-scope request quotas.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub contact: Quota,
    pub login: Quota,
    pub subscribe: Quota,
    pub feature: Quota,
    pub vote: Quota,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            contact: Quota::new(3, 3600),
            login: Quota::new(5, 900),
            subscribe: Quota::new(5, 3600),
            feature: Quota::new(5, 3600),
            vote: Quota::new(30, 3600),
        }
    }
}

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub redis_url: String,
    pub jwt_secret: String,
    /// Session lifetime in seconds.
    pub session_ttl_secs: u64,
    /// How often the background sweeper purges expired sessions.
    /// Zero disables the sweeper.
    pub session_sweep_secs: u64,
    pub admin_email: String,
    pub admin_password_hash: String,
    /// Where contact form notifications are mailed.
    pub contact_recipient: String,
    /// Public base URL, used in links inside outbound email.
    pub public_url: String,
    /// SMTP settings; None sends mail to the mock sender.
    pub email: Option<EmailConfig>,
    pub rate_limits: RateLimits,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let http = HttpConfig {
            host: load_env_optional("FOLIO_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_env("FOLIO_PORT", 8080)?,
            cors_origins: load_env_optional("FOLIO_CORS_ORIGINS")
                .map(|raw| parse_origins(&raw))
                .unwrap_or_default(),
        };

        let jwt_secret = load_env("FOLIO_JWT_SECRET")?;
        let session_ttl_secs = parse_env("FOLIO_SESSION_TTL_SECS", 3600)?;
        if session_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "FOLIO_SESSION_TTL_SECS",
                reason: "must be at least 1".to_string(),
            });
        }
        let session_sweep_secs = parse_env("FOLIO_SESSION_SWEEP_SECS", 3600)?;

        let admin_email = crate::model::normalize_email(&load_env("FOLIO_ADMIN_EMAIL")?);
        let admin_password_hash = match load_env_optional("FOLIO_ADMIN_PASSWORD_HASH") {
            Some(hash) => hash,
            None => {
                let password = load_env_optional("FOLIO_ADMIN_PASSWORD").ok_or(
                    ConfigError::MissingVariable(
                        "FOLIO_ADMIN_PASSWORD_HASH or FOLIO_ADMIN_PASSWORD",
                    ),
                )?;
                tracing::warn!(
                    "hashing FOLIO_ADMIN_PASSWORD at startup; prefer FOLIO_ADMIN_PASSWORD_HASH"
                );
                hash_password(&password).map_err(|err| ConfigError::InvalidValue {
                    key: "FOLIO_ADMIN_PASSWORD",
                    reason: err.to_string(),
                })?
            }
        };

        let contact_recipient =
            load_env_optional("FOLIO_CONTACT_RECIPIENT").unwrap_or_else(|| admin_email.clone());
        let public_url = load_env_optional("FOLIO_PUBLIC_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", http.port));

        let email = match load_env_optional("FOLIO_SMTP_HOST") {
            Some(smtp_host) => Some(EmailConfig {
                smtp_host,
                smtp_port: parse_env("FOLIO_SMTP_PORT", 587)?,
                smtp_user: load_env_optional("FOLIO_SMTP_USER").unwrap_or_default(),
                smtp_password: load_env_optional("FOLIO_SMTP_PASSWORD").unwrap_or_default(),
                from_email: load_env_optional("FOLIO_SMTP_FROM")
                    .unwrap_or_else(|| "noreply@folio.local".to_string()),
                from_name: load_env_optional("FOLIO_SMTP_FROM_NAME")
                    .unwrap_or_else(|| "Folio".to_string()),
            }),
            None => None,
        };

        let defaults = RateLimits::default();
        let rate_limits = RateLimits {
            contact: quota_env("FOLIO_RATE_CONTACT", defaults.contact)?,
            login: quota_env("FOLIO_RATE_LOGIN", defaults.login)?,
            subscribe: quota_env("FOLIO_RATE_SUBSCRIBE", defaults.subscribe)?,
            feature: quota_env("FOLIO_RATE_FEATURE", defaults.feature)?,
            vote: quota_env("FOLIO_RATE_VOTE", defaults.vote)?,
        };

        Ok(Self {
            http,
            redis_url: load_env_optional("FOLIO_REDIS_URL")
                .unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            jwt_secret,
            session_ttl_secs,
            session_sweep_secs,
            admin_email,
            admin_password_hash,
            contact_recipient,
            public_url,
            email,
            rate_limits,
        })
    }

    /// JWT settings derived from this configuration.
    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig {
            secret: self.jwt_secret.clone(),
            token_ttl: chrono::Duration::seconds(self.session_ttl_secs as i64),
            ..JwtConfig::default()
        }
    }
}

/// Required variable; empty counts as missing.
fn load_env(key: &'static str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or(ConfigError::MissingVariable(key))
}

/// Optional variable; trimmed, empty treated as unset.
fn load_env_optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_env<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match load_env_optional(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|err: T::Err| ConfigError::InvalidValue {
            key,
            reason: err.to_string(),
        }),
    }
}

fn quota_env(key: &'static str, default: Quota) -> Result<Quota, ConfigError> {
    match load_env_optional(key) {
        None => Ok(default),
        Some(raw) => Quota::parse(&raw).ok_or_else(|| ConfigError::InvalidValue {
            key,
            reason: format!("expected \"limit/window_secs\", got \"{}\"", raw),
        }),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("https://a.example, https://b.example ,"),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert!(parse_origins("  ").is_empty());
    }

    #[test]
    fn test_default_rate_limits() {
        let limits = RateLimits::default();
        assert_eq!(limits.contact, Quota::new(3, 3600));
        assert_eq!(limits.login, Quota::new(5, 900));
        assert_eq!(limits.vote, Quota::new(30, 3600));
    }

    #[test]
    fn test_jwt_config_carries_ttl() {
        let config = AppConfig {
            http: HttpConfig::default(),
            redis_url: String::new(),
            jwt_secret: "s".to_string(),
            session_ttl_secs: 120,
            session_sweep_secs: 0,
            admin_email: "admin@example.com".to_string(),
            admin_password_hash: String::new(),
            contact_recipient: "admin@example.com".to_string(),
            public_url: "http://localhost:8080".to_string(),
            email: None,
            rate_limits: RateLimits::default(),
        };
        let jwt = config.jwt_config();
        assert_eq!(jwt.secret, "s");
        assert_eq!(jwt.token_ttl, chrono::Duration::seconds(120));
    }
}
