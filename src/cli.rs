//! CLI argument definitions and dispatch using clap
//!
//! Commands:
//! - folio serve (default when no subcommand is given)
//! - folio hash-password <password>

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::auth::crypto::hash_password;
use crate::config::AppConfig;
use crate::email::build_mailer;
use crate::http::{self, AppState};
use crate::store::{KvStore, RedisStore};

/// Folio - a self-hostable portfolio backend
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the API server
    Serve,

    /// Hash a password for FOLIO_ADMIN_PASSWORD_HASH
    HashPassword {
        /// Plaintext password to hash
        password: String,
    },
}

/// Parse arguments and run the selected command.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::HashPassword { password } => {
            println!("{}", hash_password(&password)?);
            Ok(())
        }
    }
}

async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    crate::logging::init_tracing();

    let config = AppConfig::from_env()?;
    // The URL may embed a password, so it is never logged.
    let kv: Arc<dyn KvStore> = Arc::new(RedisStore::connect(&config.redis_url).await?);
    tracing::info!("connected to store");

    let mailer = build_mailer(config.email.clone());
    let state = Arc::new(AppState::new(kv, mailer, &config));

    if config.session_sweep_secs > 0 {
        spawn_session_sweeper(state.auth.clone(), config.session_sweep_secs);
    }

    http::serve(&config.http, state).await?;
    Ok(())
}

/// Purge expired session records on a fixed interval.
fn spawn_session_sweeper(auth: crate::service::AuthService, every_secs: u64) {
    let every = std::time::Duration::from_secs(every_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately; skip it so the sweep
        // waits a full interval after boot.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(err) = auth.purge_expired("system").await {
                tracing::warn!(error = %err, "session sweep failed");
            }
        }
    });
}
