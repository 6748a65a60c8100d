//! Tracing configuration.
//!
//! Logs go to stdout with a compact formatter. `RUST_LOG` controls
//! filtering and defaults to `info`.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Configure the global tracing subscriber. Call once at startup.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .init();
}
