//! # HTTP Server Module
//!
//! Axum routing for the public site endpoints and the admin dashboard.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/api/auth/*` - Admin login and session management
//! - `/api/contact` - Contact form submission
//! - `/api/newsletter/*` - Subscribe and unsubscribe
//! - `/api/features/*` - Feature requests and voting
//! - `/api/admin/*` - Protected dashboard endpoints

pub mod admin_routes;
pub mod auth_routes;
pub mod config;
pub mod contact_routes;
pub mod extract;
pub mod feature_routes;
pub mod newsletter_routes;
pub mod server;
pub mod state;

pub use config::HttpConfig;
pub use extract::AdminAuth;
pub use server::{build_router, serve};
pub use state::AppState;

use axum::response::Response;

use crate::api::RequestContext;
use crate::service::ServiceError;

/// Log a failed operation and wrap it in a failure envelope.
/// Server faults log at error, client faults at warn.
pub(crate) fn fail(ctx: &RequestContext, operation: &str, err: &ServiceError) -> Response {
    let api_error = err.api_error();
    if api_error.status().is_server_error() {
        tracing::error!(operation, error = %err, "request failed");
    } else {
        tracing::warn!(operation, error = %err, "request rejected");
    }
    ctx.failure(&api_error)
}
