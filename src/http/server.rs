//! Router assembly and server lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::{ApiError, ErrorCode, RequestContext};

use super::admin_routes::admin_routes;
use super::auth_routes::auth_routes;
use super::config::HttpConfig;
use super::contact_routes::contact_routes;
use super::feature_routes::feature_routes;
use super::newsletter_routes::newsletter_routes;
use super::state::AppState;

/// Combine all endpoint routers into the application router.
pub fn build_router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    // Configure CORS from config
    let cors = if cors_origins.is_empty() {
        // If no origins configured, use permissive for development
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        // Use configured origins for production
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = cors_origins.iter().filter_map(|s| s.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/auth", auth_routes())
        .nest("/api/contact", contact_routes())
        .nest("/api/newsletter", newsletter_routes())
        .nest("/api/features", feature_routes())
        .nest("/api/admin", admin_routes())
        .fallback(not_found_handler)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Liveness plus a store round-trip.
async fn health_handler(State(state): State<Arc<AppState>>, ctx: RequestContext) -> Response {
    match state.kv.ping().await {
        Ok(()) => ctx.ok(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "store": "ok",
        })),
        Err(err) => {
            tracing::error!(error = %err, "store ping failed");
            ctx.failure(&ApiError::new(
                ErrorCode::ServiceUnavailable,
                "Store unreachable",
            ))
        }
    }
}

async fn not_found_handler(ctx: RequestContext) -> Response {
    ctx.failure(&ApiError::not_found("Route not found"))
}

/// Bind and run until the process is stopped.
pub async fn serve(config: &HttpConfig, state: Arc<AppState>) -> Result<(), std::io::Error> {
    let router = build_router(state, &config.cors_origins);
    let addr: SocketAddr = config
        .bind_addr()
        .parse()
        .expect("Invalid socket address");

    tracing::info!(%addr, "http server listening");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}
