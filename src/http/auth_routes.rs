//! Admin authentication endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::api::{ApiError, ApiJson, RequestContext};
use crate::service::LoginRequest;

use super::extract::{bearer_token, AdminAuth};
use super::state::AppState;

pub fn auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login_handler))
        .route("/me", get(me_handler))
        .route("/logout", post(logout_handler))
}

async fn login_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(ctx, request): ApiJson<LoginRequest>,
) -> Response {
    match state.auth.login(request, &ctx.client_info()).await {
        Ok(session) => ctx.ok_with_message(session, "Login successful"),
        Err(err) => super::fail(&ctx, "auth.login", &err),
    }
}

async fn me_handler(AdminAuth(claims): AdminAuth, ctx: RequestContext) -> Response {
    ctx.ok(json!({
        "email": claims.sub,
        "sessionId": claims.sid,
        "expiresAt": DateTime::<Utc>::from_timestamp(claims.exp, 0),
    }))
}

async fn logout_handler(
    State(state): State<Arc<AppState>>,
    AdminAuth(claims): AdminAuth,
    ctx: RequestContext,
    headers: HeaderMap,
) -> Response {
    // AdminAuth already proved the header is present and valid.
    let Some(token) = bearer_token(&headers) else {
        return ctx.failure(&ApiError::unauthorized("Authentication required"));
    };
    match state
        .auth
        .logout(token, &claims.sub, ctx.client_info().ip)
        .await
    {
        Ok(_) => ctx.ok_with_message(json!({ "loggedOut": true }), "Logged out"),
        Err(err) => super::fail(&ctx, "auth.logout", &err),
    }
}
