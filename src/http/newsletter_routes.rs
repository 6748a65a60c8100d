//! Public newsletter endpoints.
//!
//! Unsubscribe is a GET so the link in an email works without a client.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::json;

use crate::api::{ApiError, ApiJson, ApiQuery};
use crate::model::SubscribeRequest;

use super::state::AppState;

pub fn newsletter_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/subscribe", post(subscribe_handler))
        .route("/unsubscribe", get(unsubscribe_handler))
}

async fn subscribe_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(ctx, request): ApiJson<SubscribeRequest>,
) -> Response {
    match state.newsletter.subscribe(request, &ctx.client_info()).await {
        Ok(outcome) if outcome.already_subscribed => ctx.ok_with_message(
            json!({ "email": outcome.subscriber.email }),
            "Already subscribed",
        ),
        Ok(outcome) => ctx.created(
            json!({ "email": outcome.subscriber.email }),
            "Subscribed. Welcome aboard!",
        ),
        Err(err) => super::fail(&ctx, "newsletter.subscribe", &err),
    }
}

#[derive(Debug, Deserialize)]
struct UnsubscribeParams {
    token: Option<String>,
}

async fn unsubscribe_handler(
    State(state): State<Arc<AppState>>,
    ApiQuery(ctx, params): ApiQuery<UnsubscribeParams>,
) -> Response {
    let token = params.token.as_deref().map(str::trim).unwrap_or_default();
    if token.is_empty() {
        return ctx.failure(&ApiError::bad_request("Missing unsubscribe token"));
    }
    match state.newsletter.unsubscribe(token).await {
        Ok(subscriber) => ctx.ok_with_message(
            json!({ "email": subscriber.email }),
            "You have been unsubscribed",
        ),
        Err(err) => super::fail(&ctx, "newsletter.unsubscribe", &err),
    }
}
