//! Public feature request endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;

use crate::api::{ApiJson, RequestContext};
use crate::model::SubmitFeatureRequest;

use super::state::AppState;

pub fn feature_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_handler).post(submit_handler))
        .route("/:id/vote", post(vote_handler))
}

/// Public list, most voted first.
async fn list_handler(State(state): State<Arc<AppState>>, ctx: RequestContext) -> Response {
    match state.features.list(None).await {
        Ok(features) => ctx.ok(features),
        Err(err) => super::fail(&ctx, "features.list", &err),
    }
}

async fn submit_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(ctx, request): ApiJson<SubmitFeatureRequest>,
) -> Response {
    match state.features.submit(request, &ctx.client_info()).await {
        Ok(feature) => ctx.created(feature, "Feature request recorded"),
        Err(err) => super::fail(&ctx, "features.submit", &err),
    }
}

async fn vote_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> Response {
    match state.features.vote(&id, &ctx.client_info()).await {
        Ok(votes) => ctx.ok_with_message(json!({ "votes": votes }), "Vote counted"),
        Err(err) => super::fail(&ctx, "features.vote", &err),
    }
}
