//! Public contact form endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use serde_json::json;

use crate::api::ApiJson;
use crate::model::SubmitMessageRequest;

use super::state::AppState;

pub fn contact_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", post(submit_handler))
}

async fn submit_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(ctx, request): ApiJson<SubmitMessageRequest>,
) -> Response {
    match state.contact.submit(request, &ctx.client_info()).await {
        Ok(message) => ctx.created(
            json!({ "messageId": message.id }),
            "Message received. Thanks for reaching out!",
        ),
        Err(err) => super::fail(&ctx, "contact.submit", &err),
    }
}
