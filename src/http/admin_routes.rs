//! Protected dashboard endpoints.
//!
//! Every handler takes `AdminAuth`, so an invalid or missing bearer
//! token is rejected before any of this code runs. List endpoints
//! paginate in the handler; stores return full sorted sets.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use serde::Deserialize;
use serde_json::json;

use crate::api::{paginate, ApiError, ApiJson, ApiQuery, PageParams, RequestContext};
use crate::model::{
    MessageStatus, SendNewsletterRequest, SubscriberStatus, UpdateFeatureRequest,
    UpdateMessageRequest,
};
use crate::service::ServiceError;

use super::extract::AdminAuth;
use super::state::AppState;

pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/messages", get(list_messages_handler))
        .route(
            "/messages/:id",
            get(get_message_handler)
                .patch(update_message_handler)
                .delete(delete_message_handler),
        )
        .route("/subscribers", get(list_subscribers_handler))
        .route("/subscribers/:id", delete(delete_subscriber_handler))
        .route("/newsletter/send", post(send_newsletter_handler))
        .route(
            "/features/:id",
            patch(update_feature_handler).delete(delete_feature_handler),
        )
        .route("/notifications", get(list_notifications_handler))
        .route("/notifications/read-all", post(read_all_notifications_handler))
        .route(
            "/notifications/:id",
            patch(update_notification_handler).delete(delete_notification_handler),
        )
        .route("/audit", get(list_audit_handler))
        .route("/sessions/purge", post(purge_sessions_handler))
}

/// `pageSize` etc. arrive as separate optional fields because the
/// query-string deserializer cannot flatten into `PageParams`.
fn page_params(page: Option<u64>, page_size: Option<u64>) -> PageParams {
    let defaults = PageParams::default();
    PageParams {
        page: page.unwrap_or(defaults.page),
        page_size: page_size.unwrap_or(defaults.page_size),
    }
}

// ==================
// Messages
// ==================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListParams {
    status: Option<MessageStatus>,
    page: Option<u64>,
    page_size: Option<u64>,
}

async fn list_messages_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    ApiQuery(ctx, params): ApiQuery<MessageListParams>,
) -> Response {
    match state.contact.list(params.status).await {
        Ok(messages) => {
            let (page, pagination) =
                paginate(messages, &page_params(params.page, params.page_size));
            ctx.paged(page, pagination)
        }
        Err(err) => super::fail(&ctx, "admin.messages.list", &err),
    }
}

async fn get_message_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> Response {
    match state.contact.get(&id).await {
        Ok(message) => ctx.ok(message),
        Err(err) => super::fail(&ctx, "admin.messages.get", &err),
    }
}

async fn update_message_handler(
    State(state): State<Arc<AppState>>,
    AdminAuth(claims): AdminAuth,
    Path(id): Path<String>,
    ApiJson(ctx, request): ApiJson<UpdateMessageRequest>,
) -> Response {
    match state
        .contact
        .set_status(&id, request.status, &claims.sub, ctx.client_info().ip)
        .await
    {
        Ok(message) => ctx.ok_with_message(message, "Message updated"),
        Err(err) => super::fail(&ctx, "admin.messages.update", &err),
    }
}

async fn delete_message_handler(
    State(state): State<Arc<AppState>>,
    AdminAuth(claims): AdminAuth,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> Response {
    match state
        .contact
        .delete(&id, &claims.sub, ctx.client_info().ip)
        .await
    {
        Ok(()) => ctx.ok_with_message(json!({ "deleted": true }), "Message deleted"),
        Err(err) => super::fail(&ctx, "admin.messages.delete", &err),
    }
}

// ==================
// Subscribers
// ==================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriberListParams {
    status: Option<SubscriberStatus>,
    page: Option<u64>,
    page_size: Option<u64>,
}

async fn list_subscribers_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    ApiQuery(ctx, params): ApiQuery<SubscriberListParams>,
) -> Response {
    match state.newsletter.list(params.status).await {
        Ok(subscribers) => {
            let (page, pagination) =
                paginate(subscribers, &page_params(params.page, params.page_size));
            ctx.paged(page, pagination)
        }
        Err(err) => super::fail(&ctx, "admin.subscribers.list", &err),
    }
}

async fn delete_subscriber_handler(
    State(state): State<Arc<AppState>>,
    AdminAuth(claims): AdminAuth,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> Response {
    match state
        .newsletter
        .remove(&id, &claims.sub, ctx.client_info().ip)
        .await
    {
        Ok(()) => ctx.ok_with_message(json!({ "deleted": true }), "Subscriber removed"),
        Err(err) => super::fail(&ctx, "admin.subscribers.delete", &err),
    }
}

async fn send_newsletter_handler(
    State(state): State<Arc<AppState>>,
    AdminAuth(claims): AdminAuth,
    ApiJson(ctx, request): ApiJson<SendNewsletterRequest>,
) -> Response {
    match state
        .newsletter
        .send_issue(request, &claims.sub, ctx.client_info().ip)
        .await
    {
        Ok(report) => ctx.ok_with_message(report, "Newsletter dispatched"),
        Err(err) => super::fail(&ctx, "admin.newsletter.send", &err),
    }
}

// ==================
// Features
// ==================

async fn update_feature_handler(
    State(state): State<Arc<AppState>>,
    AdminAuth(claims): AdminAuth,
    Path(id): Path<String>,
    ApiJson(ctx, request): ApiJson<UpdateFeatureRequest>,
) -> Response {
    match state
        .features
        .set_status(&id, request.status, &claims.sub, ctx.client_info().ip)
        .await
    {
        Ok(feature) => ctx.ok_with_message(feature, "Feature updated"),
        Err(err) => super::fail(&ctx, "admin.features.update", &err),
    }
}

async fn delete_feature_handler(
    State(state): State<Arc<AppState>>,
    AdminAuth(claims): AdminAuth,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> Response {
    match state
        .features
        .delete(&id, &claims.sub, ctx.client_info().ip)
        .await
    {
        Ok(()) => ctx.ok_with_message(json!({ "deleted": true }), "Feature request deleted"),
        Err(err) => super::fail(&ctx, "admin.features.delete", &err),
    }
}

// ==================
// Notifications
// ==================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationListParams {
    unread: Option<bool>,
    page: Option<u64>,
    page_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct UpdateNotificationRequest {
    read: bool,
}

async fn list_notifications_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    ApiQuery(ctx, params): ApiQuery<NotificationListParams>,
) -> Response {
    match state.notifications.list(params.unread.unwrap_or(false)).await {
        Ok(notifications) => {
            let (page, pagination) =
                paginate(notifications, &page_params(params.page, params.page_size));
            ctx.paged(page, pagination)
        }
        Err(err) => super::fail(&ctx, "admin.notifications.list", &err),
    }
}

async fn update_notification_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Path(id): Path<String>,
    ApiJson(ctx, request): ApiJson<UpdateNotificationRequest>,
) -> Response {
    if !request.read {
        return ctx.failure(&ApiError::bad_request(
            "Notifications can only be marked read",
        ));
    }
    match state.notifications.mark_read(&id).await {
        Ok(notification) => ctx.ok_with_message(notification, "Notification marked read"),
        Err(err) => super::fail(&ctx, "admin.notifications.update", &err),
    }
}

async fn read_all_notifications_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    ctx: RequestContext,
) -> Response {
    match state.notifications.mark_all_read().await {
        Ok(updated) => {
            ctx.ok_with_message(json!({ "updated": updated }), "All notifications marked read")
        }
        Err(err) => super::fail(&ctx, "admin.notifications.read_all", &err),
    }
}

async fn delete_notification_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> Response {
    match state.notifications.delete(&id).await {
        Ok(()) => ctx.ok_with_message(json!({ "deleted": true }), "Notification deleted"),
        Err(err) => super::fail(&ctx, "admin.notifications.delete", &err),
    }
}

// ==================
// Audit and sessions
// ==================

async fn list_audit_handler(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    ApiQuery(ctx, params): ApiQuery<PageParams>,
) -> Response {
    match state.audit.list().await {
        Ok(entries) => {
            let (page, pagination) = paginate(entries, &params);
            ctx.paged(page, pagination)
        }
        Err(err) => super::fail(&ctx, "admin.audit.list", &ServiceError::from(err)),
    }
}

async fn purge_sessions_handler(
    State(state): State<Arc<AppState>>,
    AdminAuth(claims): AdminAuth,
    ctx: RequestContext,
) -> Response {
    match state.auth.purge_expired(&claims.sub).await {
        Ok(purged) => ctx.ok_with_message(json!({ "purged": purged }), "Expired sessions purged"),
        Err(err) => super::fail(&ctx, "admin.sessions.purge", &err),
    }
}
