//! End-to-end tests over the assembled router.
//!
//! Every request goes through the real extractors, handlers, and
//! services; only the store and the mailer are in-memory doubles.
//!
//! Covered here:
//! 1. Envelope invariants on success and failure
//! 2. Public endpoints: contact, newsletter, features
//! 3. Admin endpoints behind bearer auth
//! 4. Rate limiting and validation rejections
//! 5. Audit trail visibility

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use folio::auth::crypto::hash_password;
use folio::config::{AppConfig, RateLimits};
use folio::email::{MockMailer, OutboundEmail};
use folio::http::{build_router, AppState, HttpConfig};
use folio::store::{KvStore, MemoryStore};

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "correct horse battery staple";

fn test_config() -> AppConfig {
    AppConfig {
        http: HttpConfig::default(),
        redis_url: String::new(),
        jwt_secret: "test-secret".to_string(),
        session_ttl_secs: 3600,
        session_sweep_secs: 0,
        admin_email: ADMIN_EMAIL.to_string(),
        admin_password_hash: hash_password(ADMIN_PASSWORD).expect("hash"),
        contact_recipient: ADMIN_EMAIL.to_string(),
        public_url: "http://localhost:8080".to_string(),
        email: None,
        rate_limits: RateLimits::default(),
    }
}

fn test_app() -> (Router, Arc<MockMailer>) {
    let kv: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let mailer = Arc::new(MockMailer::new());
    let state = Arc::new(AppState::new(kv, mailer.clone(), &test_config()));
    (build_router(state, &[]), mailer)
}

async fn request(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let body: Value = serde_json::from_slice(&bytes).expect("json body");
    (status, body)
}

async fn login(app: &Router) -> String {
    let (status, body) = request(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["token"].as_str().expect("token").to_string()
}

fn timestamp(value: &Value) -> chrono::DateTime<chrono::Utc> {
    value
        .as_str()
        .expect("timestamp string")
        .parse()
        .expect("rfc3339 timestamp")
}

async fn submit_contact(app: &Router, name: &str) -> Value {
    let (status, body) = request(
        app,
        Method::POST,
        "/api/contact",
        None,
        Some(json!({
            "name": name,
            "email": format!("{}@example.com", name.to_lowercase()),
            "subject": "Hello",
            "message": "I would love to talk about your projects.",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

// =============================================================
// Envelope invariants
// =============================================================

#[tokio::test]
async fn test_health_reports_ok() {
    let (app, _) = test_app();
    let (status, body) = request(&app, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["store"], "ok");
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["metadata"]["requestId"].as_str().is_some());
}

#[tokio::test]
async fn test_success_envelope_shape() {
    let (app, mailer) = test_app();
    let body = submit_contact(&app, "Ada").await;

    assert_eq!(body["success"], true);
    assert!(body["data"]["messageId"].as_str().is_some());
    assert!(body["error"].is_null());
    assert_eq!(body["metadata"]["serverTimeZone"], "UTC");
    assert_eq!(body["metadata"]["apiVersion"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["metadata"]["requestMethod"], "POST");
    assert_eq!(body["metadata"]["requestPath"], "/api/contact");
    assert!(body["metadata"]["serverTimestamp"].as_i64().is_some());

    // The operator is notified by mail.
    assert_eq!(mailer.sent_count(), 1);
}

#[tokio::test]
async fn test_unknown_route_is_enveloped_not_found() {
    let (app, _) = test_app();
    let (status, body) = request(&app, Method::GET, "/api/nope", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body["data"].is_null());
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(body["metadata"]["requestPath"], "/api/nope");
}

#[tokio::test]
async fn test_malformed_json_is_enveloped_bad_request() {
    let (app, _) = test_app();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/contact")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .expect("request");
    let response = app.oneshot(req).await.expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let body: Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

// =============================================================
// Contact form
// =============================================================

#[tokio::test]
async fn test_contact_validation_reports_every_field() {
    let (app, mailer) = test_app();
    let (status, body) = request(
        &app,
        Method::POST,
        "/api/contact",
        None,
        Some(json!({ "name": "", "email": "not-an-email", "message": "" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    let fields = body["error"]["details"]["fields"]
        .as_array()
        .expect("field list");
    assert_eq!(fields.len(), 3);
    assert_eq!(mailer.sent_count(), 0);
}

#[tokio::test]
async fn test_contact_rate_limit_blocks_fourth_submission() {
    let (app, _) = test_app();
    for i in 0..3 {
        let (status, _) = request(
            &app,
            Method::POST,
            "/api/contact",
            None,
            Some(json!({
                "name": format!("Visitor {i}"),
                "email": "visitor@example.com",
                "message": "Hello there",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = request(
        &app,
        Method::POST,
        "/api/contact",
        None,
        Some(json!({
            "name": "Visitor 3",
            "email": "visitor@example.com",
            "message": "Hello again",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMITED");
    assert!(body["error"]["details"]["retryAfterSecs"].as_u64().unwrap() > 0);
}

// =============================================================
// Authentication
// =============================================================

#[tokio::test]
async fn test_admin_routes_require_bearer_token() {
    let (app, _) = test_app();
    let (status, body) =
        request(&app, Method::GET, "/api/admin/messages", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_login_rejects_wrong_password() {
    let (app, _) = test_app();
    let (status, body) = request(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": ADMIN_EMAIL, "password": "wrong" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    // A made-up token is rejected the same way.
    let (status, _) =
        request(&app, Method::GET, "/api/auth/me", Some("not.a.jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rate_limited_after_five_attempts() {
    let (app, _) = test_app();
    for _ in 0..5 {
        let (status, _) = request(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": ADMIN_EMAIL, "password": "wrong" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, body) = request(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn test_me_and_logout() {
    let (app, _) = test_app();
    let token = login(&app).await;

    let (status, body) =
        request(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], ADMIN_EMAIL);
    assert!(body["data"]["sessionId"].as_str().is_some());

    let (status, body) =
        request(&app, Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["loggedOut"], true);

    // The token dies with its session record.
    let (status, _) =
        request(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================
// Admin: messages
// =============================================================

#[tokio::test]
async fn test_admin_message_lifecycle() {
    let (app, _) = test_app();
    let created = submit_contact(&app, "Ada").await;
    let id = created["data"]["messageId"].as_str().expect("id").to_string();
    let token = login(&app).await;

    let (status, body) =
        request(&app, Method::GET, "/api/admin/messages", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"]["pagination"]["totalItems"], 1);
    assert_eq!(body["data"][0]["status"], "unread");
    let first_updated = timestamp(&body["data"][0]["updatedAt"]);

    let uri = format!("/api/admin/messages/{id}");
    let (status, body) = request(
        &app,
        Method::PATCH,
        &uri,
        Some(&token),
        Some(json!({ "status": "read" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "read");
    let second_updated = timestamp(&body["data"]["updatedAt"]);
    assert!(second_updated > first_updated);

    // Re-applying the same status still advances updatedAt.
    let (_, body) = request(
        &app,
        Method::PATCH,
        &uri,
        Some(&token),
        Some(json!({ "status": "read" })),
    )
    .await;
    assert!(timestamp(&body["data"]["updatedAt"]) > second_updated);

    let (status, _) = request(&app, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = request(&app, Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_message_status_filter_and_paging() {
    let (app, _) = test_app();
    let first = submit_contact(&app, "Ada").await;
    let first_id = first["data"]["messageId"].as_str().expect("id").to_string();
    submit_contact(&app, "Grace").await;
    let token = login(&app).await;

    let uri = format!("/api/admin/messages/{first_id}");
    request(
        &app,
        Method::PATCH,
        &uri,
        Some(&token),
        Some(json!({ "status": "read" })),
    )
    .await;

    let (_, body) = request(
        &app,
        Method::GET,
        "/api/admin/messages?status=read",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["metadata"]["pagination"]["totalItems"], 1);
    assert_eq!(body["data"][0]["id"], first_id.as_str());

    let (_, body) = request(
        &app,
        Method::GET,
        "/api/admin/messages?status=unread",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["metadata"]["pagination"]["totalItems"], 1);

    let (_, body) = request(
        &app,
        Method::GET,
        "/api/admin/messages?page=1&pageSize=1",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["data"].as_array().expect("page").len(), 1);
    assert_eq!(body["metadata"]["pagination"]["totalItems"], 2);
    assert_eq!(body["metadata"]["pagination"]["totalPages"], 2);
    assert_eq!(body["metadata"]["pagination"]["hasNextPage"], true);
}

// =============================================================
// Newsletter
// =============================================================

#[tokio::test]
async fn test_subscribe_deduplicates_by_email() {
    let (app, mailer) = test_app();
    let (status, _) = request(
        &app,
        Method::POST,
        "/api/newsletter/subscribe",
        None,
        Some(json!({ "email": "reader@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Same address, different case and padding.
    let (status, body) = request(
        &app,
        Method::POST,
        "/api/newsletter/subscribe",
        None,
        Some(json!({ "email": "  Reader@Example.COM " })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "reader@example.com");

    let token = login(&app).await;
    let (_, body) = request(
        &app,
        Method::GET,
        "/api/admin/subscribers",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["metadata"]["pagination"]["totalItems"], 1);

    // Only the first subscribe sends a welcome.
    assert_eq!(mailer.sent_count(), 1);
}

#[tokio::test]
async fn test_unsubscribe_via_emailed_token() {
    let (app, mailer) = test_app();
    request(
        &app,
        Method::POST,
        "/api/newsletter/subscribe",
        None,
        Some(json!({ "email": "reader@example.com" })),
    )
    .await;

    let token = mailer
        .sent()
        .iter()
        .find_map(|mail| match mail {
            OutboundEmail::SubscriberWelcome {
                unsubscribe_url, ..
            } => unsubscribe_url.split("token=").nth(1).map(str::to_string),
            _ => None,
        })
        .expect("welcome email with unsubscribe link");

    let uri = format!("/api/newsletter/unsubscribe?token={token}");
    let (status, body) = request(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "reader@example.com");

    // The link keeps working after the first click.
    let (status, _) = request(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);

    let admin = login(&app).await;
    let (_, body) = request(
        &app,
        Method::GET,
        "/api/admin/subscribers?status=unsubscribed",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(body["metadata"]["pagination"]["totalItems"], 1);
}

#[tokio::test]
async fn test_unsubscribe_requires_token() {
    let (app, _) = test_app();
    let (status, body) =
        request(&app, Method::GET, "/api/newsletter/unsubscribe", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_newsletter_send_reports_outcome() {
    let (app, mailer) = test_app();
    for email in ["one@example.com", "two@example.com"] {
        request(
            &app,
            Method::POST,
            "/api/newsletter/subscribe",
            None,
            Some(json!({ "email": email })),
        )
        .await;
    }

    let token = login(&app).await;
    let (status, body) = request(
        &app,
        Method::POST,
        "/api/admin/newsletter/send",
        Some(&token),
        Some(json!({ "subject": "Issue #1", "body": "Fresh work this month." })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["recipients"], 2);
    assert_eq!(body["data"]["sent"], 2);
    assert_eq!(body["data"]["failed"], 0);

    // Two welcomes plus two issues.
    assert_eq!(mailer.sent_count(), 4);
}

// =============================================================
// Feature requests
// =============================================================

#[tokio::test]
async fn test_feature_submit_vote_and_admin_updates() {
    let (app, _) = test_app();
    let (status, body) = request(
        &app,
        Method::POST,
        "/api/features",
        None,
        Some(json!({
            "title": "Dark mode",
            "description": "The site is blinding at night.",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["votes"], 0);
    let id = body["data"]["id"].as_str().expect("id").to_string();

    let vote_uri = format!("/api/features/{id}/vote");
    let (_, body) = request(&app, Method::POST, &vote_uri, None, None).await;
    assert_eq!(body["data"]["votes"], 1);
    let (_, body) = request(&app, Method::POST, &vote_uri, None, None).await;
    assert_eq!(body["data"]["votes"], 2);

    let (_, body) = request(&app, Method::GET, "/api/features", None, None).await;
    assert_eq!(body["data"][0]["votes"], 2);
    assert_eq!(body["data"][0]["status"], "proposed");

    let token = login(&app).await;
    let admin_uri = format!("/api/admin/features/{id}");
    let (status, body) = request(
        &app,
        Method::PATCH,
        &admin_uri,
        Some(&token),
        Some(json!({ "status": "planned" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "planned");

    let (status, _) =
        request(&app, Method::DELETE, &admin_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = request(&app, Method::GET, "/api/features", None, None).await;
    assert_eq!(body["data"].as_array().expect("list").len(), 0);
}

#[tokio::test]
async fn test_vote_on_missing_feature_is_not_found() {
    let (app, _) = test_app();
    let (status, body) = request(
        &app,
        Method::POST,
        "/api/features/nope/vote",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

// =============================================================
// Notifications and audit
// =============================================================

#[tokio::test]
async fn test_notification_read_flow() {
    let (app, _) = test_app();
    submit_contact(&app, "Ada").await;
    request(
        &app,
        Method::POST,
        "/api/newsletter/subscribe",
        None,
        Some(json!({ "email": "reader@example.com" })),
    )
    .await;
    let token = login(&app).await;

    let (_, body) = request(
        &app,
        Method::GET,
        "/api/admin/notifications?unread=true",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["metadata"]["pagination"]["totalItems"], 2);
    let first_id = body["data"][0]["id"].as_str().expect("id").to_string();

    let uri = format!("/api/admin/notifications/{first_id}");
    let (status, body) = request(
        &app,
        Method::PATCH,
        &uri,
        Some(&token),
        Some(json!({ "read": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["read"], true);

    // Un-reading is not a thing.
    let (status, _) = request(
        &app,
        Method::PATCH,
        &uri,
        Some(&token),
        Some(json!({ "read": false })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = request(
        &app,
        Method::POST,
        "/api/admin/notifications/read-all",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["data"]["updated"], 1);

    let (_, body) = request(
        &app,
        Method::GET,
        "/api/admin/notifications?unread=true",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["metadata"]["pagination"]["totalItems"], 0);

    let (status, _) = request(&app, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = request(
        &app,
        Method::GET,
        "/api/admin/notifications",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["metadata"]["pagination"]["totalItems"], 1);
}

#[tokio::test]
async fn test_audit_trail_records_admin_actions() {
    let (app, _) = test_app();
    let created = submit_contact(&app, "Ada").await;
    let id = created["data"]["messageId"].as_str().expect("id").to_string();
    let token = login(&app).await;

    let uri = format!("/api/admin/messages/{id}");
    request(&app, Method::DELETE, &uri, Some(&token), None).await;

    let (status, body) =
        request(&app, Method::GET, "/api/admin/audit", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<&str> = body["data"]
        .as_array()
        .expect("entries")
        .iter()
        .map(|entry| entry["action"].as_str().expect("action"))
        .collect();
    assert!(actions.contains(&"LOGIN_SUCCEEDED"));
    assert!(actions.contains(&"MESSAGE_DELETED"));

    let login_entry = body["data"]
        .as_array()
        .expect("entries")
        .iter()
        .find(|entry| entry["action"] == "LOGIN_SUCCEEDED")
        .expect("login entry");
    assert_eq!(login_entry["actor"], ADMIN_EMAIL);
    assert_eq!(login_entry["outcome"], "SUCCESS");
}

#[tokio::test]
async fn test_session_purge_reports_zero_when_nothing_expired() {
    let (app, _) = test_app();
    let token = login(&app).await;

    let (status, body) = request(
        &app,
        Method::POST,
        "/api/admin/sessions/purge",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["purged"], 0);
}
