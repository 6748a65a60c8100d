//! Request context and envelope-aware extractors.
//!
//! [`RequestContext`] captures the per-request facts the envelope
//! metadata needs (id, route, caller identity, start time) and builds
//! the responses handlers return. [`ApiJson`] and [`ApiQuery`] wrap the
//! axum extractors so malformed input comes back as a failure envelope
//! instead of axum's plain-text rejection.

use std::convert::Infallible;
use std::time::Instant;

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use super::envelope::{Envelope, Pagination, ResponseMeta};
use super::errors::ApiError;

/// Who sent the request, as far as proxies let us tell.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    /// Identity used for rate limiting. Callers behind a proxy that
    /// strips forwarding headers all share the `"unknown"` bucket.
    pub fn key(&self) -> &str {
        self.ip.as_deref().unwrap_or("unknown")
    }
}

/// Per-request facts threaded into every envelope.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub user_agent: Option<String>,
    pub client_ip: Option<String>,
    started: Instant,
}

impl RequestContext {
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            user_agent: header_value(parts, "user-agent"),
            client_ip: client_ip(parts),
            started: Instant::now(),
        }
    }

    pub fn client_info(&self) -> ClientInfo {
        ClientInfo {
            ip: self.client_ip.clone(),
            user_agent: self.user_agent.clone(),
        }
    }

    fn meta(&self, pagination: Option<Pagination>) -> ResponseMeta {
        ResponseMeta {
            request_id: self.request_id.clone(),
            server_timestamp: Utc::now().timestamp_millis(),
            processing_time: self.started.elapsed().as_millis() as u64,
            server_time_zone: "UTC",
            api_version: env!("CARGO_PKG_VERSION"),
            request_method: self.method.clone(),
            request_path: self.path.clone(),
            user_agent: self
                .user_agent
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            client_ip: self.client_ip.clone(),
            pagination,
        }
    }

    /// 200 with data.
    pub fn ok<T: Serialize>(&self, data: T) -> Response {
        let envelope = Envelope::success(data, None, self.meta(None));
        (StatusCode::OK, Json(envelope)).into_response()
    }

    /// 200 with data and a human-readable note.
    pub fn ok_with_message<T: Serialize>(&self, data: T, message: impl Into<String>) -> Response {
        let envelope = Envelope::success(data, Some(message.into()), self.meta(None));
        (StatusCode::OK, Json(envelope)).into_response()
    }

    /// 201 with data and a note.
    pub fn created<T: Serialize>(&self, data: T, message: impl Into<String>) -> Response {
        let envelope = Envelope::success(data, Some(message.into()), self.meta(None));
        (StatusCode::CREATED, Json(envelope)).into_response()
    }

    /// 200 with a page of data and pagination metadata.
    pub fn paged<T: Serialize>(&self, data: Vec<T>, pagination: Pagination) -> Response {
        let envelope = Envelope::success(data, None, self.meta(Some(pagination)));
        (StatusCode::OK, Json(envelope)).into_response()
    }

    /// Failure envelope with the status the error code maps to.
    pub fn failure(&self, error: &ApiError) -> Response {
        let envelope = Envelope::failure(error, self.meta(None));
        (error.status(), Json(envelope)).into_response()
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Caller address as reported by the reverse proxy.
///
/// `X-Forwarded-For` lists hops client-first; only the first entry is
/// the caller. Falls back to `X-Real-IP`.
fn client_ip(parts: &Parts) -> Option<String> {
    if let Some(forwarded) = header_value(parts, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }
    header_value(parts, "x-real-ip")
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestContext::from_parts(parts))
    }
}

/// JSON body extractor that rejects with a failure envelope.
pub struct ApiJson<T>(pub RequestContext, pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();
        let ctx = RequestContext::from_parts(&parts);
        let req = Request::from_parts(parts, body);
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(ctx, value)),
            Err(rejection) => Err(ctx.failure(&ApiError::bad_request(rejection.body_text()))),
        }
    }
}

/// Query string extractor that rejects with a failure envelope.
pub struct ApiQuery<T>(pub RequestContext, pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ctx = RequestContext::from_parts(parts);
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(ctx, value)),
            Err(rejection) => Err(ctx.failure(&ApiError::bad_request(rejection.body_text()))),
        }
    }
}
