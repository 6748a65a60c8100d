//! Authentication extractor for protected routes.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::response::Response;

use crate::api::{ApiError, RequestContext};
use crate::auth::SessionClaims;

use super::state::AppState;

/// Claims of the verified admin session. Adding this to a handler's
/// arguments makes the route require a valid bearer token.
pub struct AdminAuth(pub SessionClaims);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let ctx = RequestContext::from_parts(parts);
        let Some(token) = bearer_token(&parts.headers) else {
            return Err(ctx.failure(&ApiError::unauthorized("Authentication required")));
        };
        match state.auth.verify(token).await {
            Ok(claims) => Ok(AdminAuth(claims)),
            Err(err) => Err(super::fail(&ctx, "auth", &err)),
        }
    }
}

/// Token from an `Authorization: Bearer ...` header, if well formed.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
