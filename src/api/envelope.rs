//! Response envelope shared by every endpoint.
//!
//! Every payload, success or failure, travels inside the same wrapper
//! so clients parse one shape: a `success` flag, the `data` or `error`
//! member, and request-scoped `metadata`. List endpoints additionally
//! carry pagination inside the metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::ApiError;

/// Upper bound on `pageSize`; larger requests are clamped, not rejected.
pub const MAX_PAGE_SIZE: u64 = 100;
const DEFAULT_PAGE_SIZE: u64 = 20;

/// The wrapper around every response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub error: Option<ErrorBody>,
    pub metadata: ResponseMeta,
}

impl<T> Envelope<T> {
    /// Successful envelope, optionally with a human-readable note.
    pub fn success(data: T, message: Option<String>, metadata: ResponseMeta) -> Self {
        Self {
            success: true,
            data: Some(data),
            message,
            error: None,
            metadata,
        }
    }
}

impl Envelope<Value> {
    /// Failure envelope; `data` is always null.
    pub fn failure(error: &ApiError, metadata: ResponseMeta) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(ErrorBody::from_error(error)),
            metadata,
        }
    }
}

/// Error member of a failure envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorBody {
    pub fn from_error(error: &ApiError) -> Self {
        Self {
            code: error.code.as_str().to_string(),
            message: error.message.clone(),
            details: error.details.clone(),
        }
    }
}

/// Request-scoped metadata attached to every envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    pub request_id: String,
    /// Unix milliseconds at the moment the envelope was built.
    pub server_timestamp: i64,
    /// Milliseconds spent handling the request.
    pub processing_time: u64,
    pub server_time_zone: &'static str,
    pub api_version: &'static str,
    pub request_method: String,
    pub request_path: String,
    pub user_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

/// Pagination block for list responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub page_size: u64,
    pub total_items: u64,
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

/// Query parameters accepted by list endpoints.
///
/// Out-of-range values are clamped rather than rejected, so a stale
/// bookmark with `page=0` still answers.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_page_size", rename = "pageSize")]
    pub page_size: u64,
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl PageParams {
    fn clamped(&self) -> (u64, u64) {
        let page = self.page.max(1);
        let page_size = self.page_size.clamp(1, MAX_PAGE_SIZE);
        (page, page_size)
    }
}

/// Slice `items` down to the requested page.
///
/// A page past the end yields an empty slice with the counts intact, so
/// clients can tell "no such page" from "no items at all".
pub fn paginate<T>(items: Vec<T>, params: &PageParams) -> (Vec<T>, Pagination) {
    let (page, page_size) = params.clamped();
    let total_items = items.len() as u64;
    let total_pages = total_items.div_ceil(page_size);

    let skip = (page - 1).saturating_mul(page_size) as usize;
    let page_items: Vec<T> = items.into_iter().skip(skip).take(page_size as usize).collect();

    let pagination = Pagination {
        page,
        page_size,
        total_items,
        total_pages,
        has_next_page: page < total_pages,
        has_previous_page: page > 1 && total_pages > 0,
    };
    (page_items, pagination)
}
