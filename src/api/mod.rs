//! API conventions shared by every endpoint.
//!
//! Every response, success or failure, is wrapped in the same envelope
//! with request-scoped metadata. Handlers build responses through
//! [`RequestContext`] so the shape cannot drift between routes.

mod context;
mod envelope;
mod errors;

pub use context::{ApiJson, ApiQuery, ClientInfo, RequestContext};
pub use envelope::{paginate, Envelope, ErrorBody, PageParams, Pagination, ResponseMeta, MAX_PAGE_SIZE};
pub use errors::{ApiError, ErrorCode};
