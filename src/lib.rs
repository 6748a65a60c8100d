//! folio - a self-hostable portfolio backend
//!
//! Contact messages, newsletter subscribers, feature requests with
//! voting, and an admin dashboard API over a Redis-backed record store.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod email;
pub mod http;
pub mod logging;
pub mod model;
pub mod ratelimit;
pub mod service;
pub mod store;
