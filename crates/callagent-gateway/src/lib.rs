//! # CallAgent Gateway
//! JSON HTTP API over the report store, statistics, settings, and webhooks.

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
