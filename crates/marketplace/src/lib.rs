//! Farmstand marketplace library.
//!
//! The HTTP service is exposed as a library so the binary, the CLI and the
//! integration tests share one router and one set of stores.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the application router with tracing, without session or Sentry layers.
///
/// Callers add the session layer that fits their store (`PostgreSQL` in
/// production, in-memory in tests).
pub fn app(state: AppState) -> Router {
    routes::routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
