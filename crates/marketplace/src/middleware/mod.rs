//! HTTP middleware for the marketplace.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions with `PostgreSQL` store)

pub mod auth;
pub mod session;

pub use auth::{RequireUser, set_current_user};
pub use session::{SESSION_COOKIE_NAME, create_session_layer};
