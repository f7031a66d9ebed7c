//! HTTP route handlers for the marketplace.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                  - Liveness check
//! GET    /health/ready            - Readiness check (store ping)
//!
//! # Products
//! GET    /products/search         - Search (q, lat, lng, radius, category, tags, limit)
//! GET    /products/{id}           - Product detail
//! PATCH  /products/{id}           - Update price/stock/availability (owner only)
//!
//! # Cart (requires session)
//! GET    /cart                    - Cart with subtotal
//! DELETE /cart                    - Empty the cart
//! POST   /cart/items              - Add a product
//! DELETE /cart/items/{id}         - Remove a line
//!
//! # Orders
//! POST   /orders/calculate-fees   - Fee quote for a subtotal
//! POST   /orders/checkout         - Place order from cart (requires session)
//! GET    /orders                  - Order history (requires session)
//! GET    /orders/{id}             - Order detail (requires session)
//! ```

pub mod cart;
pub mod orders;
pub mod products;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
};

use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/search", get(products::search_products))
        .route("/{id}", get(products::show).patch(products::update))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add))
        .route("/items/{id}", delete(cart::remove))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list))
        .route("/calculate-fees", post(orders::calculate_fees))
        .route("/checkout", post(orders::checkout))
        .route("/{id}", get(orders::show))
}

/// Create all routes for the marketplace.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
