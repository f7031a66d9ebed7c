//! Persistence for the marketplace.
//!
//! # Stores
//!
//! - [`PgStore`] - `PostgreSQL` (`marketplace` schema), used in production
//! - [`InMemoryStore`] - process-local maps, used by tests and demos
//!
//! Both implement [`MarketplaceStore`]. Handlers and services only see the
//! trait, so the checkout flow is exercised identically against either.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/marketplace/migrations/` and run via:
//! ```bash
//! cargo run -p farmstand-cli -- migrate
//! ```

mod memory;
mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::Deserialize;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use farmstand_core::{
    CartItemId, Location, OrderId, Producer, ProducerId, Product, ProductId, SearchCandidate,
    UserId,
};

use crate::models::{CartItem, CartLine, NewOrder, NewOrderItem, NewUser, Order, OrderItem, User};

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Errors that can occur during repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., stock sold out under a concurrent checkout).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// A priced cart line was consumed or modified before the order was placed.
fn cart_changed() -> RepositoryError {
    RepositoryError::Conflict("cart changed during checkout, please review it and retry".to_owned())
}

/// Fields needed to register a producer.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProducer {
    pub user_id: UserId,
    pub farm_name: String,
    pub description: Option<String>,
    pub location: Option<Location>,
    pub address: Option<String>,
}

/// Fields needed to list a product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub producer_id: ProducerId,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub unit: String,
    pub category: String,
    pub tags: Vec<String>,
}

/// Partial update of a product's sale fields. `None` leaves a field as is.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub available: Option<bool>,
}

/// Storage contract for users, producers, products, carts and orders.
#[async_trait]
pub trait MarketplaceStore: Send + Sync {
    /// Cheap connectivity check for the readiness endpoint.
    async fn ping(&self) -> Result<(), RepositoryError>;

    async fn create_user(&self, new: NewUser) -> Result<User, RepositoryError>;
    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    async fn create_producer(&self, new: NewProducer) -> Result<Producer, RepositoryError>;
    async fn get_producer(&self, id: ProducerId) -> Result<Option<Producer>, RepositoryError>;

    async fn create_product(&self, new: NewProduct) -> Result<Product, RepositoryError>;
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Apply `patch` and return the updated product.
    ///
    /// Returns `RepositoryError::NotFound` for unknown products.
    async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Product, RepositoryError>;

    /// Every available product joined with its producer.
    async fn list_search_candidates(&self) -> Result<Vec<SearchCandidate>, RepositoryError>;

    /// A user's cart joined with current product data, oldest first.
    async fn get_cart_items(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError>;
    async fn get_cart_item(&self, id: CartItemId) -> Result<Option<CartItem>, RepositoryError>;

    /// Add to the cart, merging with an existing line for the same product.
    async fn add_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError>;
    async fn remove_cart_item(&self, id: CartItemId) -> Result<(), RepositoryError>;
    async fn clear_cart(&self, user_id: UserId) -> Result<(), RepositoryError>;

    /// Create the order and its items, take the items out of stock and remove
    /// the cart lines they were priced from, all or nothing.
    ///
    /// Cart lines added after pricing stay in the cart. Returns
    /// `RepositoryError::Conflict`, writing nothing, if a priced line is gone
    /// or changed (another checkout consumed it, or its quantity was merged)
    /// or if any product no longer has enough stock.
    async fn place_order(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> Result<Order, RepositoryError>;
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;
    async fn get_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError>;
    /// A user's orders, newest first.
    async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;
    async fn set_payment_secret(
        &self,
        order_id: OrderId,
        client_secret: &str,
    ) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
