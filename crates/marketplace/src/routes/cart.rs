//! Cart route handlers.
//!
//! The cart belongs to the signed-in user and lives in the store, so it
//! survives across sessions and devices.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use farmstand_core::{CartItemId, ProductId};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireUser;
use crate::models::{CartItem, CartLine, cart_subtotal};
use crate::state::AppState;

/// Largest quantity accepted for a single add.
const MAX_ADD_QUANTITY: i32 = 999;

/// The current user's cart.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLine>,
    #[serde(with = "rust_decimal::serde::str")]
    pub subtotal: Decimal,
    pub item_count: i32,
}

impl From<Vec<CartLine>> for CartView {
    fn from(items: Vec<CartLine>) -> Self {
        Self {
            subtotal: cart_subtotal(&items),
            item_count: items.iter().map(|l| l.item.quantity).sum(),
            items,
        }
    }
}

/// Body of `POST /cart/items`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Show the cart with its subtotal.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
) -> Result<Json<CartView>> {
    let lines = state.store().get_cart_items(user_id).await?;
    Ok(Json(CartView::from(lines)))
}

/// Add a product to the cart, merging with an existing line.
#[instrument(skip(state))]
pub async fn add(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Json(request): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<CartItem>)> {
    if !(1..=MAX_ADD_QUANTITY).contains(&request.quantity) {
        return Err(AppError::BadRequest(format!(
            "quantity must be between 1 and {MAX_ADD_QUANTITY}"
        )));
    }

    let product = state
        .store()
        .get_product(request.product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", request.product_id)))?;
    if !product.available {
        return Err(AppError::BadRequest(format!(
            "{} is not available",
            product.name
        )));
    }

    let item = state
        .store()
        .add_cart_item(user_id, product.id, request.quantity)
        .await?;

    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", &product.id.to_string())]),
    );
    Ok((StatusCode::CREATED, Json(item)))
}

/// Remove a line from the cart.
#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Path(id): Path<CartItemId>,
) -> Result<StatusCode> {
    let item = state
        .store()
        .get_cart_item(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("cart item {id}")))?;
    if item.user_id != user_id {
        return Err(AppError::Forbidden(
            "cart item belongs to another user".to_string(),
        ));
    }

    state.store().remove_cart_item(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Empty the cart.
#[instrument(skip(state))]
pub async fn clear(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
) -> Result<StatusCode> {
    state.store().clear_cart(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
