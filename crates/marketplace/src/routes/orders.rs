//! Order route handlers: fee quotes, checkout and order history.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use farmstand_core::{DeliveryOption, FeeCalculation, OrderId};

use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::models::{Order, OrderItem};
use crate::state::AppState;

/// Body of `POST /orders/calculate-fees`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateFeesRequest {
    pub subtotal: Decimal,
    pub delivery_option: DeliveryOption,
}

/// Body of `POST /orders/checkout`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub delivery_option: DeliveryOption,
    #[serde(default)]
    pub notes: Option<String>,
}

/// An order together with its line items.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Checkout result handed to the client to confirm payment.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub order: OrderView,
    pub client_secret: String,
}

/// Price a subtotal for a delivery option.
#[instrument(skip(state))]
pub async fn calculate_fees(
    State(state): State<AppState>,
    Json(request): Json<CalculateFeesRequest>,
) -> Result<Json<FeeCalculation>> {
    if !request.delivery_option.is_recognized() {
        tracing::warn!("Unrecognized delivery option, charging no delivery fee");
    }

    let fees = state
        .fees()
        .calculate(request.subtotal, request.delivery_option)?;
    Ok(Json(fees))
}

/// Turn the current user's cart into an order and start payment.
#[instrument(skip(state, request), fields(delivery = %request.delivery_option))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>)> {
    let receipt = state
        .checkout()
        .checkout(user_id, request.delivery_option, request.notes)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            order: OrderView {
                order: receipt.order,
                items: receipt.items,
            },
            client_secret: receipt.client_secret,
        }),
    ))
}

/// The current user's orders, newest first.
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.store().list_orders(user_id).await?))
}

/// A single order with its items.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderView>> {
    let order = state
        .store()
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    if order.user_id != user_id {
        return Err(AppError::Forbidden(
            "order belongs to another user".to_string(),
        ));
    }

    let items = state.store().get_order_items(id).await?;
    Ok(Json(OrderView { order, items }))
}
