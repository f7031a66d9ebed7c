//! Orders created at checkout.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use farmstand_core::{
    CartItemId, DeliveryOption, FeeCalculation, OrderId, OrderItemId, OrderStatus, ProducerId,
    ProductId, UserId,
};

/// A priced order. Fees are frozen at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub delivery_option: DeliveryOption,
    #[serde(flatten)]
    pub fees: FeeCalculation,
    /// Client secret of the payment intent, once one has been created.
    pub payment_client_secret: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A purchased product line, priced at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub producer_id: ProducerId,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Order row to insert.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub delivery_option: DeliveryOption,
    pub fees: FeeCalculation,
    pub notes: Option<String>,
}

/// Order item row to insert, priced from one cart line.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    /// Cart line this item was priced from. The line is consumed by the order
    /// and must still hold `quantity` of `product_id` when the order is placed.
    pub cart_item_id: CartItemId,
    pub product_id: ProductId,
    pub producer_id: ProducerId,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}
