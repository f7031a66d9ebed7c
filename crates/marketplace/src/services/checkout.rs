//! Cart-to-order checkout.
//!
//! 1. Load the user's cart and validate every line against current stock.
//! 2. Price the cart with the configured [`FeeSchedule`].
//! 3. Create the order and its items, take them out of stock and remove the
//!    priced cart lines in one atomic store call. The store refuses the order
//!    if those lines changed since step 1.
//! 4. Create a payment intent for the order total and attach its client
//!    secret to the order.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::instrument;

use farmstand_core::{
    CurrencyCode, DeliveryOption, FeeCalculation, FeeError, FeeSchedule, OrderId, ProductId,
    UserId,
};

use crate::db::{MarketplaceStore, RepositoryError};
use crate::error::add_breadcrumb;
use crate::models::{CartLine, NewOrder, NewOrderItem, Order, OrderItem, cart_subtotal};
use crate::services::payments::{PaymentError, PaymentProvider};

/// Longest accepted order note.
pub const MAX_NOTES_LENGTH: usize = 1000;

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("delivery option is not supported")]
    UnsupportedDeliveryOption,

    #[error("notes must be at most {MAX_NOTES_LENGTH} characters")]
    NotesTooLong,

    #[error("product {0} is no longer available")]
    ProductUnavailable(ProductId),

    #[error("only {available} of product {product_id} in stock (requested {requested})")]
    InsufficientStock {
        product_id: ProductId,
        requested: i32,
        available: i32,
    },

    #[error("order total cannot be charged")]
    AmountOutOfRange,

    #[error(transparent)]
    Fee(#[from] FeeError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The order exists (status `pending`) but no payment intent was created.
    #[error("payment intent for order {order_id} failed: {source}")]
    Payment {
        order_id: OrderId,
        #[source]
        source: PaymentError,
    },
}

/// Result of a successful checkout.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub client_secret: String,
}

/// Orchestrates checkout over the store and payment provider.
pub struct CheckoutService<'a> {
    store: &'a dyn MarketplaceStore,
    payments: &'a dyn PaymentProvider,
    fees: &'a FeeSchedule,
    currency: CurrencyCode,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        store: &'a dyn MarketplaceStore,
        payments: &'a dyn PaymentProvider,
        fees: &'a FeeSchedule,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            store,
            payments,
            fees,
            currency,
        }
    }

    /// Price the user's current cart without placing an order.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if the cart cannot be loaded.
    pub async fn quote(
        &self,
        user_id: UserId,
        delivery_option: DeliveryOption,
    ) -> Result<FeeCalculation, CheckoutError> {
        let lines = self.store.get_cart_items(user_id).await?;
        Ok(self.fees.calculate(cart_subtotal(&lines), delivery_option)?)
    }

    /// Turn the user's cart into a pending order with a payment intent.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError` if the cart is empty or out of stock, the
    /// delivery option is unknown, storage fails, or the payment provider
    /// rejects the intent.
    #[instrument(skip(self, notes))]
    pub async fn checkout(
        &self,
        user_id: UserId,
        delivery_option: DeliveryOption,
        notes: Option<String>,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        if !delivery_option.is_recognized() {
            return Err(CheckoutError::UnsupportedDeliveryOption);
        }
        let notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if notes
            .as_ref()
            .is_some_and(|n| n.chars().count() > MAX_NOTES_LENGTH)
        {
            return Err(CheckoutError::NotesTooLong);
        }

        let lines = self.store.get_cart_items(user_id).await?;
        let items = order_items(&lines)?;
        let fees = self.fees.calculate(cart_subtotal(&lines), delivery_option)?;
        let amount = fees
            .amount_in_cents()
            .ok_or(CheckoutError::AmountOutOfRange)?;

        let order = self
            .store
            .place_order(
                NewOrder {
                    user_id,
                    delivery_option,
                    fees,
                    notes,
                },
                items,
            )
            .await?;
        tracing::info!(order_id = %order.id, total = %fees.total, "Order placed");
        add_breadcrumb(
            "checkout",
            "Order placed",
            Some(&[("order_id", &order.id.to_string())]),
        );

        let metadata = BTreeMap::from([
            ("order_id".to_string(), order.id.to_string()),
            ("user_id".to_string(), user_id.to_string()),
        ]);
        let client_secret = self
            .payments
            .create_payment_intent(amount, self.currency, &metadata)
            .await
            .map_err(|source| CheckoutError::Payment {
                order_id: order.id,
                source,
            })?;
        self.store
            .set_payment_secret(order.id, &client_secret)
            .await?;

        let items = self.store.get_order_items(order.id).await?;
        let order = Order {
            payment_client_secret: Some(client_secret.clone()),
            ..order
        };

        Ok(CheckoutReceipt {
            order,
            items,
            client_secret,
        })
    }
}

/// Validate cart lines against stock and freeze their prices.
fn order_items(lines: &[CartLine]) -> Result<Vec<NewOrderItem>, CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    lines
        .iter()
        .map(|line| {
            let product = &line.product;
            let requested = line.item.quantity;
            if !product.can_fulfill(requested) {
                if !product.available {
                    return Err(CheckoutError::ProductUnavailable(product.id));
                }
                return Err(CheckoutError::InsufficientStock {
                    product_id: product.id,
                    requested,
                    available: product.stock,
                });
            }
            Ok(NewOrderItem {
                cart_item_id: line.item.id,
                product_id: product.id,
                producer_id: product.producer_id,
                product_name: product.name.clone(),
                quantity: requested,
                unit_price: product.price,
                line_total: line.line_total(),
            })
        })
        .collect()
}

/// Sum of frozen line totals; equals the order subtotal.
#[must_use]
pub fn items_total(items: &[OrderItem]) -> Decimal {
    items.iter().map(|i| i.line_total).sum()
}
