//! Shopping cart lines.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use farmstand_core::{CartItemId, Product, ProductId, UserId, round_cents};

/// A product in a user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub added_at: DateTime<Utc>,
}

/// A cart item joined with its current product data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub item: CartItem,
    pub product: Product,
}

impl CartLine {
    /// Unit price times quantity, rounded to cents.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        round_cents(self.product.price * Decimal::from(self.item.quantity))
    }
}

/// Sum of rounded line totals.
#[must_use]
pub fn cart_subtotal(lines: &[CartLine]) -> Decimal {
    lines.iter().map(CartLine::line_total).sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use farmstand_core::ProducerId;

    use super::*;

    fn line(price: Decimal, quantity: i32) -> CartLine {
        let now = Utc::now();
        CartLine {
            item: CartItem {
                id: CartItemId::new(1),
                user_id: UserId::new(1),
                product_id: ProductId::new(1),
                quantity,
                added_at: now,
            },
            product: Product {
                id: ProductId::new(1),
                producer_id: ProducerId::new(1),
                name: "Goat Cheese".to_string(),
                description: None,
                price,
                stock: 100,
                unit: "4oz".to_string(),
                category: "dairy".to_string(),
                tags: Vec::new(),
                available: true,
                created_at: now,
            },
        }
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line(dec!(3.25), 4).line_total(), dec!(13.00));
        assert_eq!(line(dec!(0.333), 3).line_total(), dec!(1.00));
    }

    #[test]
    fn test_cart_subtotal() {
        let lines = vec![line(dec!(3.25), 4), line(dec!(6.99), 2)];
        assert_eq!(cart_subtotal(&lines), dec!(26.98));
        assert_eq!(cart_subtotal(&[]), Decimal::ZERO);
    }
}
