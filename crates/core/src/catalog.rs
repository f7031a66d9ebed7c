//! Producers and the products they list.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Location, ProducerId, ProductId, UserId};

/// A local food producer (farm, bakery, dairy...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Producer {
    pub id: ProducerId,
    /// User account that manages this producer.
    pub user_id: UserId,
    pub farm_name: String,
    pub description: Option<String>,
    /// Where the producer operates. Producers without a location never match
    /// a radius search.
    pub location: Option<Location>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A product listed by exactly one producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub producer_id: ProducerId,
    pub name: String,
    pub description: Option<String>,
    /// Unit price in the currency's standard unit.
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    /// Units currently in stock.
    pub stock: i32,
    /// Selling unit (e.g. "lb", "dozen", "jar").
    pub unit: String,
    pub category: String,
    pub tags: Vec<String>,
    /// Whether the producer has the product listed for sale.
    pub available: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Whether `quantity` units can be sold right now.
    #[must_use]
    pub const fn can_fulfill(&self, quantity: i32) -> bool {
        self.available && quantity > 0 && quantity <= self.stock
    }

    /// Case-insensitive check for any of the given tags.
    #[must_use]
    pub fn has_any_tag(&self, wanted: &[String]) -> bool {
        wanted.iter().any(|w| {
            self.tags
                .iter()
                .any(|t| t.trim().eq_ignore_ascii_case(w.trim()))
        })
    }
}
