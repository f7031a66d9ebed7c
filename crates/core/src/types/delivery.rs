//! Delivery options offered at checkout.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// How an order reaches the customer.
///
/// Serialized as kebab-case strings (`pickup`, `home`, `farmers-market`).
/// Any other string deserializes to [`DeliveryOption::Unrecognized`], which
/// carries no delivery fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryOption {
    /// Customer collects from the producer.
    Pickup,
    /// Delivered to the customer's address.
    Home,
    /// Collected at a farmers market stall.
    FarmersMarket,
    /// A value this build does not know about.
    Unrecognized,
}

impl DeliveryOption {
    /// All options that can be chosen at checkout.
    pub const ALL: [Self; 3] = [Self::Pickup, Self::Home, Self::FarmersMarket];

    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pickup => "pickup",
            Self::Home => "home",
            Self::FarmersMarket => "farmers-market",
            Self::Unrecognized => "unrecognized",
        }
    }

    /// Parse a wire value, mapping unknown values to `Unrecognized`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "pickup" => Self::Pickup,
            "home" => Self::Home,
            "farmers-market" => Self::FarmersMarket,
            _ => Self::Unrecognized,
        }
    }

    /// Whether this is one of the known options.
    #[must_use]
    pub const fn is_recognized(self) -> bool {
        !matches!(self, Self::Unrecognized)
    }
}

impl std::fmt::Display for DeliveryOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DeliveryOption {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DeliveryOption {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}
