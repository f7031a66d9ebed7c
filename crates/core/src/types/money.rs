//! Money helpers built on exact decimal arithmetic.
//!
//! Amounts are plain [`Decimal`] values in the currency's standard unit
//! (dollars, not cents). Every displayed or persisted amount is rounded to two
//! decimal places with round-half-up.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Round an amount to whole cents, half-up, always carrying two decimal
/// places (`5` becomes `5.00`).
///
/// Marketplace amounts are never negative, so `MidpointAwayFromZero` is
/// exactly round-half-up.
#[must_use]
pub fn round_cents(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Convert an amount to the smallest currency unit (e.g. cents).
///
/// Returns `None` if the amount does not fit in an `i64`.
#[must_use]
pub fn to_cents(amount: Decimal) -> Option<i64> {
    let mut cents = round_cents(amount);
    cents.rescale(2);
    i64::try_from(cents.mantissa()).ok()
}

/// ISO 4217 currency codes accepted by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    /// Lowercase code as expected by payment APIs (e.g. `usd`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::USD => "usd",
            Self::EUR => "eur",
            Self::GBP => "gbp",
            Self::CAD => "cad",
            Self::AUD => "aud",
        }
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "usd" => Ok(Self::USD),
            "eur" => Ok(Self::EUR),
            "gbp" => Ok(Self::GBP),
            "cad" => Ok(Self::CAD),
            "aud" => Ok(Self::AUD),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_round_cents_half_up() {
        assert_eq!(round_cents(dec!(1.895)), dec!(1.90));
        assert_eq!(round_cents(dec!(1.89471)), dec!(1.89));
        assert_eq!(round_cents(dec!(0.005)), dec!(0.01));
        assert_eq!(round_cents(dec!(2.5)), dec!(2.5));
    }

    #[test]
    fn test_round_cents_keeps_two_places() {
        assert_eq!(round_cents(dec!(100)).to_string(), "100.00");
        assert_eq!(round_cents(dec!(2.5)).to_string(), "2.50");
        assert_eq!(round_cents(dec!(1.999)).to_string(), "2.00");
    }

    #[test]
    fn test_to_cents() {
        assert_eq!(to_cents(dec!(108.2)), Some(10820));
        assert_eq!(to_cents(dec!(0)), Some(0));
        assert_eq!(to_cents(dec!(4.995)), Some(500));
    }

    #[test]
    fn test_currency_code_parse() {
        assert_eq!("USD".parse::<CurrencyCode>().unwrap(), CurrencyCode::USD);
        assert_eq!(" eur ".parse::<CurrencyCode>().unwrap(), CurrencyCode::EUR);
        assert!("btc".parse::<CurrencyCode>().is_err());
        assert_eq!(CurrencyCode::CAD.to_string(), "cad");
    }
}
