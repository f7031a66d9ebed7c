//! Order fee calculation.
//!
//! Turns a cart subtotal and a delivery option into an itemized
//! [`FeeCalculation`]:
//!
//! ```text
//! delivery_fee   = flat fee for the delivery option
//! platform_fee   = round(subtotal * platform_rate)
//! processing_fee = round((subtotal + delivery_fee) * processing_rate + processing_fixed)
//! total          = round(subtotal) + platform_fee + processing_fee + delivery_fee
//! ```
//!
//! Each component is rounded to cents (half-up) on its own and the rounded
//! values are summed, so `total` always equals the sum of the displayed parts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DeliveryOption, round_cents, to_cents};

/// Errors produced by the fee calculator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeeError {
    #[error("subtotal cannot be negative (got {0})")]
    NegativeSubtotal(Decimal),

    #[error("subtotal is too large to price (got {0})")]
    AmountTooLarge(Decimal),
}

/// Rates and flat fees used to price an order.
///
/// The default schedule is the marketplace's published pricing; tests and
/// deployments can inject their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSchedule {
    /// Marketplace commission as a fraction of the subtotal.
    pub platform_rate: Decimal,
    /// Card processor percentage, applied to subtotal plus delivery.
    pub processing_rate: Decimal,
    /// Card processor fixed charge per order.
    pub processing_fixed: Decimal,
    pub pickup_fee: Decimal,
    pub home_delivery_fee: Decimal,
    pub farmers_market_fee: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            platform_rate: Decimal::new(5, 2),
            processing_rate: Decimal::new(29, 3),
            processing_fixed: Decimal::new(30, 2),
            pickup_fee: Decimal::ZERO,
            home_delivery_fee: Decimal::new(499, 2),
            farmers_market_fee: Decimal::new(199, 2),
        }
    }
}

/// Itemized fees for an order. `total` is the amount charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeCalculation {
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub platform_fee: Decimal,
    pub processing_fee: Decimal,
    pub total: Decimal,
}

impl FeeCalculation {
    /// Total in the smallest currency unit, as payment providers expect.
    #[must_use]
    pub fn amount_in_cents(&self) -> Option<i64> {
        to_cents(self.total)
    }

    /// Sum of every fee on top of the subtotal.
    #[must_use]
    pub fn fees(&self) -> Decimal {
        self.delivery_fee + self.platform_fee + self.processing_fee
    }
}

impl FeeSchedule {
    /// Flat delivery fee for an option.
    ///
    /// Unrecognized options cost nothing rather than failing the request.
    #[must_use]
    pub const fn delivery_fee(&self, option: DeliveryOption) -> Decimal {
        match option {
            DeliveryOption::Pickup => self.pickup_fee,
            DeliveryOption::Home => self.home_delivery_fee,
            DeliveryOption::FarmersMarket => self.farmers_market_fee,
            DeliveryOption::Unrecognized => Decimal::ZERO,
        }
    }

    /// Price an order.
    ///
    /// # Errors
    ///
    /// Returns `FeeError::NegativeSubtotal` if `subtotal` is below zero and
    /// `FeeError::AmountTooLarge` if any component overflows.
    pub fn calculate(
        &self,
        subtotal: Decimal,
        option: DeliveryOption,
    ) -> Result<FeeCalculation, FeeError> {
        if subtotal < Decimal::ZERO {
            return Err(FeeError::NegativeSubtotal(subtotal));
        }
        let too_large = || FeeError::AmountTooLarge(subtotal);

        let rounded = round_cents(subtotal);
        let delivery_fee = round_cents(self.delivery_fee(option));
        let platform_fee = round_cents(
            rounded
                .checked_mul(self.platform_rate)
                .ok_or_else(too_large)?,
        );
        let processing_fee = round_cents(
            rounded
                .checked_add(delivery_fee)
                .and_then(|base| base.checked_mul(self.processing_rate))
                .and_then(|fee| fee.checked_add(self.processing_fixed))
                .ok_or_else(too_large)?,
        );
        let total = [platform_fee, processing_fee, delivery_fee]
            .into_iter()
            .try_fold(rounded, Decimal::checked_add)
            .ok_or_else(too_large)?;

        Ok(FeeCalculation {
            subtotal: rounded,
            delivery_fee,
            platform_fee,
            processing_fee,
            total,
        })
    }
}

/// Price an order with the default [`FeeSchedule`].
///
/// # Errors
///
/// Same as [`FeeSchedule::calculate`].
pub fn calculate_fees(
    subtotal: Decimal,
    option: DeliveryOption,
) -> Result<FeeCalculation, FeeError> {
    FeeSchedule::default().calculate(subtotal, option)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_pickup_hundred() {
        let fees = calculate_fees(dec!(100), DeliveryOption::Pickup).unwrap();
        assert_eq!(fees.delivery_fee, dec!(0));
        assert_eq!(fees.platform_fee, dec!(5.00));
        assert_eq!(fees.processing_fee, dec!(3.20));
        assert_eq!(fees.total, dec!(108.20));
        assert_eq!(fees.amount_in_cents(), Some(10820));
    }

    #[test]
    fn test_home_fifty() {
        let fees = calculate_fees(dec!(50), DeliveryOption::Home).unwrap();
        assert_eq!(fees.delivery_fee, dec!(4.99));
        assert_eq!(fees.platform_fee, dec!(2.50));
        // 54.99 * 0.029 + 0.30 = 1.89471
        assert_eq!(fees.processing_fee, dec!(1.89));
        assert_eq!(fees.total, dec!(59.38));
    }

    #[test]
    fn test_farmers_market_fee() {
        let fees = calculate_fees(dec!(20), DeliveryOption::FarmersMarket).unwrap();
        assert_eq!(fees.delivery_fee, dec!(1.99));
        assert_eq!(fees.platform_fee, dec!(1.00));
        // 21.99 * 0.029 + 0.30 = 0.93771
        assert_eq!(fees.processing_fee, dec!(0.94));
        assert_eq!(fees.total, dec!(23.93));
    }

    #[test]
    fn test_components_rounded_before_summing() {
        // platform: 0.5025 -> 0.50, processing: 10.05 * 0.029 + 0.30 = 0.59145 -> 0.59
        let fees = calculate_fees(dec!(10.05), DeliveryOption::Pickup).unwrap();
        assert_eq!(fees.platform_fee, dec!(0.50));
        assert_eq!(fees.processing_fee, dec!(0.59));
        assert_eq!(fees.total, dec!(11.14));
    }

    #[test]
    fn test_half_cent_rounds_up() {
        // platform: 0.90 * 0.05 = 0.045 -> 0.05
        let fees = calculate_fees(dec!(0.90), DeliveryOption::Pickup).unwrap();
        assert_eq!(fees.platform_fee, dec!(0.05));
    }

    #[test]
    fn test_zero_subtotal() {
        let fees = calculate_fees(Decimal::ZERO, DeliveryOption::Pickup).unwrap();
        assert_eq!(fees.platform_fee, dec!(0));
        assert_eq!(fees.processing_fee, dec!(0.30));
        assert_eq!(fees.total, dec!(0.30));
    }

    #[test]
    fn test_negative_subtotal_rejected() {
        let err = calculate_fees(dec!(-0.01), DeliveryOption::Home).unwrap_err();
        assert_eq!(err, FeeError::NegativeSubtotal(dec!(-0.01)));
    }

    #[test]
    fn test_negative_zero_accepted() {
        let negative_zero = -Decimal::ZERO;
        assert!(calculate_fees(negative_zero, DeliveryOption::Pickup).is_ok());
    }

    #[test]
    fn test_unrecognized_option_has_no_delivery_fee() {
        let fees = calculate_fees(dec!(100), DeliveryOption::Unrecognized).unwrap();
        assert_eq!(fees.delivery_fee, dec!(0));
        assert_eq!(fees.total, dec!(108.20));
    }

    #[test]
    fn test_total_is_sum_of_components_and_at_least_subtotal() {
        let mut subtotal = Decimal::ZERO;
        while subtotal < dec!(250) {
            for option in DeliveryOption::ALL {
                let fees = calculate_fees(subtotal, option).unwrap();
                assert_eq!(
                    fees.total,
                    fees.subtotal + fees.platform_fee + fees.processing_fee + fees.delivery_fee
                );
                assert!(fees.total >= fees.subtotal);
                assert_eq!(fees.total.round_dp(2), fees.total);
            }
            subtotal += dec!(3.37);
        }
    }

    #[test]
    fn test_custom_schedule() {
        let schedule = FeeSchedule {
            platform_rate: dec!(0.10),
            processing_rate: Decimal::ZERO,
            processing_fixed: Decimal::ZERO,
            home_delivery_fee: dec!(7),
            ..FeeSchedule::default()
        };
        let fees = schedule.calculate(dec!(40), DeliveryOption::Home).unwrap();
        assert_eq!(fees.platform_fee, dec!(4.00));
        assert_eq!(fees.processing_fee, dec!(0));
        assert_eq!(fees.delivery_fee, dec!(7));
        assert_eq!(fees.total, dec!(51.00));
    }

    #[test]
    fn test_serializes_camel_case() {
        let fees = calculate_fees(dec!(100), DeliveryOption::Pickup).unwrap();
        let json = serde_json::to_value(fees).unwrap();
        assert_eq!(json["platformFee"], "5.00");
        assert_eq!(json["deliveryFee"], "0.00");
        assert_eq!(json["subtotal"], "100.00");
        assert_eq!(json["total"], "108.20");
    }

    #[test]
    fn test_huge_subtotal_is_rejected() {
        for option in DeliveryOption::ALL {
            assert_eq!(
                calculate_fees(Decimal::MAX, option),
                Err(FeeError::AmountTooLarge(Decimal::MAX))
            );
        }
        // Fees add roughly 8% on top, so half the range still prices
        let big = Decimal::MAX / dec!(2);
        assert!(calculate_fees(big, DeliveryOption::Home).is_ok());
    }
}
