//! Business services layered over the store.
//!
//! - [`checkout`] - turns a cart into a priced, paid-for order
//! - [`payments`] - payment intent providers (Stripe, mock)

pub mod checkout;
pub mod payments;

pub use checkout::{CheckoutError, CheckoutReceipt, CheckoutService};
pub use payments::{
    MockPaymentProvider, PaymentError, PaymentProvider, StripeClient, provider_for,
};
