//! Core types for Farmstand.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod delivery;
pub mod id;
pub mod location;
pub mod money;
pub mod status;

pub use delivery::DeliveryOption;
pub use id::*;
pub use location::{Location, LocationError};
pub use money::{CurrencyCode, round_cents, to_cents};
pub use status::*;
