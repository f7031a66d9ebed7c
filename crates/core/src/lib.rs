//! Farmstand Core - Shared types and pure marketplace computations.
//!
//! This crate provides the domain types and the two computational pieces used
//! by every Farmstand component:
//! - `marketplace` - HTTP service (cart, checkout, search endpoints)
//! - `cli` - Command-line tools for migrations and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Persistence and payments are layered on top by the
//! marketplace crate.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money helpers, locations, delivery options and statuses
//! - [`catalog`] - Producers and products
//! - [`fees`] - Order fee calculation with an injectable [`fees::FeeSchedule`]
//! - [`search`] - Text, category, tag and radius filtering of products

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod fees;
pub mod search;
pub mod types;

pub use catalog::{Producer, Product};
pub use fees::{FeeCalculation, FeeError, FeeSchedule, calculate_fees};
pub use search::{SearchCandidate, SearchCriteria, SearchError, SearchHit, search};
pub use types::*;
