//! Application state shared across handlers.

use std::sync::Arc;

use farmstand_core::{CurrencyCode, FeeSchedule};

use crate::db::MarketplaceStore;
use crate::services::{CheckoutService, PaymentProvider};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. The store and payment provider are trait
/// objects so tests can swap in in-memory implementations.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn MarketplaceStore>,
    payments: Arc<dyn PaymentProvider>,
    fees: FeeSchedule,
    currency: CurrencyCode,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        store: Arc<dyn MarketplaceStore>,
        payments: Arc<dyn PaymentProvider>,
        fees: FeeSchedule,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                store,
                payments,
                fees,
                currency,
            }),
        }
    }

    /// Get a reference to the marketplace store.
    #[must_use]
    pub fn store(&self) -> &dyn MarketplaceStore {
        self.inner.store.as_ref()
    }

    /// Get a reference to the fee schedule.
    #[must_use]
    pub fn fees(&self) -> &FeeSchedule {
        &self.inner.fees
    }

    /// A checkout service bound to this state's collaborators.
    #[must_use]
    pub fn checkout(&self) -> CheckoutService<'_> {
        CheckoutService::new(
            self.inner.store.as_ref(),
            self.inner.payments.as_ref(),
            &self.inner.fees,
            self.inner.currency,
        )
    }
}
