//! Payment intent providers.
//!
//! Checkout creates a payment intent for the order total and hands the
//! client secret to the browser, which confirms the payment directly with
//! the provider.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use farmstand_core::CurrencyCode;

use crate::config::PaymentConfig;

/// Stripe API base URL.
const STRIPE_BASE_URL: &str = "https://api.stripe.com/v1";

/// Errors that can occur when creating a payment intent.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The amount cannot be charged.
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Something that can create payment intents.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Create a payment intent and return its client secret.
    ///
    /// `amount` is in the smallest currency unit (cents for USD).
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: CurrencyCode,
        metadata: &BTreeMap<String, String>,
    ) -> Result<String, PaymentError>;
}

/// Build the provider for a configuration: Stripe when a key is set, the
/// mock otherwise.
///
/// # Errors
///
/// Returns an error if a key is configured but the Stripe client cannot be
/// built. There is no fallback to the mock in that case.
pub fn provider_for(config: &PaymentConfig) -> Result<Arc<dyn PaymentProvider>, PaymentError> {
    Ok(match &config.stripe_secret_key {
        Some(key) => Arc::new(StripeClient::new(key.clone())?),
        None => Arc::new(MockPaymentProvider::new()),
    })
}

// =============================================================================
// Stripe
// =============================================================================

/// Stripe `PaymentIntents` API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    secret_key: SecretString,
    base_url: String,
}

#[derive(Deserialize)]
struct PaymentIntentResponse {
    client_secret: Option<String>,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(secret_key: SecretString) -> Result<Self, PaymentError> {
        Self::with_base_url(secret_key, STRIPE_BASE_URL)
    }

    /// Create a client against a different API host (e.g. stripe-mock).
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn with_base_url(
        secret_key: SecretString,
        base_url: impl Into<String>,
    ) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            secret_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

/// Form fields for `POST /v1/payment_intents`.
fn payment_intent_form(
    amount: i64,
    currency: CurrencyCode,
    metadata: &BTreeMap<String, String>,
) -> Vec<(String, String)> {
    let mut form = vec![
        ("amount".to_string(), amount.to_string()),
        ("currency".to_string(), currency.as_str().to_string()),
        (
            "automatic_payment_methods[enabled]".to_string(),
            "true".to_string(),
        ),
    ];
    form.extend(
        metadata
            .iter()
            .map(|(k, v)| (format!("metadata[{k}]"), v.clone())),
    );
    form
}

#[async_trait]
impl PaymentProvider for StripeClient {
    fn name(&self) -> &'static str {
        "stripe"
    }

    #[instrument(skip(self, metadata))]
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: CurrencyCode,
        metadata: &BTreeMap<String, String>,
    ) -> Result<String, PaymentError> {
        if amount <= 0 {
            return Err(PaymentError::InvalidAmount(amount));
        }

        let url = format!("{}/payment_intents", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .form(&payment_intent_form(amount, currency, metadata))
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let intent: PaymentIntentResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))?;

        intent
            .client_secret
            .ok_or_else(|| PaymentError::Parse("response has no client_secret".to_string()))
    }
}

// =============================================================================
// Mock
// =============================================================================

/// Provider that fabricates client secrets without any network calls.
///
/// Used when no Stripe key is configured, and by tests.
#[derive(Debug, Clone, Default)]
pub struct MockPaymentProvider {
    fail: bool,
}

impl MockPaymentProvider {
    #[must_use]
    pub const fn new() -> Self {
        Self { fail: false }
    }

    /// A provider whose every call fails with an API error.
    #[must_use]
    pub const fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: CurrencyCode,
        metadata: &BTreeMap<String, String>,
    ) -> Result<String, PaymentError> {
        if self.fail {
            return Err(PaymentError::Api {
                status: 402,
                message: "mock provider configured to fail".to_string(),
            });
        }
        if amount <= 0 {
            return Err(PaymentError::InvalidAmount(amount));
        }

        let intent_id = format!("mock_pi_{}", Uuid::new_v4().simple());
        tracing::info!(
            intent_id = %intent_id,
            amount,
            currency = %currency,
            order_id = metadata.get("order_id").map_or("-", String::as_str),
            "Created mock payment intent"
        );
        Ok(format!("{intent_id}_secret_{}", Uuid::new_v4().simple()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_provider_for_configured_key_is_stripe() {
        let config = PaymentConfig {
            stripe_secret_key: Some(SecretString::from("sk_test_51Hq8dKx2mZr7Tn4Vb")),
            currency: CurrencyCode::USD,
        };
        assert_eq!(provider_for(&config).unwrap().name(), "stripe");

        let config = PaymentConfig {
            stripe_secret_key: None,
            currency: CurrencyCode::USD,
        };
        assert_eq!(provider_for(&config).unwrap().name(), "mock");
    }

    #[test]
    fn test_payment_intent_form() {
        let mut metadata = BTreeMap::new();
        metadata.insert("order_id".to_string(), "42".to_string());
        let form = payment_intent_form(10820, CurrencyCode::USD, &metadata);

        assert!(form.contains(&("amount".to_string(), "10820".to_string())));
        assert!(form.contains(&("currency".to_string(), "usd".to_string())));
        assert!(form.contains(&("metadata[order_id]".to_string(), "42".to_string())));
    }

    #[tokio::test]
    async fn test_mock_provider_returns_client_secret() {
        let secret = MockPaymentProvider::new()
            .create_payment_intent(500, CurrencyCode::USD, &BTreeMap::new())
            .await
            .unwrap();
        assert!(secret.starts_with("mock_pi_"));
        assert!(secret.contains("_secret_"));
    }

    #[tokio::test]
    async fn test_mock_provider_rejects_zero_amount() {
        let result = MockPaymentProvider::new()
            .create_payment_intent(0, CurrencyCode::USD, &BTreeMap::new())
            .await;
        assert!(matches!(result, Err(PaymentError::InvalidAmount(0))));
    }

    #[tokio::test]
    async fn test_failing_mock_provider() {
        let result = MockPaymentProvider::failing()
            .create_payment_intent(500, CurrencyCode::USD, &BTreeMap::new())
            .await;
        assert!(matches!(result, Err(PaymentError::Api { status: 402, .. })));
    }

    #[test]
    fn test_stripe_base_url_trimmed() {
        let client =
            StripeClient::with_base_url(SecretString::from("sk_test_123"), "http://localhost:12111/")
                .unwrap();
        assert_eq!(client.base_url, "http://localhost:12111");
    }
}
