//! Marketplace configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MARKETPLACE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `MARKETPLACE_HOST` - Bind address (default: 127.0.0.1)
//! - `MARKETPLACE_PORT` - Listen port (default: 3000)
//! - `MARKETPLACE_BASE_URL` - Public URL (default: <http://localhost:3000>)
//! - `STRIPE_SECRET_KEY` - Stripe API key; payments are mocked when unset
//! - `PAYMENT_CURRENCY` - Currency for payment intents (default: usd)
//! - `FEE_PLATFORM_RATE` - Platform commission rate (default: 0.05)
//! - `FEE_PROCESSING_RATE` - Card processing rate (default: 0.029)
//! - `FEE_PROCESSING_FIXED` - Card processing fixed fee (default: 0.30)
//! - `FEE_DELIVERY_PICKUP` - Pickup fee (default: 0.00)
//! - `FEE_DELIVERY_HOME` - Home delivery fee (default: 4.99)
//! - `FEE_DELIVERY_FARMERS_MARKET` - Farmers market delivery fee (default: 1.99)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;

use farmstand_core::{CurrencyCode, FeeSchedule};

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Marketplace application configuration.
#[derive(Debug, Clone)]
pub struct MarketplaceConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the marketplace
    pub base_url: String,
    pub payment: PaymentConfig,
    /// Rates and delivery fees used to price orders
    pub fees: FeeSchedule,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

/// Payment provider configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct PaymentConfig {
    /// Stripe secret key. `None` selects the mock provider.
    pub stripe_secret_key: Option<SecretString>,
    pub currency: CurrencyCode,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field(
                "stripe_secret_key",
                &self.stripe_secret_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("currency", &self.currency)
            .finish()
    }
}

impl MarketplaceConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the Stripe key looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("MARKETPLACE_DATABASE_URL")?;
        let host = parse_env::<IpAddr>("MARKETPLACE_HOST", "127.0.0.1")?;
        let port = parse_env::<u16>("MARKETPLACE_PORT", "3000")?;
        let base_url = get_env_or_default("MARKETPLACE_BASE_URL", "http://localhost:3000");
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("MARKETPLACE_BASE_URL".to_string(), e.to_string())
        })?;

        let payment = PaymentConfig::from_env()?;
        let fees = fee_schedule_from(get_optional_env)?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            payment,
            fees,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether session cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl PaymentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let stripe_secret_key = get_optional_env("STRIPE_SECRET_KEY")
            .filter(|key| !key.trim().is_empty())
            .map(|key| {
                validate_secret_strength(&key, "STRIPE_SECRET_KEY")?;
                Ok(SecretString::from(key))
            })
            .transpose()?;
        let currency = parse_env::<CurrencyCode>("PAYMENT_CURRENCY", "usd")?;

        Ok(Self {
            stripe_secret_key,
            currency,
        })
    }
}

/// Build a fee schedule from overrides, falling back to the default pricing.
///
/// Every override must parse as a non-negative decimal.
fn fee_schedule_from(lookup: impl Fn(&str) -> Option<String>) -> Result<FeeSchedule, ConfigError> {
    let defaults = FeeSchedule::default();
    let get = |key: &str, default: Decimal| -> Result<Decimal, ConfigError> {
        let Some(raw) = lookup(key) else {
            return Ok(default);
        };
        let value = Decimal::from_str(raw.trim())
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
        if value.is_sign_negative() && !value.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                "must not be negative".to_string(),
            ));
        }
        Ok(value)
    };

    Ok(FeeSchedule {
        platform_rate: get("FEE_PLATFORM_RATE", defaults.platform_rate)?,
        processing_rate: get("FEE_PROCESSING_RATE", defaults.processing_rate)?,
        processing_fixed: get("FEE_PROCESSING_FIXED", defaults.processing_fixed)?,
        pickup_fee: get("FEE_DELIVERY_PICKUP", defaults.pickup_fee)?,
        home_delivery_fee: get("FEE_DELIVERY_HOME", defaults.home_delivery_fee)?,
        farmers_market_fee: get("FEE_DELIVERY_FARMERS_MARKET", defaults.farmers_market_fee)?,
    })
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, using `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}
