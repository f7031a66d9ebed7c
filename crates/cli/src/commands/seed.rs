//! Seed the marketplace with producers and products from a YAML catalog.
//!
//! ```yaml
//! producers:
//!   - owner:
//!       email: grower@example.com
//!       displayName: Ana Grower
//!     farmName: Sunny Acres
//!     location: { latitude: 45.52, longitude: -122.68 }
//!     products:
//!       - name: Rainbow Chard
//!         price: "3.50"
//!         stock: 40
//!         unit: bunch
//!         category: produce
//!         tags: [organic, greens]
//! ```
//!
//! The whole file is parsed and validated before the database is touched.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info};

use farmstand_core::Location;
use farmstand_marketplace::db::{self, MarketplaceStore, NewProducer, NewProduct, PgStore};
use farmstand_marketplace::models::NewUser;

use super::migrate;

/// Top level of a catalog file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub producers: Vec<ProducerEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerEntry {
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerEntry {
    pub owner: OwnerEntry,
    pub farm_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub products: Vec<ProductEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductEntry {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub unit: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Counts reported after seeding.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedResult {
    pub producers: usize,
    pub products: usize,
}

/// Check a parsed catalog, returning one message per problem.
#[must_use]
pub fn validate_catalog(catalog: &Catalog) -> Vec<String> {
    let mut errors = Vec::new();

    if catalog.producers.is_empty() {
        errors.push("catalog has no producers".to_string());
    }

    for (i, producer) in catalog.producers.iter().enumerate() {
        let at = format!("producers[{i}]");
        if !producer.owner.email.contains('@') {
            errors.push(format!("{at}.owner.email: not an email address"));
        }
        if producer.farm_name.trim().is_empty() {
            errors.push(format!("{at}.farmName: must not be empty"));
        }

        for (j, product) in producer.products.iter().enumerate() {
            let at = format!("{at}.products[{j}]");
            if product.name.trim().is_empty() {
                errors.push(format!("{at}.name: must not be empty"));
            }
            if product.price.is_sign_negative() && !product.price.is_zero() {
                errors.push(format!("{at}.price: must not be negative"));
            }
            if product.price.scale() > 2 {
                errors.push(format!("{at}.price: at most two decimal places"));
            }
            if product.stock < 0 {
                errors.push(format!("{at}.stock: must not be negative"));
            }
        }
    }

    errors
}

/// Insert every producer, its owner account and its products.
///
/// # Errors
///
/// Returns the first store error; earlier inserts are kept.
pub async fn seed(
    store: &dyn MarketplaceStore,
    catalog: Catalog,
) -> Result<SeedResult, db::RepositoryError> {
    let mut result = SeedResult::default();

    for entry in catalog.producers {
        let owner = store
            .create_user(NewUser {
                email: entry.owner.email,
                display_name: entry.owner.display_name,
                location: entry.location,
            })
            .await?;
        let producer = store
            .create_producer(NewProducer {
                user_id: owner.id,
                farm_name: entry.farm_name,
                description: entry.description,
                location: entry.location,
                address: entry.address,
            })
            .await?;
        result.producers += 1;

        for product in entry.products {
            store
                .create_product(NewProduct {
                    producer_id: producer.id,
                    name: product.name,
                    description: product.description,
                    price: product.price,
                    stock: product.stock,
                    unit: product.unit,
                    category: product.category,
                    tags: product.tags,
                })
                .await?;
            result.products += 1;
        }
        info!(producer_id = %producer.id, farm = %producer.farm_name, "Seeded producer");
    }

    Ok(result)
}

/// Seed the marketplace database from a YAML catalog file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, the catalog is
/// invalid, or database operations fail.
pub async fn catalog(file_path: &str, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");
    let content = tokio::fs::read_to_string(path).await?;
    let catalog: Catalog = serde_yaml::from_str(&content)?;
    info!(producers = catalog.producers.len(), "Parsed catalog");

    let errors = validate_catalog(&catalog);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    if dry_run {
        info!("Catalog is valid (dry run, nothing written)");
        return Ok(());
    }

    let database_url = migrate::database_url()?;
    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let result = seed(&PgStore::new(pool), catalog).await?;

    info!("Seeding complete!");
    info!("  Producers inserted: {}", result.producers);
    info!("  Products inserted: {}", result.products);
    Ok(())
}
