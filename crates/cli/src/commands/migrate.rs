//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! fs-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `MARKETPLACE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Marketplace migrations live in `crates/marketplace/migrations/`. The session
//! table used by tower-sessions is created there too.

use secrecy::SecretString;

use farmstand_marketplace::db;

/// Errors that can occur while migrating.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Read the marketplace database URL from the environment.
///
/// # Errors
///
/// Returns `MigrationError::MissingEnvVar` when neither variable is set.
pub fn database_url() -> Result<SecretString, MigrationError> {
    dotenvy::dotenv().ok();

    std::env::var("MARKETPLACE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MigrationError::MissingEnvVar("MARKETPLACE_DATABASE_URL"))
}

/// Run marketplace database migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn marketplace() -> Result<(), MigrationError> {
    let database_url = database_url()?;

    tracing::info!("Connecting to marketplace database...");
    let pool = db::create_pool(&database_url).await?;

    tracing::info!("Running marketplace migrations...");
    sqlx::migrate!("../marketplace/migrations").run(&pool).await?;

    tracing::info!("Marketplace migrations complete!");
    Ok(())
}
