//! Farmstand CLI - database migrations and catalog seeding.
//!
//! # Usage
//!
//! ```bash
//! # Run marketplace database migrations
//! fs-cli migrate
//!
//! # Load producers and products from a YAML catalog
//! fs-cli seed crates/cli/catalog.example.yaml
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "fs-cli")]
#[command(author, version, about = "Farmstand CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run marketplace database migrations
    Migrate,
    /// Seed producers and products from a YAML catalog
    Seed {
        /// Path to the catalog file
        file: String,

        /// Validate the catalog without touching the database
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::marketplace().await?,
        Commands::Seed { file, dry_run } => commands::seed::catalog(&file, dry_run).await?,
    }
    Ok(())
}
