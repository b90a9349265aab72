use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use techstore_seed::{Initializer, SqliteConfig};

/// Create the `products` table and reset it to the fixed TechStore catalog.
#[derive(Debug, Parser)]
#[command(name = "techstore-seed", version, about)]
struct Cli {
    /// SQLite database file (`:memory:` for a throwaway run). Defaults to
    /// `DB_PATH`, then `techstore.db`.
    #[arg(long)]
    db: Option<String>,

    /// Print the seeded rows as JSON on stdout.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = SqliteConfig::resolve(cli.db).context("failed to load configuration")?;

    let mut initializer = Initializer::open(&config)
        .with_context(|| format!("failed to open database at {}", config.db_path))?;
    let report = initializer.run().context("catalog initialization failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for product in &report.products {
            info!(
                id = product.id,
                name = %product.name,
                price = %product.price,
                category = %product.category,
                "product"
            );
        }
    }
    Ok(())
}
