//! TrackAura catalog batch tool (ta-seed)
//!
//! `seed` rebuilds the backend catalog tables; `populate` refreshes teaser
//! prices in a local `categories.json`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use ta_common::config::{CatalogSetting, TrackAuraConfig, DEFAULT_CATALOG_FILE};
use ta_seed::populate::{load_catalog_file, write_catalog_file};
use ta_seed::{Populator, Seeder};
use ta_track::services::{BackendClient, MarketDataClient};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for ta-seed
#[derive(Parser, Debug)]
#[command(name = "ta-seed")]
#[command(about = "TrackAura catalog seeding and teaser refresh")]
#[command(version)]
struct Cli {
    /// TOML config file (overrides TRACKAURA_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clear and rebuild the backend categories/items tables
    Seed,

    /// Refresh teaser prices in a local catalog file
    Populate {
        /// Catalog file (default: the configured catalog file)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Print the refreshed catalog instead of writing it
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ta_seed=info,ta_track=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    info!("ta-seed v{}", env!("CARGO_PKG_VERSION"));

    let config =
        TrackAuraConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Seed => run_seed(&config).await,
        Command::Populate { catalog, dry_run } => run_populate(&config, catalog, dry_run).await,
    }
}

async fn run_seed(config: &TrackAuraConfig) -> Result<()> {
    let backend_config = config.backend.as_ref().ok_or_else(|| {
        anyhow!("Seeding needs TRACKAURA_BACKEND_URL and TRACKAURA_BACKEND_ANON_KEY")
    })?;
    if backend_config.service_key.is_none() {
        return Err(anyhow!("Seeding needs TRACKAURA_BACKEND_SERVICE_KEY for writes"));
    }

    let backend = Arc::new(BackendClient::new(backend_config).context("Failed to build backend client")?);
    let market = Arc::new(
        MarketDataClient::new(&config.market).context("Failed to build market data client")?,
    );

    let seeder = Seeder::new(backend, market, config.alpha_vantage_api_key.clone())?;
    let report = seeder.run().await.context("Seeding failed")?;

    info!(
        "Seeded {} categories, {} crypto items, {} stock items",
        report.categories, report.crypto_items, report.stock_items
    );
    Ok(())
}

async fn run_populate(
    config: &TrackAuraConfig,
    catalog_path: Option<PathBuf>,
    dry_run: bool,
) -> Result<()> {
    let api_key = config
        .generative
        .api_key
        .clone()
        .ok_or_else(|| anyhow!("Populate needs GROK_API_KEY"))?;

    let path = catalog_path.unwrap_or_else(|| match &config.catalog {
        CatalogSetting::File(path) => path.clone(),
        _ => PathBuf::from(DEFAULT_CATALOG_FILE),
    });

    let mut catalog = load_catalog_file(&path)
        .await
        .with_context(|| format!("Failed to load {}", path.display()))?;

    let populator = Populator::from_config(&config.generative, api_key)
        .context("Failed to build generative client")?;
    let report = populator.populate(&mut catalog).await;

    if dry_run {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
    } else {
        write_catalog_file(&path, &catalog)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    info!(
        "Populate finished: {} batch, {} updated, {} skipped",
        report.batch_updated, report.items_updated, report.items_skipped
    );
    Ok(())
}
