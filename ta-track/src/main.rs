//! TrackAura lookup service (ta-track) - Main entry point
//!
//! Resolves configuration, builds the upstream clients once and serves the
//! lookup API plus the static front-end.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use ta_common::config::{CatalogSetting, TrackAuraConfig};
use ta_track::services::{
    BackendCatalog, BackendClient, CatalogSource, FileCatalog, GenerativeClient,
    GenerativePriceSource, HttpCatalog, ItemLookup, MarketDataClient, MarketPriceSource,
};
use ta_track::{build_router, AppState};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for ta-track
#[derive(Parser, Debug)]
#[command(name = "ta-track")]
#[command(about = "TrackAura item lookup service")]
#[command(version)]
struct Args {
    /// TOML config file (overrides TRACKAURA_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (overrides TRACKAURA_BIND)
    #[arg(short, long)]
    bind: Option<String>,

    /// Serve mock data for generic items when no generative key is set
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ta_track=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting TrackAura lookup service (ta-track) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let mut config =
        TrackAuraConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if args.dev {
        config.dev_mode = true;
    }

    let state = build_state(&config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;
    info!("ta-track listening on http://{}", config.bind);
    info!("Health check: http://{}/health", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Construct every client once and wire them into the application state
fn build_state(config: &TrackAuraConfig) -> Result<AppState> {
    let backend = match &config.backend {
        Some(backend_config) => Some(Arc::new(
            BackendClient::new(backend_config).context("Failed to build backend client")?,
        )),
        None => None,
    };

    let catalog: Arc<dyn CatalogSource> = match &config.catalog {
        CatalogSetting::File(path) => {
            info!("Category catalog: file {}", path.display());
            Arc::new(FileCatalog::new(path.clone()))
        }
        CatalogSetting::Url(url) => {
            info!("Category catalog: {}", url);
            Arc::new(HttpCatalog::new(Some(url.clone())).context("Failed to build catalog client")?)
        }
        CatalogSetting::FromRequest => {
            info!("Category catalog: derived from request origin");
            Arc::new(HttpCatalog::new(None).context("Failed to build catalog client")?)
        }
        CatalogSetting::Backend => match &backend {
            Some(client) => {
                info!("Category catalog: backend tables");
                Arc::new(BackendCatalog::new(client.clone()))
            }
            None => bail!("TRACKAURA_CATALOG=backend requires TRACKAURA_BACKEND_URL and TRACKAURA_BACKEND_ANON_KEY"),
        },
    };

    let market_client = Arc::new(
        MarketDataClient::new(&config.market).context("Failed to build market data client")?,
    );
    let market = Arc::new(MarketPriceSource::new(market_client));

    let mut lookup = ItemLookup::new(catalog, market.clone()).with_dev_mode(config.dev_mode);
    if config.live_teasers {
        info!("Teaser prices refreshed from market data");
        lookup = lookup.with_live_quotes(market);
    }
    match &config.generative.api_key {
        Some(key) => {
            let client = GenerativeClient::new(&config.generative, key.clone())
                .context("Failed to build generative client")?;
            lookup = lookup.with_generative(Arc::new(GenerativePriceSource::new(Arc::new(client))));
        }
        None if config.dev_mode => warn!("Dev mode: generic items answered with mock data"),
        None => {}
    }

    let mut state = AppState::new(Arc::new(lookup), config.public_dir.clone());
    if let Some(client) = backend {
        state = state.with_backend(client);
    }
    Ok(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
