//! Backend catalog seeding
//!
//! Clears `items` and `categories`, then rebuilds them:
//! 1. root `crypto` category plus the first 20 market-data coin categories
//! 2. the top 100 coins by market cap as `crypto` items
//! 3. an `altcoins` sub-category holding the first 3 coins
//! 4. with an Alpha Vantage key: three sectors, up to 500 listed symbols as
//!    `technology` items and a `tech-giants` sub-category holding 3 of them
//!
//! Upserts merge on `name` (categories) and `slug` (items), so re-upserting
//! an item under a sub-category moves it there.

use std::sync::Arc;
use std::time::Duration;
use ta_common::slug::placeholder_image_url;
use ta_track::services::backend::{NewCategoryRow, NewItemRow};
use ta_track::services::market_data::MarketCoin;
use ta_track::services::{BackendClient, MarketDataClient};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Result, SeedError};
use crate::listing::{fetch_listing, parse_listing, ListedSymbol, ALPHA_VANTAGE_BASE_URL, MAX_LISTED_SYMBOLS};

pub const CRYPTO_CATEGORY_COUNT: usize = 20;
pub const CRYPTO_ITEM_COUNT: u32 = 100;
pub const SUB_CATEGORY_ITEM_COUNT: usize = 3;

const CATEGORIES_TABLE: &str = "categories";
const ITEMS_TABLE: &str = "items";

/// What a seeding run wrote
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub categories: usize,
    pub crypto_items: usize,
    pub stock_items: usize,
}

fn category_row(slug: &str, label: &str, icon: &str, parent_id: Option<Uuid>) -> NewCategoryRow {
    NewCategoryRow {
        name: slug.to_string(),
        slug: slug.to_string(),
        label: label.to_string(),
        icon: icon.to_string(),
        description: None,
        parent_id,
    }
}

/// Thousands-separated whole number, or `N/A`
pub fn format_market_cap(cap: Option<f64>) -> String {
    let Some(cap) = cap.filter(|c| c.is_finite() && *c >= 0.0) else {
        return "N/A".to_string();
    };
    let digits = format!("{:.0}", cap);
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// `items` row for a market-data coin
pub fn crypto_item_row(coin: &MarketCoin, category_id: Uuid) -> NewItemRow {
    NewItemRow {
        slug: coin.id.clone(),
        name: coin.name.clone(),
        category_id,
        teaser_price: coin.current_price.unwrap_or(0.0),
        trend: coin.price_change_percentage_24h.unwrap_or(0.0),
        image_url: coin
            .image
            .clone()
            .unwrap_or_else(|| placeholder_image_url(&coin.id)),
        description: format!("{} - Cap: ${}", coin.name, format_market_cap(coin.market_cap)),
    }
}

/// `items` row for a listed stock; prices are filled in later by populate
pub fn stock_item_row(symbol: &ListedSymbol, category_id: Uuid) -> NewItemRow {
    let exchange = if symbol.exchange.is_empty() {
        "NASDAQ"
    } else {
        symbol.exchange.as_str()
    };
    NewItemRow {
        slug: symbol.symbol.clone(),
        name: format!("{} Stock", symbol.name),
        category_id,
        teaser_price: 0.0,
        trend: 0.0,
        image_url: placeholder_image_url(&symbol.symbol),
        description: format!("{} - {}", symbol.name, exchange),
    }
}

/// Backend catalog seeder
pub struct Seeder {
    backend: Arc<BackendClient>,
    market: Arc<MarketDataClient>,
    http_client: reqwest::Client,
    alpha_vantage_key: Option<String>,
    listing_base_url: String,
}

impl Seeder {
    pub fn new(
        backend: Arc<BackendClient>,
        market: Arc<MarketDataClient>,
        alpha_vantage_key: Option<String>,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SeedError::Listing(e.to_string()))?;

        Ok(Self {
            backend,
            market,
            http_client,
            alpha_vantage_key,
            listing_base_url: ALPHA_VANTAGE_BASE_URL.to_string(),
        })
    }

    pub fn with_listing_base_url(mut self, url: impl Into<String>) -> Self {
        self.listing_base_url = url.into();
        self
    }

    /// Run the full seeding sequence
    pub async fn run(&self) -> Result<SeedReport> {
        self.clear_tables().await?;

        let mut report = self.seed_crypto().await?;
        match &self.alpha_vantage_key {
            Some(key) => {
                let (categories, items) = self.seed_stocks(key).await?;
                report.categories += categories;
                report.stock_items = items;
            }
            None => warn!("Skipping stocks: ALPHA_VANTAGE_API_KEY not set"),
        }

        info!(
            categories = report.categories,
            crypto_items = report.crypto_items,
            stock_items = report.stock_items,
            "Seeding complete"
        );
        Ok(report)
    }

    async fn clear_tables(&self) -> Result<()> {
        info!("Clearing existing catalog rows");
        self.backend.delete_all(ITEMS_TABLE).await?;
        self.backend.delete_all(CATEGORIES_TABLE).await?;
        Ok(())
    }

    async fn category_id(&self, slug: &str) -> Result<Uuid> {
        self.backend
            .id_for_slug(CATEGORIES_TABLE, slug)
            .await?
            .ok_or_else(|| SeedError::MissingCategory(slug.to_string()))
    }

    /// Upsert a sub-category and move the first items of `items` into it
    async fn seed_sub_category(
        &self,
        row: NewCategoryRow,
        items: &[NewItemRow],
    ) -> Result<()> {
        self.backend
            .upsert(CATEGORIES_TABLE, &[row.clone()], "name")
            .await?;
        let sub_id = self.category_id(&row.slug).await?;

        let moved: Vec<NewItemRow> = items
            .iter()
            .take(SUB_CATEGORY_ITEM_COUNT)
            .map(|item| NewItemRow {
                category_id: sub_id,
                ..item.clone()
            })
            .collect();
        self.backend.upsert(ITEMS_TABLE, &moved, "slug").await?;
        Ok(())
    }

    async fn seed_crypto(&self) -> Result<SeedReport> {
        info!("Seeding crypto");

        let mut categories = vec![NewCategoryRow {
            description: Some("Cryptocurrencies".to_string()),
            ..category_row("crypto", "Crypto", "₿", None)
        }];
        categories.extend(
            self.market
                .category_list()
                .await?
                .into_iter()
                .take(CRYPTO_CATEGORY_COUNT)
                .map(|cat| NewCategoryRow {
                    name: cat.name.clone(),
                    slug: cat.category_id,
                    label: cat.name.clone(),
                    icon: "₿".to_string(),
                    description: Some(format!("Crypto: {}", cat.name)),
                    parent_id: None,
                }),
        );
        self.backend
            .upsert(CATEGORIES_TABLE, &categories, "name")
            .await?;

        let root_id = self.category_id("crypto").await?;
        let items: Vec<NewItemRow> = self
            .market
            .markets(CRYPTO_ITEM_COUNT)
            .await?
            .iter()
            .map(|coin| crypto_item_row(coin, root_id))
            .collect();
        self.backend.upsert(ITEMS_TABLE, &items, "slug").await?;

        self.seed_sub_category(category_row("altcoins", "Altcoins", "🪙", Some(root_id)), &items)
            .await?;

        info!(
            categories = categories.len(),
            items = items.len(),
            "Crypto seeded ({} in altcoins)",
            items.len().min(SUB_CATEGORY_ITEM_COUNT)
        );
        Ok(SeedReport {
            categories: categories.len() + 1,
            crypto_items: items.len(),
            stock_items: 0,
        })
    }

    async fn seed_stocks(&self, api_key: &str) -> Result<(usize, usize)> {
        info!("Seeding stocks");

        let sectors = [
            category_row("technology", "Technology", "💻", None),
            category_row("finance", "Finance", "🏦", None),
            category_row("healthcare", "Healthcare", "🏥", None),
        ];
        self.backend
            .upsert(CATEGORIES_TABLE, &sectors, "name")
            .await?;

        let csv_text = fetch_listing(&self.http_client, &self.listing_base_url, api_key).await?;
        let symbols = parse_listing(&csv_text, MAX_LISTED_SYMBOLS);
        info!("Parsed {} symbols from listing", symbols.len());

        let tech_id = self.category_id("technology").await?;
        let items: Vec<NewItemRow> = symbols
            .iter()
            .map(|symbol| stock_item_row(symbol, tech_id))
            .collect();
        self.backend.upsert(ITEMS_TABLE, &items, "slug").await?;

        self.seed_sub_category(
            category_row("tech-giants", "Tech Giants", "🚀", Some(tech_id)),
            &items,
        )
        .await?;

        Ok((sectors.len() + 1, items.len()))
    }
}
