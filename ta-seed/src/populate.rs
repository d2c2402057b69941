//! Teaser refresh for a local catalog file
//!
//! Crypto teasers are refreshed with one batch completion; every other
//! main-category item gets its own completion, paced by a rate limiter.
//! Answers that fail to parse leave the item untouched. Sub-category
//! entries then pick up the refreshed values of the same slug.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use ta_common::config::GenerativeConfig;
use ta_common::slug::slug_matches;
use ta_common::{Catalog, CategoryTeaserItem};
use ta_track::services::generative::{lenient_number, parse_json_answer, GenerativeError};
use ta_track::services::GenerativeClient;
use tracing::{debug, error, info, warn};

use crate::error::Result;

/// Minimum spacing between per-item completions
pub const POPULATE_INTERVAL: Duration = Duration::from_millis(1500);

/// Per-call timeout for populate completions
pub const POPULATE_TIMEOUT: Duration = Duration::from_secs(10);

const BATCH_CATEGORY: &str = "crypto";
const BATCH_TEMPERATURE: f32 = 0.1;
const BATCH_MAX_TOKENS: u32 = 500;
const ITEM_TEMPERATURE: f32 = 0.0;
const ITEM_MAX_TOKENS: u32 = 100;

/// Outcome of a populate run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PopulateReport {
    pub batch_updated: usize,
    pub items_updated: usize,
    pub items_skipped: usize,
}

#[derive(Debug, Deserialize)]
struct BatchQuote {
    slug: String,
    #[serde(default)]
    price: Option<Value>,
    #[serde(default, rename = "change24h")]
    change_24h: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ItemQuote {
    #[serde(default)]
    price: Option<Value>,
    #[serde(default)]
    trend: Option<Value>,
}

/// Batch prompt for crypto teasers
pub fn build_batch_prompt(slugs: &[&str]) -> String {
    format!(
        "For these top crypto items ({}): Fetch current USD prices + 24h % change. \
         Output ONLY valid JSON array, no other text: \
         [{{ \"slug\": \"bitcoin\", \"price\": number, \"change24h\": number }}, ...]. \
         Sources: CoinMarketCap. Accurate now.",
        slugs.join(", ")
    )
}

/// Per-item prompt; sources depend on the category
pub fn build_item_prompt(slug: &str, category: &str) -> String {
    let sources = match category {
        "stocks" | "technology" | "finance" | "healthcare" => "Yahoo Finance/Google Finance",
        "coins" => "PCGS/Numista",
        _ => "eBay/StockX/Wikipedia",
    };
    format!(
        "For \"{slug}\" in \"{category}\": Current USD price + 24h trend %. \
         Output STRICTLY valid JSON object, no other text: \
         {{ \"price\": number, \"trend\": number }}. Sources: {sources}."
    )
}

fn positive(value: Option<&Value>) -> Option<f64> {
    value
        .and_then(lenient_number)
        .filter(|v| v.is_finite() && *v > 0.0)
}

fn finite(value: Option<&Value>) -> Option<f64> {
    value.and_then(lenient_number).filter(|v| v.is_finite())
}

/// Apply a price/trend update; returns whether anything changed
fn apply_update(item: &mut CategoryTeaserItem, price: Option<f64>, trend: Option<f64>) -> bool {
    if price.is_none() && trend.is_none() {
        return false;
    }
    if let Some(price) = price {
        item.teaser_price = price;
    }
    if let Some(trend) = trend {
        item.trend = trend;
    }
    true
}

/// Copy main-item values onto sub-category entries with the same slug
pub fn sync_sub_categories(catalog: &mut Catalog) {
    for category in &mut catalog.categories {
        let latest: HashMap<String, (f64, f64)> = category
            .items
            .iter()
            .map(|item| (item.slug.to_lowercase(), (item.teaser_price, item.trend)))
            .collect();
        for sub in &mut category.sub_categories {
            for item in &mut sub.items {
                if let Some((price, trend)) = latest.get(&item.slug.to_lowercase()) {
                    item.teaser_price = *price;
                    item.trend = *trend;
                }
            }
        }
    }
}

/// Generative teaser refresher
pub struct Populator {
    client: Arc<GenerativeClient>,
    limiter: DefaultDirectRateLimiter,
}

impl Populator {
    pub fn new(client: Arc<GenerativeClient>, interval: Duration) -> Self {
        // a zero interval disables pacing in practice
        let quota = Quota::with_period(interval).unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX));
        Self {
            client,
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Client with the populate timeout and the default pacing
    pub fn from_config(config: &GenerativeConfig, api_key: String) -> std::result::Result<Self, GenerativeError> {
        let config = GenerativeConfig {
            timeout: POPULATE_TIMEOUT,
            ..config.clone()
        };
        let client = GenerativeClient::new(&config, api_key)?;
        Ok(Self::new(Arc::new(client), POPULATE_INTERVAL))
    }

    /// Refresh every teaser in `catalog`
    pub async fn populate(&self, catalog: &mut Catalog) -> PopulateReport {
        let mut report = PopulateReport::default();

        if let Some(crypto) = catalog.find_category_mut(BATCH_CATEGORY) {
            if !crypto.items.is_empty() {
                match self.refresh_batch(&mut crypto.items).await {
                    Ok(updated) => {
                        info!("Updated {} crypto teasers in one batch", updated);
                        report.batch_updated = updated;
                    }
                    Err(e) => error!("Crypto batch refresh failed: {}", e),
                }
            }
        }

        for category in &mut catalog.categories {
            if slug_matches(&category.name, BATCH_CATEGORY) {
                continue;
            }
            let category_name = category.name.to_lowercase();
            for item in &mut category.items {
                if self.refresh_item(item, &category_name).await {
                    report.items_updated += 1;
                } else {
                    report.items_skipped += 1;
                }
            }
        }

        sync_sub_categories(catalog);
        info!(
            batch = report.batch_updated,
            updated = report.items_updated,
            skipped = report.items_skipped,
            "Populate complete"
        );
        report
    }

    async fn refresh_batch(
        &self,
        items: &mut [CategoryTeaserItem],
    ) -> std::result::Result<usize, GenerativeError> {
        let slugs: Vec<&str> = items.iter().map(|item| item.slug.as_str()).collect();
        let prompt = build_batch_prompt(&slugs);

        let content = self
            .client
            .complete(&prompt, BATCH_TEMPERATURE, BATCH_MAX_TOKENS)
            .await?;
        let quotes: Vec<BatchQuote> = parse_json_answer(&content)?;

        let mut updated = 0;
        for item in items.iter_mut() {
            let Some(quote) = quotes.iter().find(|q| slug_matches(&q.slug, &item.slug)) else {
                continue;
            };
            if apply_update(item, positive(quote.price.as_ref()), finite(quote.change_24h.as_ref())) {
                updated += 1;
            }
        }
        Ok(updated)
    }

    /// Refresh one item; `false` when it was left untouched
    async fn refresh_item(&self, item: &mut CategoryTeaserItem, category: &str) -> bool {
        self.limiter.until_ready().await;
        debug!(item = %item.slug, category = %category, "Refreshing teaser");

        let prompt = build_item_prompt(&item.slug, category);
        let content = match self
            .client
            .complete(&prompt, ITEM_TEMPERATURE, ITEM_MAX_TOKENS)
            .await
        {
            Ok(content) => content,
            Err(e) => {
                warn!(item = %item.slug, "Teaser refresh failed: {}", e);
                return false;
            }
        };

        let quote: ItemQuote = match parse_json_answer(&content) {
            Ok(quote) => quote,
            Err(e) => {
                let preview: String = content.chars().take(100).collect();
                warn!(item = %item.slug, "Parse failed: {}. Raw: {:?}", e, preview);
                return false;
            }
        };

        let changed = apply_update(item, positive(quote.price.as_ref()), finite(quote.trend.as_ref()));
        if changed {
            info!(item = %item.slug, price = item.teaser_price, trend = item.trend, "Teaser updated");
        }
        changed
    }
}

/// Read a catalog file
pub async fn load_catalog_file(path: &Path) -> Result<Catalog> {
    let bytes = tokio::fs::read(path).await?;
    let catalog: Catalog = serde_json::from_slice(&bytes)?;
    info!("Loaded {} categories from {}", catalog.categories.len(), path.display());
    Ok(catalog)
}

/// Write a catalog file, pretty-printed
pub async fn write_catalog_file(path: &Path, catalog: &Catalog) -> Result<()> {
    let mut json = serde_json::to_string_pretty(catalog)?;
    json.push('\n');
    tokio::fs::write(path, json).await?;
    info!("Wrote {}", path.display());
    Ok(())
}
