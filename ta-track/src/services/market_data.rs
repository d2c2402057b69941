//! CoinGecko market-data client
//!
//! Serves the known-identifier lookup path: a quote, a 30-day daily series
//! and coin metadata are fetched concurrently and merged into one
//! [`TrackResult`]. The same client feeds live teaser refreshes and the
//! seeding tool.

use async_trait::async_trait;
use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use ta_common::config::MarketConfig;
use ta_common::models::{SPEC_DESCRIPTION, SPEC_IMAGE_URL, SPEC_NAME, SPEC_SOURCE, SPEC_TREND};
use ta_common::normalize::truncate_description;
use ta_common::{PricePoint, TrackResult};
use thiserror::Error;
use tracing::{debug, info};

use super::price_source::{PriceSource, Quote, QuoteSource};
use crate::error::LookupError;

const USER_AGENT: &str = concat!("TrackAura/", env!("CARGO_PKG_VERSION"));
const API_KEY_HEADER: &str = "x-cg-demo-api-key";
const HISTORY_DAYS: u32 = 30;
const DESCRIPTION_MAX_CHARS: usize = 200;

/// Known identifiers served by the market-data path, with their aliases
const KNOWN_IDS: &[(&str, &[&str])] = &[
    ("bitcoin", &["btc"]),
    ("ethereum", &["eth", "ether"]),
    ("solana", &["sol"]),
    ("ripple", &["xrp"]),
    ("cardano", &["ada"]),
    ("dogecoin", &["doge"]),
    ("litecoin", &["ltc"]),
    ("polkadot", &["dot"]),
    ("chainlink", &["link"]),
    ("tether", &["usdt"]),
];

/// Resolve an item name to a known market identifier (case-insensitive)
pub fn resolve_known_id(item: &str) -> Option<&'static str> {
    let needle = item.trim().to_lowercase();
    KNOWN_IDS
        .iter()
        .find(|(id, aliases)| *id == needle || aliases.contains(&needle.as_str()))
        .map(|(id, _)| *id)
}

/// Market-data client errors
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("No quote returned for {0}")]
    MissingQuote(String),
}

impl From<MarketError> for LookupError {
    fn from(err: MarketError) -> Self {
        match err {
            MarketError::NetworkError(_) | MarketError::ApiError(..) => {
                LookupError::UpstreamUnavailable(format!("Market data unavailable: {}", err))
            }
            MarketError::ParseError(_) => {
                LookupError::MalformedUpstreamResponse(format!("Market data: {}", err))
            }
            MarketError::MissingQuote(_) => {
                LookupError::IncompleteUpstreamData(format!("Market data: {}", err))
            }
        }
    }
}

/// `/simple/price` entry
#[derive(Debug, Clone, Deserialize)]
struct SimplePriceEntry {
    usd: Option<f64>,
    usd_24h_change: Option<f64>,
}

/// `/coins/{id}/market_chart` response; `prices` holds `[unix_ms, price]` pairs
#[derive(Debug, Clone, Deserialize)]
struct MarketChart {
    prices: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoinDescription {
    pub en: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoinImage {
    pub large: Option<String>,
    pub small: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoinLinks {
    #[serde(default)]
    pub homepage: Vec<String>,
}

/// `/coins/{id}` response (metadata only)
#[derive(Debug, Clone, Deserialize)]
pub struct CoinDetail {
    pub id: String,
    #[serde(default)]
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub description: CoinDescription,
    #[serde(default)]
    pub image: CoinImage,
    #[serde(default)]
    pub links: CoinLinks,
}

/// `/coins/categories/list` entry
#[derive(Debug, Clone, Deserialize)]
pub struct CoinCategory {
    pub category_id: String,
    pub name: String,
}

/// `/coins/markets` entry
#[derive(Debug, Clone, Deserialize)]
pub struct MarketCoin {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,
}

/// CoinGecko API client
pub struct MarketDataClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl MarketDataClient {
    pub fn new(config: &MarketConfig) -> Result<Self, MarketError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MarketError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, MarketError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Querying market data API");

        let mut request = self.http_client.get(&url).query(query);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MarketError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(MarketError::ApiError(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| MarketError::ParseError(e.to_string()))
    }

    /// Current USD price and 24h change for several identifiers in one call
    pub async fn quotes(&self, ids: &[&str]) -> Result<HashMap<String, Quote>, MarketError> {
        let entries: HashMap<String, SimplePriceEntry> = self
            .get_json(
                "/simple/price",
                &[
                    ("ids", ids.join(",")),
                    ("vs_currencies", "usd".to_string()),
                    ("include_24hr_change", "true".to_string()),
                ],
            )
            .await?;

        Ok(entries
            .into_iter()
            .filter_map(|(id, entry)| {
                let price = entry.usd.filter(|p| p.is_finite())?;
                Some((
                    id,
                    Quote {
                        price,
                        change_24h: entry.usd_24h_change.unwrap_or(0.0),
                    },
                ))
            })
            .collect())
    }

    /// Current quote for one identifier
    pub async fn quote(&self, id: &str) -> Result<Quote, MarketError> {
        self.quotes(&[id])
            .await?
            .remove(id)
            .ok_or_else(|| MarketError::MissingQuote(id.to_string()))
    }

    /// Daily USD price series for the last `days` days, newest first
    pub async fn daily_history(&self, id: &str, days: u32) -> Result<Vec<PricePoint>, MarketError> {
        let chart: MarketChart = self
            .get_json(
                &format!("/coins/{}/market_chart", id),
                &[
                    ("vs_currency", "usd".to_string()),
                    ("days", days.to_string()),
                    ("interval", "daily".to_string()),
                ],
            )
            .await?;

        // The series ends with an intraday "now" sample on the same date as
        // the last daily close; newest-first order lets normalization keep it.
        Ok(chart
            .prices
            .into_iter()
            .rev()
            .filter_map(|(ms, price)| {
                let ts = DateTime::from_timestamp_millis(ms as i64)?;
                Some(PricePoint::new(ts.format("%Y-%m-%d").to_string(), price))
            })
            .collect())
    }

    /// Descriptive metadata for one identifier
    pub async fn coin_detail(&self, id: &str) -> Result<CoinDetail, MarketError> {
        self.get_json(
            &format!("/coins/{}", id),
            &[
                ("localization", "false".to_string()),
                ("tickers", "false".to_string()),
                ("market_data", "false".to_string()),
                ("community_data", "false".to_string()),
                ("developer_data", "false".to_string()),
            ],
        )
        .await
    }

    /// Coin category list (seeding)
    pub async fn category_list(&self) -> Result<Vec<CoinCategory>, MarketError> {
        self.get_json("/coins/categories/list", &[]).await
    }

    /// Top coins by market cap (seeding)
    pub async fn markets(&self, per_page: u32) -> Result<Vec<MarketCoin>, MarketError> {
        self.get_json(
            "/coins/markets",
            &[
                ("vs_currency", "usd".to_string()),
                ("per_page", per_page.to_string()),
            ],
        )
        .await
    }
}

/// Merge the three market-data responses into one track result
pub fn build_track_result(quote: Quote, history: Vec<PricePoint>, detail: CoinDetail) -> TrackResult {
    let mut specs = BTreeMap::new();
    specs.insert(SPEC_NAME.to_string(), detail.name);
    if !detail.symbol.is_empty() {
        specs.insert("Symbol".to_string(), detail.symbol.to_uppercase());
    }
    if let Some(text) = detail.description.en.filter(|t| !t.trim().is_empty()) {
        specs.insert(
            SPEC_DESCRIPTION.to_string(),
            truncate_description(&text, DESCRIPTION_MAX_CHARS),
        );
    }
    if let Some(image) = detail.image.large.or(detail.image.small) {
        specs.insert(SPEC_IMAGE_URL.to_string(), image);
    }
    if let Some(homepage) = detail.links.homepage.into_iter().find(|h| !h.trim().is_empty()) {
        specs.insert("Homepage".to_string(), homepage);
    }
    specs.insert(SPEC_TREND.to_string(), format!("{:.2}", quote.change_24h));
    specs.insert(SPEC_SOURCE.to_string(), "CoinGecko".to_string());

    TrackResult {
        current_price: quote.price,
        history,
        specs,
    }
}

/// Known-identifier price source backed by [`MarketDataClient`]
pub struct MarketPriceSource {
    client: Arc<MarketDataClient>,
}

impl MarketPriceSource {
    pub fn new(client: Arc<MarketDataClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PriceSource for MarketPriceSource {
    fn source_id(&self) -> &'static str {
        "CoinGecko"
    }

    async fn fetch(
        &self,
        item_id: &str,
        _category: Option<&str>,
    ) -> Result<TrackResult, LookupError> {
        let id = resolve_known_id(item_id).unwrap_or(item_id);

        let (quote, history, detail) = tokio::try_join!(
            self.client.quote(id),
            self.client.daily_history(id, HISTORY_DAYS),
            self.client.coin_detail(id),
        )?;

        info!(
            item = %id,
            price = quote.price,
            points = history.len(),
            "Retrieved market data"
        );

        Ok(build_track_result(quote, history, detail))
    }
}

#[async_trait]
impl QuoteSource for MarketPriceSource {
    async fn quote(&self, item_id: &str) -> Result<Option<Quote>, LookupError> {
        match resolve_known_id(item_id) {
            Some(id) => Ok(Some(self.client.quote(id).await?)),
            None => Ok(None),
        }
    }
}
