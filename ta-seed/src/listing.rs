//! Alpha Vantage listing download and parsing

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Result, SeedError};

pub const ALPHA_VANTAGE_BASE_URL: &str = "https://www.alphavantage.co";

/// Symbols taken from the listing
pub const MAX_LISTED_SYMBOLS: usize = 500;

/// `LISTING_STATUS` CSV row; columns beyond these are ignored
#[derive(Debug, Deserialize)]
struct ListingRecord {
    symbol: String,
    name: String,
    #[serde(default)]
    exchange: String,
}

/// Listed stock symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedSymbol {
    /// Lowercased ticker, used as the item slug
    pub symbol: String,
    pub name: String,
    pub exchange: String,
}

/// Parse the first `limit` data rows of a listing CSV
///
/// Rows that fail to parse or have a blank symbol or name still count
/// toward `limit` and are skipped.
pub fn parse_listing(csv_text: &str, limit: usize) -> Vec<ListedSymbol> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(csv_text.as_bytes());

    reader
        .deserialize::<ListingRecord>()
        .take(limit)
        .filter_map(|row| match row {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("Skipping listing row: {}", e);
                None
            }
        })
        .filter(|record| !record.symbol.is_empty() && !record.name.is_empty())
        .map(|record| ListedSymbol {
            symbol: record.symbol.to_lowercase(),
            name: record.name,
            exchange: record.exchange,
        })
        .collect()
}

/// Download the active listing CSV
pub async fn fetch_listing(
    http_client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
) -> Result<String> {
    let url = format!("{}/query", base_url.trim_end_matches('/'));
    debug!(url = %url, "Downloading stock listing");

    let response = http_client
        .get(&url)
        .query(&[("function", "LISTING_STATUS"), ("apikey", api_key)])
        .send()
        .await
        .map_err(|e| SeedError::Listing(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        warn!("Listing download returned {}", status);
        return Err(SeedError::Listing(format!("HTTP {}", status.as_u16())));
    }

    response
        .text()
        .await
        .map_err(|e| SeedError::Listing(e.to_string()))
}
