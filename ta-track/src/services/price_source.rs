//! Price lookup strategies
//!
//! The lookup normalizer only talks to upstreams through these traits, so
//! the market-data, generative and mock sources are interchangeable and
//! tests can substitute fakes.

use async_trait::async_trait;
use ta_common::TrackResult;

use crate::error::LookupError;

/// Produces a full track result for one item
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Source identifier used in logs (e.g., "CoinGecko", "Grok")
    fn source_id(&self) -> &'static str;

    /// Fetch price, history and specs for `item_id`
    ///
    /// Results are normalized by the caller; implementations may return
    /// unsorted history.
    async fn fetch(&self, item_id: &str, category: Option<&str>)
        -> Result<TrackResult, LookupError>;
}

/// Latest price and 24h change for one item
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub price: f64,
    /// Percentage change over the trailing 24 hours
    pub change_24h: f64,
}

/// Produces live teaser quotes
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// `Ok(None)` when the source does not cover `item_id`
    async fn quote(&self, item_id: &str) -> Result<Option<Quote>, LookupError>;
}
