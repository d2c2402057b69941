//! Development-mode mock source
//!
//! Substituted for the generative source when dev mode is on and no
//! generative API key is configured. Output depends only on the item,
//! the category and the reference date.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use std::collections::BTreeMap;
use ta_common::models::{SPEC_DESCRIPTION, SPEC_IMAGE_URL, SPEC_NAME, SPEC_SOURCE};
use ta_common::slug::{placeholder_image_url, title_case};
use ta_common::{PricePoint, TrackResult};

use super::price_source::PriceSource;
use crate::error::LookupError;

const CRYPTO_BASE_PRICE: f64 = 95_000.0;
const GENERIC_BASE_PRICE: f64 = 9_500.0;
const MOCK_DAYS: i64 = 30;

/// Deterministic mock track result
pub fn mock_track_result(item: &str, category: Option<&str>, today: NaiveDate) -> TrackResult {
    let is_crypto = category.map_or(false, |c| c.eq_ignore_ascii_case("crypto"));
    let (base, amplitude) = if is_crypto {
        (CRYPTO_BASE_PRICE, 5_000.0)
    } else {
        (GENERIC_BASE_PRICE, 500.0)
    };

    let history = (0..MOCK_DAYS)
        .map(|i| {
            let date = today - Duration::days(i);
            let price = base + (i as f64 / 3.0).sin() * amplitude;
            PricePoint::new(date.format("%Y-%m-%d").to_string(), price)
        })
        .collect();

    let name = title_case(item);
    let mut specs = BTreeMap::new();
    specs.insert(SPEC_NAME.to_string(), name.clone());
    specs.insert(
        SPEC_DESCRIPTION.to_string(),
        format!("Premium {} with historical value tracking via TrackAura.", name.to_lowercase()),
    );
    specs.insert(SPEC_IMAGE_URL.to_string(), placeholder_image_url(item));
    specs.insert(SPEC_SOURCE.to_string(), "TrackAura Dev Mock".to_string());

    TrackResult {
        current_price: base,
        history,
        specs,
    }
}

/// Mock price source; dates count back from `today` (defaults to the current UTC date)
#[derive(Debug, Default, Clone)]
pub struct MockPriceSource {
    today: Option<NaiveDate>,
}

impl MockPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the reference date
    pub fn with_today(today: NaiveDate) -> Self {
        Self { today: Some(today) }
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    fn source_id(&self) -> &'static str {
        "DevMock"
    }

    async fn fetch(
        &self,
        item_id: &str,
        category: Option<&str>,
    ) -> Result<TrackResult, LookupError> {
        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());
        Ok(mock_track_result(item_id, category, today))
    }
}
