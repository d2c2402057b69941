//! Item lookup normalizer
//!
//! Routes a lookup request to one of three paths (first match wins):
//! 1. `top-<N>-<category>`: category teaser list from the catalog
//! 2. known market identifier: market-data source
//! 3. anything else: generative source, or the mock in dev mode when no
//!    generative key is configured
//!
//! Every track result is normalized (see [`ta_common::normalize`]) before
//! it is returned.

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ta_common::normalize::normalize_track_result;
use ta_common::{Catalog, CategoryTeaserItem, TrackResult};
use tracing::{debug, info};

use super::catalog::CatalogSource;
use super::market_data::resolve_known_id;
use super::mock::MockPriceSource;
use super::price_source::{PriceSource, QuoteSource};
use crate::error::LookupError;

/// Inbound lookup request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupRequest {
    #[serde(default)]
    pub item: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Successful lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LookupOutcome {
    Track(TrackResult),
    Teaser { related: Vec<CategoryTeaserItem> },
}

/// Which path a lookup takes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupRoute {
    Teaser { count: usize, category: String },
    Known(&'static str),
    Generic,
}

/// Classify an item identifier
pub fn route(item: &str) -> Result<LookupRoute, LookupError> {
    let item = item.trim();

    if let Some(rest) = item.strip_prefix("top-") {
        let invalid = || LookupError::BadRequest("Invalid teaser format (e.g., top-6-crypto)".to_string());
        let (count, category) = rest.split_once('-').ok_or_else(invalid)?;
        let count: usize = count.parse().map_err(|_| invalid())?;
        if category.trim().is_empty() {
            return Err(invalid());
        }
        return Ok(LookupRoute::Teaser {
            count,
            category: category.to_lowercase(),
        });
    }

    match resolve_known_id(item) {
        Some(id) => Ok(LookupRoute::Known(id)),
        None => Ok(LookupRoute::Generic),
    }
}

/// Category summary for listings
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub name: String,
    pub label: String,
    pub item_count: usize,
    pub sub_categories: Vec<String>,
}

/// The lookup normalizer with its injected strategies
pub struct ItemLookup {
    catalog: Arc<dyn CatalogSource>,
    market: Arc<dyn PriceSource>,
    generative: Option<Arc<dyn PriceSource>>,
    mock: Arc<dyn PriceSource>,
    live_quotes: Option<Arc<dyn QuoteSource>>,
    dev_mode: bool,
}

impl ItemLookup {
    pub fn new(catalog: Arc<dyn CatalogSource>, market: Arc<dyn PriceSource>) -> Self {
        Self {
            catalog,
            market,
            generative: None,
            mock: Arc::new(MockPriceSource::new()),
            live_quotes: None,
            dev_mode: false,
        }
    }

    /// Source for generic items; without one, generic lookups need dev mode
    pub fn with_generative(mut self, source: Arc<dyn PriceSource>) -> Self {
        self.generative = Some(source);
        self
    }

    pub fn with_mock(mut self, source: Arc<dyn PriceSource>) -> Self {
        self.mock = source;
        self
    }

    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    /// Refresh teaser prices from `quotes` before returning them
    pub fn with_live_quotes(mut self, quotes: Arc<dyn QuoteSource>) -> Self {
        self.live_quotes = Some(quotes);
        self
    }

    /// Handle a lookup request
    pub async fn lookup(
        &self,
        request: &LookupRequest,
        origin: Option<&str>,
    ) -> Result<LookupOutcome, LookupError> {
        let item = request
            .item
            .as_deref()
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .ok_or_else(|| LookupError::BadRequest("Missing item slug".to_string()))?;
        let category = request
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        info!(item = %item, category = ?category, "Lookup received");

        match route(item)? {
            LookupRoute::Teaser {
                count,
                category: teaser,
            } => {
                let related = self.teaser(count, &teaser, category, origin).await?;
                Ok(LookupOutcome::Teaser { related })
            }
            LookupRoute::Known(id) => {
                let result = self.market.fetch(id, category).await?;
                Ok(LookupOutcome::Track(normalize_track_result(result, id)))
            }
            LookupRoute::Generic => {
                let result = self.generic_source()?.fetch(item, category).await?;
                Ok(LookupOutcome::Track(normalize_track_result(result, item)))
            }
        }
    }

    /// Track result for a single item; teaser identifiers are rejected
    pub async fn track(
        &self,
        item: &str,
        category: Option<&str>,
    ) -> Result<TrackResult, LookupError> {
        let request = LookupRequest {
            item: Some(item.to_string()),
            category: category.map(str::to_string),
        };
        match self.lookup(&request, None).await? {
            LookupOutcome::Track(result) => Ok(result),
            LookupOutcome::Teaser { .. } => Err(LookupError::BadRequest(format!(
                "{} is a teaser identifier, not an item",
                item
            ))),
        }
    }

    fn generic_source(&self) -> Result<&Arc<dyn PriceSource>, LookupError> {
        match &self.generative {
            Some(source) => Ok(source),
            None if self.dev_mode => {
                debug!("No generative source configured, using dev mock");
                Ok(&self.mock)
            }
            None => Err(LookupError::ConfigurationError(
                "Generative API key missing: set GROK_API_KEY".to_string(),
            )),
        }
    }

    async fn load_catalog(&self, origin: Option<&str>) -> Result<Catalog, LookupError> {
        Ok(self.catalog.load(origin).await?)
    }

    /// Up to `count` items of a category or one of its sub-categories
    ///
    /// `main_hint` names the main category when `teaser` is a sub-category.
    pub async fn teaser(
        &self,
        count: usize,
        teaser: &str,
        main_hint: Option<&str>,
        origin: Option<&str>,
    ) -> Result<Vec<CategoryTeaserItem>, LookupError> {
        let catalog = self.load_catalog(origin).await?;
        let main_name = main_hint.unwrap_or(teaser);

        let main = catalog.find_category(main_name).ok_or_else(|| {
            debug!(
                category = %main_name,
                available = ?catalog.categories.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                "Main category missing"
            );
            LookupError::CategoryNotFound(main_name.to_string())
        })?;

        let items = if ta_common::slug::slug_matches(teaser, &main.name) {
            &main.items
        } else {
            &main
                .find_sub_category(teaser)
                .ok_or_else(|| LookupError::SubCategoryNotFound(teaser.to_string()))?
                .items
        };

        let mut related: Vec<CategoryTeaserItem> = items.iter().take(count).cloned().collect();
        if let Some(quotes) = &self.live_quotes {
            related = refresh_teasers(quotes.as_ref(), related).await?;
        }

        info!(category = %main_name, items = related.len(), "Teaser lookup complete");
        Ok(related)
    }

    /// Every item of a main category (GET variant)
    pub async fn category_items(
        &self,
        name: &str,
        origin: Option<&str>,
    ) -> Result<(String, Vec<CategoryTeaserItem>), LookupError> {
        let catalog = self.load_catalog(origin).await?;
        let category = catalog
            .find_category(name)
            .ok_or_else(|| LookupError::CategoryNotFound(name.to_string()))?;
        Ok((category.name.clone(), category.all_items()))
    }

    /// Summaries of every main category
    pub async fn categories(&self, origin: Option<&str>) -> Result<Vec<CategorySummary>, LookupError> {
        let catalog = self.load_catalog(origin).await?;
        Ok(catalog
            .categories
            .iter()
            .map(|category| CategorySummary {
                name: category.name.clone(),
                label: category
                    .label
                    .clone()
                    .unwrap_or_else(|| ta_common::slug::title_case(&category.name)),
                item_count: category.all_items().len(),
                sub_categories: category
                    .sub_categories
                    .iter()
                    .map(|sub| sub.name.clone())
                    .collect(),
            })
            .collect())
    }
}

/// Refresh teaser prices concurrently; items the source does not cover keep their values
async fn refresh_teasers(
    quotes: &dyn QuoteSource,
    items: Vec<CategoryTeaserItem>,
) -> Result<Vec<CategoryTeaserItem>, LookupError> {
    try_join_all(items.into_iter().map(|mut item| async move {
        if let Some(quote) = quotes.quote(&item.slug).await? {
            item.teaser_price = quote.price;
            item.trend = quote.change_24h;
        }
        Ok::<_, LookupError>(item)
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::CatalogError;
    use crate::services::price_source::Quote;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use ta_common::{Category, PricePoint, SubCategory};

    struct StaticCatalog(Catalog);

    #[async_trait]
    impl CatalogSource for StaticCatalog {
        async fn load(&self, _origin: Option<&str>) -> Result<Catalog, CatalogError> {
            Ok(self.0.clone())
        }
    }

    /// Returns a fixed result and counts calls
    struct FixedSource {
        result: Result<TrackResult, LookupError>,
        calls: AtomicUsize,
    }

    impl FixedSource {
        fn ok(result: TrackResult) -> Arc<Self> {
            Arc::new(Self {
                result: Ok(result),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(err: LookupError) -> Arc<Self> {
            Arc::new(Self {
                result: Err(err),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PriceSource for FixedSource {
        fn source_id(&self) -> &'static str {
            "Fixed"
        }

        async fn fetch(&self, _item: &str, _category: Option<&str>) -> Result<TrackResult, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    struct BitcoinQuotes;

    #[async_trait]
    impl QuoteSource for BitcoinQuotes {
        async fn quote(&self, item_id: &str) -> Result<Option<Quote>, LookupError> {
            Ok((item_id == "bitcoin").then_some(Quote {
                price: 100_000.0,
                change_24h: 4.2,
            }))
        }
    }

    fn teaser(slug: &str) -> CategoryTeaserItem {
        CategoryTeaserItem {
            slug: slug.to_string(),
            name: slug.to_string(),
            image_url: String::new(),
            teaser_price: 1.0,
            trend: 0.0,
        }
    }

    fn catalog() -> Catalog {
        Catalog {
            categories: vec![
                Category {
                    name: "crypto".to_string(),
                    label: Some("Crypto".to_string()),
                    icon: None,
                    items: ["bitcoin", "ethereum", "solana", "ripple", "cardano", "dogecoin", "litecoin"]
                        .into_iter()
                        .map(teaser)
                        .collect(),
                    sub_categories: vec![SubCategory {
                        name: "altcoins".to_string(),
                        label: None,
                        items: vec![teaser("solana"), teaser("polkadot")],
                    }],
                },
                Category {
                    name: "stocks".to_string(),
                    label: None,
                    icon: None,
                    items: vec![teaser("aapl")],
                    sub_categories: vec![SubCategory {
                        name: "tech-giants".to_string(),
                        label: Some("Tech Giants".to_string()),
                        items: vec![teaser("aapl"), teaser("googl"), teaser("amzn")],
                    }],
                },
            ],
        }
    }

    /// 40 shuffled daily points with one duplicate date and one bad row
    fn messy_result() -> TrackResult {
        let mut history: Vec<PricePoint> = (1..=40)
            .map(|d| {
                let date = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap() + chrono::Duration::days(d);
                PricePoint::new(date.format("%Y-%m-%d").to_string(), d as f64)
            })
            .collect();
        history.swap(0, 39);
        history.push(PricePoint::new("not-a-date", 5.0));
        history.push(PricePoint::new("2025-11-10", f64::NAN));
        TrackResult {
            current_price: 40.0,
            history,
            specs: BTreeMap::from([("Name".to_string(), "Bitcoin".to_string())]),
        }
    }

    fn lookup_with(market: Arc<FixedSource>) -> ItemLookup {
        ItemLookup::new(Arc::new(StaticCatalog(catalog())), market)
    }

    fn request(item: &str, category: Option<&str>) -> LookupRequest {
        LookupRequest {
            item: Some(item.to_string()),
            category: category.map(str::to_string),
        }
    }

    #[test]
    fn test_route_teaser() {
        assert_eq!(
            route("top-6-crypto").unwrap(),
            LookupRoute::Teaser {
                count: 6,
                category: "crypto".to_string()
            }
        );
        assert_eq!(
            route("top-3-Tech-Giants").unwrap(),
            LookupRoute::Teaser {
                count: 3,
                category: "tech-giants".to_string()
            }
        );
    }

    #[test]
    fn test_route_invalid_teaser() {
        for item in ["top-", "top-six-crypto", "top-6", "top-6-", "top--1-crypto"] {
            assert!(
                matches!(route(item), Err(LookupError::BadRequest(_))),
                "{} should be rejected",
                item
            );
        }
    }

    #[test]
    fn test_route_known_and_generic() {
        assert_eq!(route("Bitcoin").unwrap(), LookupRoute::Known("bitcoin"));
        assert_eq!(route("eth").unwrap(), LookupRoute::Known("ethereum"));
        assert_eq!(route("topaz-ring").unwrap(), LookupRoute::Generic);
        assert_eq!(route("unobtainium-widget-9000").unwrap(), LookupRoute::Generic);
    }

    #[tokio::test]
    async fn test_blank_item_is_bad_request() {
        let lookup = lookup_with(FixedSource::ok(messy_result()));
        for req in [LookupRequest::default(), request("   ", None)] {
            let err = lookup.lookup(&req, None).await.unwrap_err();
            assert!(matches!(err, LookupError::BadRequest(_)));
        }
    }

    #[tokio::test]
    async fn test_known_item_is_normalized() {
        let market = FixedSource::ok(messy_result());
        let lookup = lookup_with(market.clone());

        let LookupOutcome::Track(result) = lookup.lookup(&request("BTC", None), None).await.unwrap() else {
            panic!("expected a track result");
        };
        assert_eq!(market.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.history.len(), 30);
        assert!(result.history.windows(2).all(|w| w[0].date > w[1].date));
        assert_eq!(result.history[0].date, "2025-11-10");
        assert!(result.specs["Image URL"].ends_with("BITCOIN"));
    }

    #[tokio::test]
    async fn test_teaser_limits_count() {
        let lookup = lookup_with(FixedSource::ok(messy_result()));

        let LookupOutcome::Teaser { related } =
            lookup.lookup(&request("top-6-crypto", None), None).await.unwrap()
        else {
            panic!("expected teasers");
        };
        assert_eq!(related.len(), 6);
        assert_eq!(related[0].slug, "bitcoin");

        let LookupOutcome::Teaser { related } =
            lookup.lookup(&request("top-50-crypto", None), None).await.unwrap()
        else {
            panic!("expected teasers");
        };
        assert_eq!(related.len(), 7);
    }

    #[tokio::test]
    async fn test_teaser_sub_category_with_main_hint() {
        let lookup = lookup_with(FixedSource::ok(messy_result()));

        let LookupOutcome::Teaser { related } = lookup
            .lookup(&request("top-3-TECH-GIANTS", Some("Stocks")), None)
            .await
            .unwrap()
        else {
            panic!("expected teasers");
        };
        let slugs: Vec<_> = related.iter().map(|i| i.slug.as_str()).collect();
        assert_eq!(slugs, ["aapl", "googl", "amzn"]);
    }

    #[tokio::test]
    async fn test_teaser_missing_categories() {
        let lookup = lookup_with(FixedSource::ok(messy_result()));

        let err = lookup
            .lookup(&request("top-6-antiques", None), None)
            .await
            .unwrap_err();
        assert_eq!(err, LookupError::CategoryNotFound("antiques".to_string()));

        let err = lookup
            .lookup(&request("top-6-memecoins", Some("crypto")), None)
            .await
            .unwrap_err();
        assert_eq!(err, LookupError::SubCategoryNotFound("memecoins".to_string()));
    }

    #[tokio::test]
    async fn test_live_quotes_refresh_known_teasers() {
        let lookup = lookup_with(FixedSource::ok(messy_result())).with_live_quotes(Arc::new(BitcoinQuotes));

        let related = lookup.teaser(2, "crypto", None, None).await.unwrap();
        assert_eq!(related[0].teaser_price, 100_000.0);
        assert_eq!(related[0].trend, 4.2);
        assert_eq!(related[1].teaser_price, 1.0);
    }

    #[tokio::test]
    async fn test_generic_without_key_needs_dev_mode() {
        let lookup = lookup_with(FixedSource::ok(messy_result()));
        let err = lookup
            .lookup(&request("unobtainium-widget-9000", None), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::ConfigurationError(_)));

        let today = NaiveDate::from_ymd_opt(2025, 11, 8).unwrap();
        let lookup = lookup_with(FixedSource::ok(messy_result()))
            .with_mock(Arc::new(MockPriceSource::with_today(today)))
            .with_dev_mode(true);
        let first = lookup.track("unobtainium-widget-9000", None).await.unwrap();
        let second = lookup.track("unobtainium-widget-9000", None).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.current_price, 9_500.0);
        assert_eq!(first.specs["Source"], "TrackAura Dev Mock");
    }

    #[tokio::test]
    async fn test_generative_source_preferred_over_mock() {
        let generative = FixedSource::failing(LookupError::UpstreamUnavailable("down".to_string()));
        let lookup = lookup_with(FixedSource::ok(messy_result()))
            .with_generative(generative.clone())
            .with_dev_mode(true);

        let err = lookup.track("topaz-ring", Some("jewelry")).await.unwrap_err();
        assert_eq!(err, LookupError::UpstreamUnavailable("down".to_string()));
        assert_eq!(generative.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_track_rejects_teaser_identifier() {
        let lookup = lookup_with(FixedSource::ok(messy_result()));
        let err = lookup.track("top-3-crypto", None).await.unwrap_err();
        assert!(matches!(err, LookupError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_category_listing() {
        let lookup = lookup_with(FixedSource::ok(messy_result()));

        let (name, items) = lookup.category_items("Crypto", None).await.unwrap();
        assert_eq!(name, "crypto");
        assert_eq!(items.len(), 8);
        assert_eq!(items.last().unwrap().slug, "polkadot");

        let summaries = lookup.categories(None).await.unwrap();
        assert_eq!(summaries[1].label, "Stocks");
        assert_eq!(summaries[1].sub_categories, ["tech-giants"]);
        assert_eq!(summaries[1].item_count, 3);
    }
}
