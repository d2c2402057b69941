//! Upstream clients and lookup strategies
//!
//! - [`lookup`]: the item lookup normalizer (routing + normalization)
//! - [`price_source`]: `PriceSource`/`QuoteSource` strategy traits
//! - [`market_data`]: CoinGecko client and the known-identifier table
//! - [`generative`]: chat-completion client and the generic-item source
//! - [`mock`]: deterministic dev-mode source
//! - [`catalog`]: category catalog sources (file, HTTP, backend tables)
//! - [`backend`]: managed backend client (auth, watchlists, seeding)

pub mod backend;
pub mod catalog;
pub mod generative;
pub mod lookup;
pub mod market_data;
pub mod mock;
pub mod price_source;

pub use backend::{BackendClient, BackendError, BackendUser};
pub use catalog::{BackendCatalog, CatalogSource, FileCatalog, HttpCatalog};
pub use generative::{GenerativeClient, GenerativePriceSource};
pub use lookup::{CategorySummary, ItemLookup, LookupOutcome, LookupRequest, LookupRoute};
pub use market_data::{MarketDataClient, MarketPriceSource};
pub use mock::MockPriceSource;
pub use price_source::{PriceSource, Quote, QuoteSource};
