//! # TrackAura Common Library
//!
//! Shared code for the TrackAura service and batch tools including:
//! - Price tracking data model (track results, price points, catalog)
//! - History normalization and slug helpers
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod slug;

pub use error::{Error, Result};
pub use models::{
    Catalog, Category, CategoryTeaserItem, PricePoint, SubCategory, TrackResult, WatchlistEntry,
};
