//! Data model shared by the lookup service and the batch tools
//!
//! JSON field names follow the wire formats the web front end already
//! consumes: track results are camelCase, catalog entries are snake_case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::slug::slug_matches;

/// Maximum number of history points returned for one item
pub const MAX_HISTORY_POINTS: usize = 30;

/// Spec key holding the item image
pub const SPEC_IMAGE_URL: &str = "Image URL";
/// Spec key holding the display name
pub const SPEC_NAME: &str = "Name";
/// Spec key holding the short description
pub const SPEC_DESCRIPTION: &str = "Description";
/// Spec key naming where the data came from
pub const SPEC_SOURCE: &str = "Source";
/// Spec key holding the 24h percentage change
pub const SPEC_TREND: &str = "Trend";

/// One dated price observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Calendar date, `YYYY-MM-DD` once normalized
    pub date: String,
    /// Price in USD
    pub price: f64,
}

impl PricePoint {
    pub fn new(date: impl Into<String>, price: f64) -> Self {
        Self {
            date: date.into(),
            price,
        }
    }
}

/// Price lookup result for a single item
///
/// Produced fresh per request, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackResult {
    pub current_price: f64,
    pub history: Vec<PricePoint>,
    pub specs: BTreeMap<String, String>,
}

/// Short catalog entry shown for a category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTeaserItem {
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub teaser_price: f64,
    /// Percentage change over the trailing 24 hours
    #[serde(default)]
    pub trend: f64,
}

/// Nested category inside a main category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubCategory {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub items: Vec<CategoryTeaserItem>,
}

/// Top-level catalog category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub items: Vec<CategoryTeaserItem>,
    #[serde(default)]
    pub sub_categories: Vec<SubCategory>,
}

impl Category {
    /// Find a sub-category by slug, ignoring case
    pub fn find_sub_category(&self, name: &str) -> Option<&SubCategory> {
        self.sub_categories
            .iter()
            .find(|sub| slug_matches(&sub.name, name))
    }

    /// Every item of the category, main items first, without duplicate slugs
    pub fn all_items(&self) -> Vec<CategoryTeaserItem> {
        let mut seen = std::collections::HashSet::new();
        self.items
            .iter()
            .chain(self.sub_categories.iter().flat_map(|sub| sub.items.iter()))
            .filter(|item| seen.insert(item.slug.to_lowercase()))
            .cloned()
            .collect()
    }
}

/// Category catalog, the shape of `data/categories.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl Catalog {
    /// Find a main category by slug, ignoring case
    pub fn find_category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|cat| slug_matches(&cat.name, name))
    }

    pub fn find_category_mut(&mut self, name: &str) -> Option<&mut Category> {
        self.categories
            .iter_mut()
            .find(|cat| slug_matches(&cat.name, name))
    }
}

/// Saved watchlist row as stored in the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_slug: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new watchlist row
#[derive(Debug, Clone, Serialize)]
pub struct NewWatchlistEntry {
    pub user_id: Uuid,
    pub item_slug: String,
    pub category: Option<String>,
    pub notes: Option<String>,
}
