//! Category catalog sources
//!
//! The teaser path and the category endpoints read the catalog through
//! [`CatalogSource`]. Three strategies exist:
//! - [`FileCatalog`]: a local `categories.json`
//! - [`HttpCatalog`]: the JSON file fetched by absolute URL, either fixed
//!   or derived from the inbound request's origin
//! - [`BackendCatalog`]: the backend's `categories` and `items` tables

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use ta_common::{Catalog, Category, CategoryTeaserItem, SubCategory};
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

use super::backend::{BackendClient, BackendError, CategoryRow, ItemRow};
use crate::error::LookupError;

/// Path of the catalog file under the public directory
pub const CATALOG_PUBLIC_PATH: &str = "/data/categories.json";

/// Catalog loading errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Catalog fetch returned {0}")]
    ApiError(u16),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("No request origin to derive the catalog URL from")]
    MissingOrigin,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl From<CatalogError> for LookupError {
    fn from(err: CatalogError) -> Self {
        error!("Catalog load failed: {}", err);
        match err {
            CatalogError::ParseError(_) => {
                LookupError::MalformedUpstreamResponse(format!("Category data: {}", err))
            }
            _ => LookupError::UpstreamUnavailable(format!("Category data unavailable: {}", err)),
        }
    }
}

/// Provides the category catalog
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Load the catalog
    ///
    /// `origin` is `<proto>://<host>` of the inbound request, when known.
    async fn load(&self, origin: Option<&str>) -> Result<Catalog, CatalogError>;
}

/// Catalog read from a local JSON file on every request
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for FileCatalog {
    async fn load(&self, _origin: Option<&str>) -> Result<Catalog, CatalogError> {
        let bytes = tokio::fs::read(&self.path).await?;
        serde_json::from_slice(&bytes).map_err(|e| CatalogError::ParseError(e.to_string()))
    }
}

/// Catalog fetched over HTTP
pub struct HttpCatalog {
    http_client: reqwest::Client,
    /// Fixed URL; `None` derives it from the request origin
    url: Option<String>,
}

impl HttpCatalog {
    pub fn new(url: Option<String>) -> Result<Self, CatalogError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CatalogError::NetworkError(e.to_string()))?;
        Ok(Self { http_client, url })
    }

    fn resolve_url(&self, origin: Option<&str>) -> Result<String, CatalogError> {
        match (&self.url, origin) {
            (Some(url), _) => Ok(url.clone()),
            (None, Some(origin)) => Ok(format!(
                "{}{}",
                origin.trim_end_matches('/'),
                CATALOG_PUBLIC_PATH
            )),
            (None, None) => Err(CatalogError::MissingOrigin),
        }
    }
}

#[async_trait]
impl CatalogSource for HttpCatalog {
    async fn load(&self, origin: Option<&str>) -> Result<Catalog, CatalogError> {
        let url = self.resolve_url(origin)?;
        debug!(url = %url, "Fetching category catalog");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| CatalogError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::ApiError(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| CatalogError::ParseError(e.to_string()))
    }
}

/// Catalog assembled from the backend's `categories` and `items` tables
pub struct BackendCatalog {
    client: Arc<BackendClient>,
}

impl BackendCatalog {
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CatalogSource for BackendCatalog {
    async fn load(&self, _origin: Option<&str>) -> Result<Catalog, CatalogError> {
        let (categories, items) =
            tokio::try_join!(self.client.fetch_categories(), self.client.fetch_items())?;
        Ok(catalog_from_rows(categories, items))
    }
}

fn teaser_from_row(row: &ItemRow) -> CategoryTeaserItem {
    CategoryTeaserItem {
        slug: row.slug.clone(),
        name: row.name.clone().unwrap_or_else(|| row.slug.clone()),
        image_url: row.image_url.clone().unwrap_or_default(),
        teaser_price: row.teaser_price.unwrap_or(0.0),
        trend: row.trend.unwrap_or(0.0),
    }
}

/// Build the nested catalog from flat backend rows
///
/// Categories without a parent become main categories; rows whose parent
/// is a main category become its sub-categories. Rows nested deeper than
/// one level are skipped.
pub fn catalog_from_rows(categories: Vec<CategoryRow>, items: Vec<ItemRow>) -> Catalog {
    let mut items_by_category: HashMap<Uuid, Vec<CategoryTeaserItem>> = HashMap::new();
    for row in &items {
        if let Some(category_id) = row.category_id {
            items_by_category
                .entry(category_id)
                .or_default()
                .push(teaser_from_row(row));
        }
    }

    let name_of = |row: &CategoryRow| row.slug.clone().unwrap_or_else(|| row.name.clone());

    let mut main: Vec<Category> = Vec::new();
    let mut index_by_id: HashMap<Uuid, usize> = HashMap::new();
    for row in categories.iter().filter(|row| row.parent_id.is_none()) {
        index_by_id.insert(row.id, main.len());
        main.push(Category {
            name: name_of(row),
            label: row.label.clone(),
            icon: row.icon.clone(),
            items: items_by_category.remove(&row.id).unwrap_or_default(),
            sub_categories: Vec::new(),
        });
    }

    for row in categories.iter().filter(|row| row.parent_id.is_some()) {
        let Some(parent) = row.parent_id.and_then(|id| index_by_id.get(&id).copied()) else {
            continue;
        };
        main[parent].sub_categories.push(SubCategory {
            name: name_of(row),
            label: row.label.clone(),
            items: items_by_category.remove(&row.id).unwrap_or_default(),
        });
    }

    Catalog { categories: main }
}
