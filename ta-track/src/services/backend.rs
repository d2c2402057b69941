//! Managed backend client
//!
//! Talks to the hosted backend's auth (`/auth/v1`) and table
//! (`/rest/v1`) endpoints. One instance is built from configuration at
//! startup and injected wherever it is needed; there is no process-wide
//! client.
//!
//! User-scoped calls send the anon key as `apikey` and the user's access
//! token as the bearer; seeding calls use the service key for both.

use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use ta_common::config::BackendConfig;
use ta_common::models::NewWatchlistEntry;
use ta_common::WatchlistEntry;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ApiError, LookupError};

/// Backend client errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Backend error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Access token rejected")]
    Unauthorized,

    #[error("Service key not configured")]
    MissingServiceKey,
}

impl From<BackendError> for LookupError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::ParseError(_) => {
                LookupError::MalformedUpstreamResponse(format!("Backend: {}", err))
            }
            BackendError::MissingServiceKey => LookupError::ConfigurationError(err.to_string()),
            _ => LookupError::UpstreamUnavailable(format!("Backend unavailable: {}", err)),
        }
    }
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unauthorized => ApiError::Unauthorized(err.to_string()),
            other => ApiError::Lookup(other.into()),
        }
    }
}

/// Authenticated user as reported by the backend
#[derive(Debug, Clone, Deserialize)]
pub struct BackendUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// `categories` table row
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRow {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

/// `items` table row
#[derive(Debug, Clone, Deserialize)]
pub struct ItemRow {
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub teaser_price: Option<f64>,
    #[serde(default)]
    pub trend: Option<f64>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Insert/upsert payload for `categories`
#[derive(Debug, Clone, Serialize)]
pub struct NewCategoryRow {
    pub name: String,
    pub slug: String,
    pub label: String,
    pub icon: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
}

/// Insert/upsert payload for `items`
#[derive(Debug, Clone, Serialize)]
pub struct NewItemRow {
    pub slug: String,
    pub name: String,
    pub category_id: Uuid,
    pub teaser_price: f64,
    pub trend: f64,
    pub image_url: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: Uuid,
}

#[derive(Debug, Serialize)]
struct OtpRequest<'a> {
    email: &'a str,
    create_user: bool,
}

/// Hosted backend API client
pub struct BackendClient {
    http_client: reqwest::Client,
    base_url: String,
    anon_key: String,
    service_key: Option<String>,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BackendError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            service_key: config.service_key.clone(),
        })
    }

    fn user_request(&self, method: Method, path: &str, access_token: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
    }

    fn anon_request(&self, method: Method, path: &str) -> RequestBuilder {
        self.user_request(method, path, &self.anon_key)
    }

    fn service_request(&self, method: Method, path: &str) -> Result<RequestBuilder, BackendError> {
        let key = self
            .service_key
            .as_deref()
            .ok_or(BackendError::MissingServiceKey)?;
        Ok(self
            .http_client
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", key)
            .bearer_auth(key))
    }

    async fn send(request: RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(BackendError::Unauthorized);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(BackendError::ApiError(status.as_u16(), error_text));
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, BackendError> {
        Self::send(request)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::ParseError(e.to_string()))
    }

    /// Email a passwordless sign-in link
    pub async fn send_magic_link(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), BackendError> {
        let mut request = self
            .anon_request(Method::POST, "/auth/v1/otp")
            .json(&OtpRequest {
                email,
                create_user: true,
            });
        if let Some(redirect) = redirect_to {
            request = request.query(&[("redirect_to", redirect)]);
        }

        Self::send(request).await?;
        info!("Sign-in link requested");
        Ok(())
    }

    /// Resolve an access token to its user
    pub async fn user_for_token(&self, access_token: &str) -> Result<BackendUser, BackendError> {
        Self::send_json(self.user_request(Method::GET, "/auth/v1/user", access_token)).await
    }

    /// The user's watchlist, newest first
    pub async fn list_watchlist(
        &self,
        access_token: &str,
        user_id: Uuid,
    ) -> Result<Vec<WatchlistEntry>, BackendError> {
        let request = self
            .user_request(Method::GET, "/rest/v1/watchlists", access_token)
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{}", user_id)),
                ("order", "created_at.desc".to_string()),
            ]);
        Self::send_json(request).await
    }

    /// Insert a watchlist row and return it as stored
    pub async fn add_watchlist_entry(
        &self,
        access_token: &str,
        entry: &NewWatchlistEntry,
    ) -> Result<WatchlistEntry, BackendError> {
        let request = self
            .user_request(Method::POST, "/rest/v1/watchlists", access_token)
            .header("Prefer", "return=representation")
            .json(&[entry]);

        let mut rows: Vec<WatchlistEntry> = Self::send_json(request).await?;
        rows.pop()
            .ok_or_else(|| BackendError::ParseError("insert returned no row".to_string()))
    }

    /// All category rows (public read)
    pub async fn fetch_categories(&self) -> Result<Vec<CategoryRow>, BackendError> {
        let request = self
            .anon_request(Method::GET, "/rest/v1/categories")
            .query(&[("select", "*")]);
        Self::send_json(request).await
    }

    /// All item rows (public read)
    pub async fn fetch_items(&self) -> Result<Vec<ItemRow>, BackendError> {
        let request = self
            .anon_request(Method::GET, "/rest/v1/items")
            .query(&[("select", "*")]);
        Self::send_json(request).await
    }

    /// Delete every row of `table` (service key)
    pub async fn delete_all(&self, table: &str) -> Result<(), BackendError> {
        let request = self
            .service_request(Method::DELETE, &format!("/rest/v1/{}", table))?
            .query(&[("id", "not.is.null")]);
        Self::send(request).await?;
        debug!(table = %table, "Cleared table");
        Ok(())
    }

    /// Upsert rows into `table`, merging on `on_conflict` (service key)
    pub async fn upsert<T: Serialize>(
        &self,
        table: &str,
        rows: &[T],
        on_conflict: &str,
    ) -> Result<(), BackendError> {
        if rows.is_empty() {
            return Ok(());
        }
        let request = self
            .service_request(Method::POST, &format!("/rest/v1/{}", table))?
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", "resolution=merge-duplicates")
            .json(rows);
        Self::send(request).await?;
        debug!(table = %table, rows = rows.len(), "Upserted rows");
        Ok(())
    }

    /// Id of the row in `table` whose slug is `slug`
    pub async fn id_for_slug(&self, table: &str, slug: &str) -> Result<Option<Uuid>, BackendError> {
        let request = self
            .anon_request(Method::GET, &format!("/rest/v1/{}", table))
            .query(&[("select", "id".to_string()), ("slug", format!("eq.{}", slug))]);
        let rows: Vec<IdRow> = Self::send_json(request).await?;
        Ok(rows.into_iter().next().map(|row| row.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(service_key: Option<&str>) -> BackendConfig {
        BackendConfig {
            url: "http://127.0.0.1:1/".to_string(),
            anon_key: "anon".to_string(),
            service_key: service_key.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_service_calls_require_service_key() {
        let client = BackendClient::new(&config(None)).unwrap();
        let err = client.delete_all("items").await.unwrap_err();
        assert!(matches!(err, BackendError::MissingServiceKey));
    }

    #[tokio::test]
    async fn test_empty_upsert_is_noop() {
        let client = BackendClient::new(&config(None)).unwrap();
        let rows: Vec<NewItemRow> = Vec::new();
        assert!(client.upsert("items", &rows, "slug").await.is_ok());
    }

    #[test]
    fn test_error_mapping() {
        assert!(matches!(
            ApiError::from(BackendError::Unauthorized),
            ApiError::Unauthorized(_)
        ));
        assert!(matches!(
            ApiError::from(BackendError::ApiError(500, "x".into())),
            ApiError::Lookup(LookupError::UpstreamUnavailable(_))
        ));
    }

    #[test]
    fn test_watchlist_row_parses_backend_timestamp() {
        let rows: Vec<WatchlistEntry> = serde_json::from_str(
            r#"[{
                "id": "6f1c4ad6-5d55-4a2c-9a43-2c6a0ff7b001",
                "user_id": "0b7d2f52-2a7e-4c3b-8a8c-1d8d1f5e9c11",
                "item_slug": "bitcoin",
                "category": "crypto",
                "notes": null,
                "created_at": "2025-11-08T12:34:56.123456+00:00"
            }]"#,
        )
        .unwrap();
        assert_eq!(rows[0].item_slug, "bitcoin");
        assert!(rows[0].notes.is_none());
    }
}
