//! Item lookup endpoints

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use ta_common::CategoryTeaserItem;
use tracing::warn;

use crate::error::{ApiResult, LookupError};
use crate::services::{LookupOutcome, LookupRequest};
use crate::AppState;

/// `<proto>://<host>` of the inbound request
///
/// The host comes from the `host` header only; `x-forwarded-host` is
/// ignored so callers cannot redirect catalog fetches to another server.
/// `x-forwarded-proto` defaults to `http`; without a `host` header there
/// is no origin.
pub fn request_origin(headers: &HeaderMap) -> Option<String> {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|value| value.to_str().ok())
        .filter(|host| !host.is_empty())?;
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|proto| !proto.is_empty())
        .unwrap_or("http");
    Some(format!("{}://{}", proto, host))
}

/// POST /api/track
///
/// Body `{ item, category? }`; answers with a track result or `{ related }`.
pub async fn track_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<LookupRequest>, JsonRejection>,
) -> ApiResult<Json<LookupOutcome>> {
    let Json(request) = body.map_err(|rejection| {
        warn!("Rejected lookup body: {}", rejection.body_text());
        LookupError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    })?;

    let origin = request_origin(&headers);
    let outcome = state.lookup.lookup(&request, origin.as_deref()).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CategoryItemsResponse {
    pub category: String,
    pub items: Vec<CategoryTeaserItem>,
}

/// GET /api/track?category=<name>
///
/// Every item of a main category, sub-category items after main items.
pub async fn category_items(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CategoryQuery>,
) -> ApiResult<Json<CategoryItemsResponse>> {
    let name = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| LookupError::BadRequest("Missing category".to_string()))?;

    let origin = request_origin(&headers);
    let (category, items) = state
        .lookup
        .category_items(name, origin.as_deref())
        .await?;
    Ok(Json(CategoryItemsResponse { category, items }))
}
