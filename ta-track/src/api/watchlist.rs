//! Watchlist endpoints (require a session)

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Extension, Json,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use ta_common::models::{NewWatchlistEntry, SPEC_IMAGE_URL, SPEC_TREND};
use ta_common::{TrackResult, WatchlistEntry};
use tracing::{info, warn};

use super::auth::Session;
use crate::error::{ApiError, ApiResult};
use crate::services::ItemLookup;
use crate::AppState;

/// Watchlist entry with live values
///
/// The live fields are `null` when the item's lookup failed.
#[derive(Debug, Serialize)]
pub struct EnrichedEntry {
    #[serde(flatten)]
    pub entry: WatchlistEntry,
    pub current_price: Option<f64>,
    pub trend: Option<f64>,
    pub image_url: Option<String>,
}

/// 24h change from `specs.Trend`, else from the two newest history points
pub fn trend_of(result: &TrackResult) -> Option<f64> {
    let from_specs = result
        .specs
        .get(SPEC_TREND)
        .and_then(|raw| raw.trim().trim_end_matches('%').trim().parse::<f64>().ok())
        .filter(|trend| trend.is_finite());
    if from_specs.is_some() {
        return from_specs;
    }

    match result.history.as_slice() {
        [latest, previous, ..] if previous.price != 0.0 => {
            Some((latest.price - previous.price) / previous.price * 100.0)
        }
        _ => None,
    }
}

async fn enrich(lookup: &ItemLookup, entry: WatchlistEntry) -> EnrichedEntry {
    match lookup.track(&entry.item_slug, entry.category.as_deref()).await {
        Ok(result) => EnrichedEntry {
            current_price: Some(result.current_price),
            trend: trend_of(&result),
            image_url: result.specs.get(SPEC_IMAGE_URL).cloned(),
            entry,
        },
        Err(e) => {
            warn!(item = %entry.item_slug, "Watchlist price lookup failed: {}", e);
            EnrichedEntry {
                entry,
                current_price: None,
                trend: None,
                image_url: None,
            }
        }
    }
}

/// GET /api/watchlist
pub async fn list_watchlist(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<Vec<EnrichedEntry>>> {
    let backend = state.backend()?;
    let entries = backend
        .list_watchlist(&session.access_token, session.user.id)
        .await?;

    let lookup = state.lookup.as_ref();
    let enriched = join_all(entries.into_iter().map(|entry| enrich(lookup, entry))).await;
    Ok(Json(enriched))
}

#[derive(Debug, Deserialize)]
pub struct AddWatchlistRequest {
    pub item_slug: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// POST /api/watchlist
pub async fn add_watchlist_entry(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    body: Result<Json<AddWatchlistRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<WatchlistEntry>)> {
    let Json(request) =
        body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let item_slug = request.item_slug.trim();
    if item_slug.is_empty() {
        return Err(ApiError::BadRequest("Missing item_slug".to_string()));
    }

    let new_entry = NewWatchlistEntry {
        user_id: session.user.id,
        item_slug: item_slug.to_string(),
        category: request.category.filter(|c| !c.trim().is_empty()),
        notes: request.notes.filter(|n| !n.trim().is_empty()),
    };

    let backend = state.backend()?;
    let entry = backend
        .add_watchlist_entry(&session.access_token, &new_entry)
        .await?;

    info!(item = %entry.item_slug, "Watchlist entry added");
    Ok((StatusCode::CREATED, Json(entry)))
}
