//! Category listing endpoint

use axum::{extract::State, http::HeaderMap, Json};

use super::track::request_origin;
use crate::error::ApiResult;
use crate::services::CategorySummary;
use crate::AppState;

/// GET /api/categories
pub async fn list_categories(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<CategorySummary>>> {
    let origin = request_origin(&headers);
    Ok(Json(state.lookup.categories(origin.as_deref()).await?))
}
