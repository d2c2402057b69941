//! Sign-in links and bearer-token sessions
//!
//! Sign-in is passwordless: the backend emails a link that lands the user
//! back on the front-end with an access token. Protected routes carry that
//! token as `Authorization: Bearer <token>`; [`session_middleware`]
//! resolves it to a user and attaches a [`Session`] to the request.

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::services::BackendUser;
use crate::AppState;

/// Authenticated request context
#[derive(Debug, Clone)]
pub struct Session {
    pub user: BackendUser,
    pub access_token: String,
}

/// Token from an `Authorization: Bearer` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Session middleware
///
/// Returns 401 when the token is missing or rejected by the backend.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let backend = state.backend()?;

    let access_token = bearer_token(request.headers())
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?
        .to_string();

    let user = backend.user_for_token(&access_token).await.map_err(|e| {
        warn!("Session rejected: {}", e);
        ApiError::from(e)
    })?;
    debug!(user_id = %user.id, "Session resolved");

    request.extensions_mut().insert(Session { user, access_token });
    Ok(next.run(request).await)
}

#[derive(Debug, Deserialize)]
pub struct MagicLinkRequest {
    pub email: String,
    #[serde(default)]
    pub redirect_to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MagicLinkResponse {
    pub sent: bool,
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    }
}

/// POST /api/auth/magic-link
pub async fn send_magic_link(
    State(state): State<AppState>,
    body: Result<Json<MagicLinkRequest>, JsonRejection>,
) -> ApiResult<Json<MagicLinkResponse>> {
    let Json(request) =
        body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let email = request.email.trim();
    if !looks_like_email(email) {
        return Err(ApiError::BadRequest(format!("Invalid email address: {}", email)));
    }

    let backend = state.backend()?;
    backend
        .send_magic_link(email, request.redirect_to.as_deref())
        .await?;

    info!("Magic link sent");
    Ok(Json(MagicLinkResponse { sent: true }))
}
