//! ta-track library - TrackAura lookup service
//!
//! Serves item price lookups, category teasers, sign-in links and
//! watchlists over HTTP, plus the static front-end files.

use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod services;

pub use error::{ApiError, ApiResult, LookupError};
use services::{BackendClient, ItemLookup};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Lookup normalizer
    pub lookup: Arc<ItemLookup>,
    /// Managed backend; `None` disables sign-in and watchlists
    pub backend: Option<Arc<BackendClient>>,
    /// Directory served for unmatched paths
    pub public_dir: PathBuf,
    /// Server start time
    pub startup_time: Instant,
}

impl AppState {
    pub fn new(lookup: Arc<ItemLookup>, public_dir: impl Into<PathBuf>) -> Self {
        Self {
            lookup,
            backend: None,
            public_dir: public_dir.into(),
            startup_time: Instant::now(),
        }
    }

    pub fn with_backend(mut self, backend: Arc<BackendClient>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// The backend client, or a configuration error when none is set up
    pub fn backend(&self) -> Result<&Arc<BackendClient>, ApiError> {
        self.backend.as_ref().ok_or_else(|| {
            LookupError::ConfigurationError(
                "Backend not configured: set TRACKAURA_BACKEND_URL and TRACKAURA_BACKEND_ANON_KEY"
                    .to_string(),
            )
            .into()
        })
    }
}

/// Build application router
///
/// Watchlist routes sit behind the session middleware; everything else is
/// public. Paths no route claims fall through to the public directory.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let protected = Router::new()
        .route(
            "/api/watchlist",
            get(api::list_watchlist).post(api::add_watchlist_entry),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::session_middleware,
        ));

    let public = Router::new()
        .route("/api/track", post(api::track_item).get(api::category_items))
        .route("/api/categories", get(api::list_categories))
        .route("/api/auth/magic-link", post(api::send_magic_link))
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::health_routes());

    let static_files = ServeDir::new(&state.public_dir);

    Router::new()
        .merge(protected)
        .merge(public)
        .fallback_service(static_files)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
