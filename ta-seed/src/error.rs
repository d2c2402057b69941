//! Error types for ta-seed

use ta_track::services::generative::GenerativeError;
use ta_track::services::market_data::MarketError;
use ta_track::services::BackendError;
use thiserror::Error;

/// Batch job failure
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Market data error: {0}")]
    Market(#[from] MarketError),

    #[error("Generative error: {0}")]
    Generative(#[from] GenerativeError),

    #[error("Stock listing download failed: {0}")]
    Listing(String),

    #[error("Category missing after upsert: {0}")]
    MissingCategory(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SeedError>;
