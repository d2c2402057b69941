//! ta-seed library - TrackAura catalog batch jobs
//!
//! - [`seed`]: rebuild the backend `categories`/`items` tables from market
//!   data and the stock listing
//! - [`populate`]: refresh teaser prices in a local `categories.json`
//!   through the generative API

pub mod error;
pub mod listing;
pub mod populate;
pub mod seed;

pub use error::{Result, SeedError};
pub use populate::{PopulateReport, Populator};
pub use seed::{SeedReport, Seeder};
