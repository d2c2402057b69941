//! HTTP API handlers for ta-track

pub mod auth;
pub mod buildinfo;
pub mod categories;
pub mod health;
pub mod track;
pub mod watchlist;

pub use auth::{send_magic_link, session_middleware, Session};
pub use buildinfo::get_build_info;
pub use categories::list_categories;
pub use health::health_routes;
pub use track::{category_items, track_item};
pub use watchlist::{add_watchlist_entry, list_watchlist};
