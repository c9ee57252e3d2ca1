// ABOUTME: HTTP server for podshelf, the request dispatcher in front of the storage manager.
// ABOUTME: Uses Axum with the storage manager injected through shared state; no state of its own.

pub mod api;
pub mod app_state;
pub mod config;
pub mod error;
pub mod fetch;
pub mod routes;

pub use app_state::{AppState, SharedState};
pub use config::{ConfigError, PodshelfConfig};
pub use error::ApiError;
pub use fetch::{DEFAULT_FETCH_TIMEOUT, FeedFetcher, FetchError, FetchedFeed, parse_feed};
pub use routes::{create_router, serve};
