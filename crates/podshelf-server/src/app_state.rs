// ABOUTME: Shared application state for the podshelf HTTP server.
// ABOUTME: Holds the explicitly owned storage manager and the HTTP client that downloads feeds.

use std::sync::Arc;

use podshelf_store::StorageManager;

use crate::fetch::FeedFetcher;

/// Shared application state accessible by all Axum handlers.
pub struct AppState {
    pub storage: StorageManager,
    pub fetcher: FeedFetcher,
}

/// Type alias for the Arc-wrapped state used with Axum's State extractor.
pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(storage: StorageManager, fetcher: FeedFetcher) -> Self {
        Self { storage, fetcher }
    }
}
