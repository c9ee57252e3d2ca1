// ABOUTME: Persistence layer for podshelf, the sole owner of the embedded SQLite database file.
// ABOUTME: Provides the storage manager with typed CRUD, pagination, lazy scans, and clean shutdown.

pub mod error;
pub mod library;
pub mod manager;
pub mod page;
pub mod records;
mod schema;

pub use error::StoreError;
pub use library::CreatedFeed;
pub use manager::{DATABASE_FILE, StorageManager, StoreConfig};
pub use page::{Page, Pagination};
pub use records::{RecordFilter, RecordScan};
