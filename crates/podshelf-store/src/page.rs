// ABOUTME: Pagination request and result types used by list operations.
// ABOUTME: Supports offset/limit and keyset (after-id) paging over id-ordered results.

use podshelf_core::ValidationError;
use serde::Serialize;

/// How to slice an id-ordered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    Offset { offset: u64, limit: u32 },
    /// Rows with `id > after`.
    After { after: i64, limit: u32 },
}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 500;

    pub fn limit(&self) -> u32 {
        match *self {
            Self::Offset { limit, .. } | Self::After { limit, .. } => limit,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let limit = self.limit();
        if limit == 0 || limit > Self::MAX_LIMIT {
            return Err(ValidationError::query(
                "limit",
                format!("must be between 1 and {}", Self::MAX_LIMIT),
            ));
        }
        Ok(())
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::Offset {
            offset: 0,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Id to pass as `after` for the following page; `None` on the last page.
    pub next_cursor: Option<i64>,
    /// Number of rows matching the filter, ignoring pagination.
    pub total: u64,
}
