// ABOUTME: Maps storage, validation and feed fetch failures onto HTTP status codes and a stable JSON body.
// ABOUTME: Internal storage detail is logged here and never sent to the client.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use podshelf_core::ValidationError;
use podshelf_store::StoreError;
use serde::Serialize;
use thiserror::Error;

use crate::fetch::FetchError;

/// Error returned by every API handler.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The subscribed URL could not be downloaded or is not a feed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::Store(StoreError::Validation(err))
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Store(StoreError::Validation(_)) | Self::Fetch(_) => StatusCode::BAD_REQUEST,
            Self::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Store(StoreError::Busy(_) | StoreError::Unavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Machine-readable error code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Store(StoreError::Validation(_)) => "validation_error",
            Self::Store(StoreError::NotFound { .. }) => "not_found",
            Self::Store(StoreError::Conflict(_)) => "conflict",
            Self::Store(StoreError::Busy(_)) => "storage_busy",
            Self::Store(StoreError::Unavailable(_)) => "storage_unavailable",
            Self::Fetch(_) => "feed_fetch_failed",
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Store(StoreError::Busy(_)) => "storage is busy, retry later".to_string(),
            Self::Store(StoreError::Unavailable(_)) => "storage is unavailable".to_string(),
            Self::Store(StoreError::Conflict(_)) => "resource already exists".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Store(StoreError::Unavailable(detail)) => {
                tracing::error!(detail = %detail, "request failed: storage unavailable");
            }
            Self::Store(StoreError::Busy(detail)) => {
                tracing::warn!(detail = %detail, "request failed: storage busy");
            }
            Self::Fetch(err) => tracing::warn!(error = %err, "request failed: feed fetch"),
            _ => {}
        }

        let status = self.status_code();
        let body = ErrorBody {
            error: self.public_message(),
            code: self.code(),
        };
        let mut response = (status, Json(body)).into_response();
        if matches!(self, Self::Store(StoreError::Busy(_))) {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}
