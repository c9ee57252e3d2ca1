// ABOUTME: Record CRUD API handlers: create, read, update, delete, paged listing, and NDJSON export.
// ABOUTME: Bodies are parsed from untyped JSON into RecordFields before any storage call.

use axum::BoxError;
use axum::Json;
use axum::body::Body;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::{StreamExt, stream};
use podshelf_core::{Record, RecordFields, ValidationError};
use podshelf_store::{Page, Pagination, RecordFilter, StoreError};
use serde::Deserialize;

use super::{json_body, parse_id};
use crate::app_state::SharedState;
use crate::error::ApiError;

/// Records fetched per storage round-trip while exporting.
const EXPORT_PAGE_SIZE: u32 = 200;

/// Query string of the list and export endpoints. Values arrive as strings and
/// are parsed here so bad input is reported with the parameter name.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub name_contains: Option<String>,
    pub after: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
}

impl ListQuery {
    fn filter(&self) -> RecordFilter {
        match self.name_contains.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => RecordFilter::name_contains(needle),
            _ => RecordFilter::default(),
        }
    }

    fn pagination(&self) -> Result<Pagination, ValidationError> {
        let limit = match self.limit.as_deref() {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|_| ValidationError::query("limit", "must be a positive integer"))?,
            None => Pagination::DEFAULT_LIMIT,
        };

        let pagination = match (self.after.as_deref(), self.offset.as_deref()) {
            (Some(_), Some(_)) => {
                return Err(ValidationError::query(
                    "after",
                    "cannot be combined with `offset`",
                ));
            }
            (Some(raw), None) => Pagination::After {
                after: raw
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| ValidationError::query("after", "must be a record id"))?,
                limit,
            },
            (None, Some(raw)) => Pagination::Offset {
                offset: raw.trim().parse::<u64>().map_err(|_| {
                    ValidationError::query("offset", "must be a non-negative integer")
                })?,
                limit,
            },
            (None, None) => Pagination::Offset { offset: 0, limit },
        };
        pagination.validate()?;
        Ok(pagination)
    }
}

fn query_params(query: Result<Query<ListQuery>, QueryRejection>) -> Result<ListQuery, ApiError> {
    match query {
        Ok(Query(query)) => Ok(query),
        Err(rejection) => Err(ValidationError::query("query", rejection.body_text()).into()),
    }
}

/// POST /api/records - Create a record from `{"name", "description"?}`.
pub async fn create_record(
    State(state): State<SharedState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Record>), ApiError> {
    let fields = RecordFields::from_json(&json_body(body)?)?;
    let record = state.storage.create_record(fields).await?;
    tracing::debug!(id = record.id, "record created");
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/records - One page of records, optionally filtered by name.
pub async fn list_records(
    State(state): State<SharedState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Page<Record>>, ApiError> {
    let query = query_params(query)?;
    let page = state
        .storage
        .list_records(query.filter(), query.pagination()?)
        .await?;
    Ok(Json(page))
}

/// GET /api/records/export - Every matching record as newline-delimited JSON.
///
/// The first page is read before the response starts so storage errors still
/// map to a status code; later pages are fetched as the client reads.
pub async fn export_records(
    State(state): State<SharedState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let query = query_params(query)?;
    let mut scan = state.storage.scan_records(query.filter(), EXPORT_PAGE_SIZE);
    let first = scan.next_page().await?.unwrap_or_default();

    let pages = stream::once(async move { Ok::<_, StoreError>(first) })
        .chain(scan.into_pages())
        .map(|page| -> Result<Vec<u8>, BoxError> {
            let records = page.inspect_err(|err| {
                tracing::error!(error = %err, "record export aborted");
            })?;
            let mut buf = Vec::new();
            for record in &records {
                serde_json::to_writer(&mut buf, record)?;
                buf.push(b'\n');
            }
            Ok(buf)
        });

    Ok((
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(pages),
    )
        .into_response())
}

/// GET /api/records/{id}
pub async fn get_record(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Record>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.storage.get_record(id).await?))
}

/// PUT /api/records/{id} - Replace name and description.
pub async fn update_record(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<Record>, ApiError> {
    let id = parse_id(&id)?;
    let fields = RecordFields::from_json(&json_body(body)?)?;
    Ok(Json(state.storage.update_record(id, fields).await?))
}

/// DELETE /api/records/{id}
pub async fn delete_record(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    state.storage.delete_record(id).await?;
    tracing::debug!(id, "record deleted");
    Ok(StatusCode::NO_CONTENT)
}
