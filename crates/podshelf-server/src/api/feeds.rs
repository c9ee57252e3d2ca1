// ABOUTME: Feed subscription API handlers: subscribe, list, edit, unsubscribe, and refresh.
// ABOUTME: Subscribe and refresh download the feed first, then store what it lists in one transaction.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use podshelf_core::{Episode, Feed, FeedUpdate, NewFeed, SubscribeRequest};
use podshelf_store::{CreatedFeed, StoreError};
use serde::Serialize;
use serde_json::Value;

use super::{json_body, parse_id};
use crate::app_state::SharedState;
use crate::error::ApiError;

/// Response body of a refresh.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub new_episodes: usize,
}

/// GET /api/feeds - All subscriptions, newest first.
pub async fn list_feeds(State(state): State<SharedState>) -> Result<Json<Vec<Feed>>, ApiError> {
    Ok(Json(state.storage.list_feeds().await?))
}

/// POST /api/feeds - Subscribe to `{"url": ...}` with the episodes it currently lists.
pub async fn create_feed(
    State(state): State<SharedState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedFeed>), ApiError> {
    let request = SubscribeRequest::from_json(&json_body(body)?)?;
    if state.storage.feed_url_exists(&request.url).await? {
        return Err(StoreError::Conflict("feed already exists".to_string()).into());
    }

    let fetched = state.fetcher.fetch(&request.url).await?;
    let new = NewFeed {
        feed: fetched.metadata.into_fields(request.url),
        episodes: fetched.episodes,
    };
    let created = state.storage.create_feed(new).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/feeds/{id}
pub async fn get_feed(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Feed>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.storage.get_feed(id).await?))
}

/// PUT /api/feeds/{id} - Replace title, description, and image.
pub async fn update_feed(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Feed>, ApiError> {
    let id = parse_id(&id)?;
    let update = FeedUpdate::from_json(&json_body(body)?)?;
    Ok(Json(state.storage.update_feed(id, update).await?))
}

/// DELETE /api/feeds/{id} - Unsubscribe and drop the feed's episodes.
pub async fn delete_feed(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    state.storage.delete_feed(id).await?;
    tracing::info!(feed_id = id, "feed removed");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/feeds/{id}/episodes
pub async fn list_episodes(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Episode>>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.storage.list_episodes(id).await?))
}

/// POST /api/feeds/{id}/refresh - Download the feed again, adopt its metadata, and add unseen episodes.
pub async fn refresh_feed(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let id = parse_id(&id)?;
    let feed = state.storage.get_feed(id).await?;
    let fetched = state.fetcher.fetch(&feed.url).await?;
    let new_episodes = state
        .storage
        .refresh_feed(id, fetched.metadata, fetched.episodes)
        .await?;
    Ok(Json(RefreshResponse { new_episodes }))
}
