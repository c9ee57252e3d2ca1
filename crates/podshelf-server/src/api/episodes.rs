// ABOUTME: Episode API handlers for reading an episode and recording playback state.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use podshelf_core::{Episode, Progress};
use serde::Serialize;
use serde_json::Value;

use super::{json_body, parse_id};
use crate::app_state::SharedState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct PlayedResponse {
    pub played: bool,
}

/// GET /api/episodes/{id}
pub async fn get_episode(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Episode>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.storage.get_episode(id).await?))
}

/// PUT /api/episodes/{id}/progress - Store `{"position", "played"}`.
pub async fn update_progress(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let progress = Progress::from_json(&json_body(body)?)?;
    state.storage.update_progress(id, progress).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/episodes/{id}/played - Flip the played flag.
pub async fn toggle_played(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<PlayedResponse>, ApiError> {
    let id = parse_id(&id)?;
    let played = state.storage.toggle_played(id).await?;
    Ok(Json(PlayedResponse { played }))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{MockFeed, send_json, test_app};
    use axum::Router;
    use http::StatusCode;
    use serde_json::json;

    const UNTITLED_EPISODE: &str = r#"<rss xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Show</title>
    <item>
      <enclosure url="https://example.com/1.mp3"/>
      <itunes:duration>3725</itunes:duration>
    </item>
  </channel>
</rss>"#;

    async fn first_episode_uri(app: &Router) -> String {
        let mock = MockFeed::start(UNTITLED_EPISODE).await;
        let (status, feed) =
            send_json(app, "POST", "/api/feeds", Some(json!({"url": mock.url()}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let (_, episodes) = send_json(
            app,
            "GET",
            &format!("/api/feeds/{}/episodes", feed["id"]),
            None,
        )
        .await;
        format!("/api/episodes/{}", episodes[0]["id"])
    }

    #[tokio::test]
    async fn get_episode_has_defaults() {
        let (_dir, _state, app) = test_app();
        let uri = first_episode_uri(&app).await;

        let (status, episode) = send_json(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(episode["title"], "Untitled");
        assert_eq!(episode["duration"], "1:02:05");
        assert_eq!(episode["played"], false);
        assert_eq!(episode["position"], 0.0);
    }

    #[tokio::test]
    async fn progress_is_stored() {
        let (_dir, _state, app) = test_app();
        let uri = first_episode_uri(&app).await;

        let (status, body) = send_json(
            &app,
            "PUT",
            &format!("{uri}/progress"),
            Some(json!({"position": 93.5, "played": true})),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_null());

        let (_, episode) = send_json(&app, "GET", &uri, None).await;
        assert_eq!(episode["position"], 93.5);
        assert_eq!(episode["played"], true);

        let (status, _) = send_json(
            &app,
            "PUT",
            &format!("{uri}/progress"),
            Some(json!({"position": -1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn played_toggles() {
        let (_dir, _state, app) = test_app();
        let uri = first_episode_uri(&app).await;

        let (status, json) = send_json(&app, "PUT", &format!("{uri}/played"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["played"], true);

        let (_, json) = send_json(&app, "PUT", &format!("{uri}/played"), None).await;
        assert_eq!(json["played"], false);
    }

    #[tokio::test]
    async fn missing_episode_is_404() {
        let (_dir, _state, app) = test_app();
        let (status, _) = send_json(&app, "GET", "/api/episodes/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send_json(&app, "PUT", "/api/episodes/42/played", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send_json(
            &app,
            "PUT",
            "/api/episodes/42/progress",
            Some(json!({"position": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
