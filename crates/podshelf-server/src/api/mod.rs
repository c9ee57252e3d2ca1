// ABOUTME: API module containing all HTTP handler functions for the podshelf REST API.
// ABOUTME: Organized into sub-modules for generic records, feeds, and episodes.

pub mod episodes;
pub mod feeds;
pub mod records;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use podshelf_core::ValidationError;
use serde_json::Value;

use crate::error::ApiError;

/// Unwrap an untyped JSON body, reporting malformed input as a validation error.
pub(crate) fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(ValidationError::MalformedBody(rejection.body_text()).into()),
    }
}

/// Parse a numeric path identifier.
pub(crate) fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .map_err(|_| ValidationError::InvalidId(raw.to_string()).into())
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::Router;
    use axum::body::Body;
    use axum::routing::get;
    use http::{Request, StatusCode, header};
    use podshelf_store::{StorageManager, StoreConfig};
    use serde_json::Value;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    use crate::app_state::{AppState, SharedState};
    use crate::fetch::FeedFetcher;
    use crate::routes::create_router;

    pub fn test_state(dir: &TempDir) -> SharedState {
        let storage = StorageManager::open(&StoreConfig::new(dir.path())).unwrap();
        let fetcher = FeedFetcher::new(Duration::from_secs(5)).unwrap();
        Arc::new(AppState::new(storage, fetcher))
    }

    pub fn test_app() -> (TempDir, SharedState, Router) {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let app = create_router(Arc::clone(&state));
        (dir, state, app)
    }

    /// A feed host on an ephemeral local port whose response can be swapped between requests.
    pub struct MockFeed {
        addr: SocketAddr,
        response: Arc<Mutex<(StatusCode, String)>>,
    }

    impl MockFeed {
        pub async fn start(xml: &str) -> Self {
            let response = Arc::new(Mutex::new((StatusCode::OK, xml.to_string())));
            let served = Arc::clone(&response);
            let app = Router::new().route(
                "/feed.xml",
                get(move || {
                    let (status, body) = served.lock().unwrap().clone();
                    async move { (status, [(header::CONTENT_TYPE, "application/rss+xml")], body) }
                }),
            );
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
            Self { addr, response }
        }

        pub fn url(&self) -> String {
            format!("http://{}/feed.xml", self.addr)
        }

        pub fn set(&self, status: StatusCode, body: &str) {
            *self.response.lock().unwrap() = (status, body.to_string());
        }
    }

    /// A minimal RSS document with one enclosure per `(title, audio_url)` pair.
    pub fn rss(title: &str, items: &[(&str, &str)]) -> String {
        let items: String = items
            .iter()
            .map(|(item_title, audio_url)| {
                format!(
                    "<item><title>{item_title}</title>\
                     <enclosure url=\"{audio_url}\" type=\"audio/mpeg\"/>\
                     <itunes:duration>3725</itunes:duration></item>"
                )
            })
            .collect();
        format!(
            "<?xml version=\"1.0\"?>\
             <rss version=\"2.0\" xmlns:itunes=\"http://www.itunes.com/dtds/podcast-1.0.dtd\">\
             <channel><title>{title}</title><description>About {title}</description>{items}</channel></rss>"
        )
    }

    pub async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<&str>,
    ) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = app.clone().oneshot(request).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    /// Like [`send`] with a JSON body and a JSON (or empty) response.
    pub async fn send_json(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let body = body.map(|b| b.to_string());
        let (status, bytes) = send(app, method, uri, body.as_deref()).await;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}
