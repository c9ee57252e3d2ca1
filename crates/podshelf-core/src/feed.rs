// ABOUTME: Defines podcast feed subscriptions and the payloads used to add, edit, or refresh them.
// ABOUTME: A new feed carries the episodes fetched with it so both land in one transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::episode::EpisodeFields;
use crate::error::ValidationError;
use crate::payload::{Payload, check_http_url, check_len, truncate_chars};

/// Title used when the feed does not supply one.
pub const DEFAULT_FEED_TITLE: &str = "Unknown Podcast";

const TITLE_MAX: usize = 500;
const DESCRIPTION_MAX: usize = 10_000;

/// A subscribed podcast feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writable feed columns. `url` is the natural key and is never changed after insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFields {
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl FeedFields {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            description: None,
            image_url: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_http_url("url", &self.url)?;
        validate_metadata(&self.title, self.description.as_deref(), self.image_url.as_deref())
    }
}

/// A feed ready to insert, with the episodes fetched alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFeed {
    pub feed: FeedFields,
    pub episodes: Vec<EpisodeFields>,
}

/// Body of `POST /api/feeds`: `{"url": ...}`. Everything else comes from the fetched document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeRequest {
    pub url: String,
}

impl SubscribeRequest {
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let payload = Payload::new(value, &["url"])?;
        let url = payload.required_str("url")?;
        if url.is_empty() {
            return Err(ValidationError::Missing("url"));
        }
        check_http_url("url", &url)?;
        Ok(Self { url })
    }
}

/// Descriptive feed metadata. Body of `PUT /api/feeds/{id}`, and the result of re-reading a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedUpdate {
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl FeedUpdate {
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let payload = Payload::new(value, &["title", "description", "image_url"])?;
        let update = Self {
            title: payload.required_str("title")?,
            description: payload.optional_str("description")?,
            image_url: payload.optional_str("image_url")?,
        };
        update.validate()?;
        Ok(update)
    }

    /// Metadata read from a feed document.
    ///
    /// A missing title becomes [`DEFAULT_FEED_TITLE`], over-long text is cut,
    /// and an image URL that is not http(s) is dropped, so the result always validates.
    pub fn from_document(
        title: Option<String>,
        description: Option<String>,
        image_url: Option<String>,
    ) -> Self {
        let clean = |v: Option<String>| v.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            title: clean(title)
                .map(|t| truncate_chars(&t, TITLE_MAX))
                .unwrap_or_else(|| DEFAULT_FEED_TITLE.to_string()),
            description: clean(description).map(|d| truncate_chars(&d, DESCRIPTION_MAX)),
            image_url: clean(image_url).filter(|u| check_http_url("image_url", u).is_ok()),
        }
    }

    /// Pair this metadata with the subscribed URL.
    pub fn into_fields(self, url: impl Into<String>) -> FeedFields {
        FeedFields {
            url: url.into(),
            title: self.title,
            description: self.description,
            image_url: self.image_url,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_metadata(&self.title, self.description.as_deref(), self.image_url.as_deref())
    }
}

fn validate_metadata(
    title: &str,
    description: Option<&str>,
    image_url: Option<&str>,
) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::invalid("title", "must not be empty"));
    }
    check_len("title", title, TITLE_MAX)?;
    if let Some(description) = description {
        check_len("description", description, DESCRIPTION_MAX)?;
    }
    if let Some(image_url) = image_url {
        check_http_url("image_url", image_url)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subscribe_requires_url() {
        assert_eq!(
            SubscribeRequest::from_json(&json!({})).unwrap_err(),
            ValidationError::Missing("url")
        );
        assert_eq!(
            SubscribeRequest::from_json(&json!({"url": "  "})).unwrap_err(),
            ValidationError::Missing("url")
        );
        let req = SubscribeRequest::from_json(&json!({"url": " https://example.com/rss "})).unwrap();
        assert_eq!(req.url, "https://example.com/rss");
    }

    #[test]
    fn subscribe_rejects_non_http_url_and_extra_fields() {
        assert!(matches!(
            SubscribeRequest::from_json(&json!({"url": "file:///etc/passwd"})),
            Err(ValidationError::Invalid { field: "url", .. })
        ));
        assert!(matches!(
            SubscribeRequest::from_json(&json!({"url": "https://example.com/rss", "title": "x"})),
            Err(ValidationError::UnknownField(_))
        ));
    }

    #[test]
    fn document_metadata_always_validates() {
        let update = FeedUpdate::from_document(
            None,
            Some("d".repeat(20_000)),
            Some("/relative/art.png".to_string()),
        );
        assert_eq!(update.title, DEFAULT_FEED_TITLE);
        assert_eq!(
            update.description.as_deref().map(|d| d.chars().count()),
            Some(DESCRIPTION_MAX)
        );
        assert_eq!(update.image_url, None);
        assert!(update.validate().is_ok());

        let fields = FeedUpdate::from_document(
            Some(" Show ".to_string()),
            None,
            Some("https://example.com/art.png".to_string()),
        )
        .into_fields("https://example.com/rss");
        assert_eq!(fields.title, "Show");
        assert_eq!(fields.image_url.as_deref(), Some("https://example.com/art.png"));
        assert!(fields.validate().is_ok());
    }

    #[test]
    fn feed_update_requires_title() {
        assert_eq!(
            FeedUpdate::from_json(&json!({"description": "d"})).unwrap_err(),
            ValidationError::Missing("title")
        );
        let update = FeedUpdate::from_json(&json!({"title": "Renamed"})).unwrap();
        assert_eq!(update.title, "Renamed");
    }

    #[test]
    fn feed_update_rejects_bad_image_url() {
        assert!(matches!(
            FeedUpdate::from_json(&json!({"title": "t", "image_url": "art.png"})),
            Err(ValidationError::Invalid {
                field: "image_url",
                ..
            })
        ));
    }
}
