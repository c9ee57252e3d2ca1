// ABOUTME: Defines podcast episodes, their conversion from fetched feed items, and playback progress updates.
// ABOUTME: Normalises durations and publication dates so listings sort and display consistently.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::payload::{Payload, check_http_url, check_len, truncate_chars};

/// Title used when an episode arrives without one.
pub const DEFAULT_EPISODE_TITLE: &str = "Untitled";

/// Episode descriptions are cut to this many characters.
pub const DESCRIPTION_PREVIEW_CHARS: usize = 500;

/// An episode belonging to a feed, with its playback state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: i64,
    pub feed_id: i64,
    pub guid: String,
    pub title: String,
    pub description: Option<String>,
    pub audio_url: String,
    pub pub_date: Option<String>,
    pub duration: Option<String>,
    pub played: bool,
    pub position: f64,
}

/// Episode metadata read from a feed when subscribing or refreshing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeFields {
    pub guid: String,
    pub title: String,
    pub description: Option<String>,
    pub audio_url: String,
    pub pub_date: Option<String>,
    pub duration: Option<String>,
}

impl EpisodeFields {
    pub const GUID_MAX: usize = 2048;
    pub const TITLE_MAX: usize = 500;

    pub fn new(audio_url: impl Into<String>, title: impl Into<String>) -> Self {
        let audio_url = audio_url.into();
        Self {
            guid: audio_url.clone(),
            title: title.into(),
            description: None,
            audio_url,
            pub_date: None,
            duration: None,
        }
    }

    /// Apply defaults and normalisation to an item read from a feed.
    ///
    /// Returns `None` for items whose enclosure is not an http(s) URL; such
    /// episodes cannot be played and are skipped.
    pub fn from_item(item: FeedItem) -> Option<Self> {
        let audio_url = item.audio_url.trim().to_string();
        if check_http_url("audio_url", &audio_url).is_err() {
            return None;
        }
        Some(Self {
            guid: non_empty(item.guid)
                .map(|g| truncate_chars(&g, Self::GUID_MAX))
                .unwrap_or_else(|| audio_url.clone()),
            title: non_empty(item.title)
                .map(|t| truncate_chars(&t, Self::TITLE_MAX))
                .unwrap_or_else(|| DEFAULT_EPISODE_TITLE.to_string()),
            description: non_empty(item.description)
                .map(|d| truncate_chars(&d, DESCRIPTION_PREVIEW_CHARS)),
            audio_url,
            pub_date: item.pub_date.as_deref().and_then(normalize_pub_date),
            duration: item.duration.as_deref().and_then(normalize_duration),
        })
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_http_url("audio_url", &self.audio_url)?;
        check_len("guid", &self.guid, Self::GUID_MAX)?;
        check_len("title", &self.title, Self::TITLE_MAX)?;
        if let Some(description) = &self.description {
            check_len("description", description, DESCRIPTION_PREVIEW_CHARS)?;
        }
        Ok(())
    }
}

/// An `<item>` as read from a feed document, before defaults and normalisation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub guid: Option<String>,
    pub title: Option<String>,
    /// Plain text; markup already removed.
    pub description: Option<String>,
    pub audio_url: String,
    pub pub_date: Option<String>,
    pub duration: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Body of `PUT /api/episodes/{id}/progress`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub position: f64,
    pub played: bool,
}

impl Progress {
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let payload = Payload::new(value, &["position", "played"])?;
        let progress = Self {
            position: payload.optional_f64("position")?.unwrap_or(0.0),
            played: payload.optional_bool("played")?.unwrap_or(false),
        };
        progress.validate()?;
        Ok(progress)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.position.is_finite() || self.position < 0.0 {
            return Err(ValidationError::invalid(
                "position",
                "must be a non-negative number of seconds",
            ));
        }
        Ok(())
    }
}

/// Render a duration for display.
///
/// Values already in `MM:SS`/`HH:MM:SS` form are kept, a bare number of seconds
/// becomes `M:SS` or `H:MM:SS`, anything else passes through unchanged.
pub fn normalize_duration(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.contains(':') {
        return Some(raw.to_string());
    }
    match raw.parse::<u64>() {
        Ok(seconds) => {
            let (h, rem) = (seconds / 3600, seconds % 3600);
            let (m, s) = (rem / 60, rem % 60);
            if h > 0 {
                Some(format!("{h}:{m:02}:{s:02}"))
            } else {
                Some(format!("{m}:{s:02}"))
            }
        }
        Err(_) => Some(raw.to_string()),
    }
}

/// Render a publication date as `YYYY-MM-DD HH:MM` so dates sort lexically.
///
/// Accepts RFC 2822 (the RSS `pubDate` form), RFC 3339, and bare `YYYY-MM-DD`.
/// Unrecognised input is kept, cut to 25 characters.
pub fn normalize_pub_date(raw: &str) -> Option<String> {
    const FORMAT: &str = "%Y-%m-%d %H:%M";
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.format(FORMAT).to_string());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.format(FORMAT).to_string());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(format!("{} 00:00", date.format("%Y-%m-%d")));
    }
    Some(raw.chars().take(25).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn duration_from_seconds() {
        assert_eq!(normalize_duration("59").as_deref(), Some("0:59"));
        assert_eq!(normalize_duration("754").as_deref(), Some("12:34"));
        assert_eq!(normalize_duration("3661").as_deref(), Some("1:01:01"));
    }

    #[test]
    fn duration_passthrough() {
        assert_eq!(normalize_duration("01:02:03").as_deref(), Some("01:02:03"));
        assert_eq!(normalize_duration("about an hour").as_deref(), Some("about an hour"));
        assert_eq!(normalize_duration("   "), None);
    }

    #[test]
    fn pub_date_formats() {
        assert_eq!(
            normalize_pub_date("Tue, 10 Jun 2025 04:00:00 +0000").as_deref(),
            Some("2025-06-10 04:00")
        );
        assert_eq!(
            normalize_pub_date("2025-06-10T04:00:00Z").as_deref(),
            Some("2025-06-10 04:00")
        );
        assert_eq!(
            normalize_pub_date("2025-06-10").as_deref(),
            Some("2025-06-10 00:00")
        );
        assert_eq!(
            normalize_pub_date("sometime in the distant past, probably").as_deref(),
            Some("sometime in the distant p")
        );
    }

    fn item(audio_url: &str) -> FeedItem {
        FeedItem {
            audio_url: audio_url.to_string(),
            ..FeedItem::default()
        }
    }

    #[test]
    fn item_defaults_guid_and_title() {
        let ep = EpisodeFields::from_item(FeedItem {
            title: Some("   ".to_string()),
            ..item(" https://cdn.example/1.mp3 ")
        })
        .unwrap();
        assert_eq!(ep.audio_url, "https://cdn.example/1.mp3");
        assert_eq!(ep.guid, "https://cdn.example/1.mp3");
        assert_eq!(ep.title, DEFAULT_EPISODE_TITLE);
        assert!(ep.validate().is_ok());
    }

    #[test]
    fn item_is_normalised_and_cut() {
        let ep = EpisodeFields::from_item(FeedItem {
            guid: Some("ep-1".to_string()),
            description: Some("z".repeat(900)),
            pub_date: Some("Tue, 10 Jun 2025 04:00:00 +0000".to_string()),
            duration: Some("3600".to_string()),
            ..item("https://cdn.example/1.mp3")
        })
        .unwrap();
        assert_eq!(ep.guid, "ep-1");
        assert_eq!(
            ep.description.as_deref().map(|d| d.chars().count()),
            Some(DESCRIPTION_PREVIEW_CHARS)
        );
        assert_eq!(ep.pub_date.as_deref(), Some("2025-06-10 04:00"));
        assert_eq!(ep.duration.as_deref(), Some("1:00:00"));
        assert!(ep.validate().is_ok());
    }

    #[test]
    fn item_without_playable_url_is_skipped() {
        assert_eq!(EpisodeFields::from_item(item("")), None);
        assert_eq!(EpisodeFields::from_item(item("episode1.mp3")), None);
    }

    #[test]
    fn progress_defaults_and_bounds() {
        let p = Progress::from_json(&json!({})).unwrap();
        assert_eq!(p, Progress { position: 0.0, played: false });

        let p = Progress::from_json(&json!({"position": 91.5, "played": true})).unwrap();
        assert_eq!(p.position, 91.5);
        assert!(p.played);

        assert!(Progress::from_json(&json!({"position": -1})).is_err());
    }
}
