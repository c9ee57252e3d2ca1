// ABOUTME: Podcast library storage: feed subscriptions, their episodes, and playback progress.
// ABOUTME: Adding or refreshing a feed writes the feed row and all new episodes in one transaction.

use podshelf_core::{Episode, EpisodeFields, Feed, FeedUpdate, NewFeed, Progress, timestamp};
use rusqlite::{OptionalExtension, Row, Transaction, params};
use serde::Serialize;

use crate::error::StoreError;
use crate::manager::StorageManager;
use crate::schema::timestamp_column;

const SELECT_FEED: &str =
    "SELECT id, url, title, description, image_url, added_at, updated_at FROM feeds";

const SELECT_EPISODE: &str = "SELECT id, feed_id, guid, title, description, audio_url, pub_date, duration, played, position FROM episodes";

/// Result of subscribing to a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedFeed {
    #[serde(flatten)]
    pub feed: Feed,
    /// Episodes actually inserted; duplicates by audio URL are skipped.
    pub episode_count: usize,
}

impl StorageManager {
    /// Subscribe to a feed. A feed with the same URL already present is a `Conflict`.
    pub async fn create_feed(&self, new: NewFeed) -> Result<CreatedFeed, StoreError> {
        new.feed.validate()?;
        for episode in &new.episodes {
            episode.validate()?;
        }

        self.write("create_feed", move |tx| {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM feeds WHERE url = ?1",
                    params![new.feed.url],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Err(StoreError::Conflict("feed already exists".to_string()));
            }

            let now = timestamp::now();
            tx.execute(
                "INSERT INTO feeds (url, title, description, image_url, added_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![
                    new.feed.url,
                    new.feed.title,
                    new.feed.description,
                    new.feed.image_url,
                    timestamp::to_db(&now)
                ],
            )?;
            let feed_id = tx.last_insert_rowid();
            let episode_count = insert_episodes(tx, feed_id, &new.episodes)?;

            tracing::info!(feed_id, episode_count, "feed added");
            Ok(CreatedFeed {
                feed: Feed {
                    id: feed_id,
                    url: new.feed.url,
                    title: new.feed.title,
                    description: new.feed.description,
                    image_url: new.feed.image_url,
                    added_at: now,
                    updated_at: now,
                },
                episode_count,
            })
        })
        .await
    }

    pub async fn get_feed(&self, id: i64) -> Result<Feed, StoreError> {
        self.read("get_feed", move |tx| fetch_feed(tx, id)).await
    }

    /// All feeds, most recently added first.
    pub async fn list_feeds(&self) -> Result<Vec<Feed>, StoreError> {
        self.read("list_feeds", |tx| {
            let mut stmt = tx.prepare(&format!("{SELECT_FEED} ORDER BY added_at DESC, id DESC"))?;
            let rows = stmt.query_map([], feed_from_row)?;
            let mut feeds = Vec::new();
            for row in rows {
                feeds.push(row?);
            }
            Ok(feeds)
        })
        .await
    }

    /// Replace a feed's title, description, and artwork.
    pub async fn update_feed(&self, id: i64, update: FeedUpdate) -> Result<Feed, StoreError> {
        self.write("update_feed", move |tx| {
            let existing = fetch_feed(tx, id)?;
            update.validate()?;
            let updated_at = timestamp::after(existing.updated_at);
            tx.execute(
                "UPDATE feeds SET title = ?1, description = ?2, image_url = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![
                    update.title,
                    update.description,
                    update.image_url,
                    timestamp::to_db(&updated_at),
                    id
                ],
            )?;
            Ok(Feed {
                title: update.title,
                description: update.description,
                image_url: update.image_url,
                updated_at,
                ..existing
            })
        })
        .await
    }

    /// Unsubscribe; the feed's episodes are removed with it.
    pub async fn delete_feed(&self, id: i64) -> Result<(), StoreError> {
        self.write("delete_feed", move |tx| {
            let removed = tx.execute("DELETE FROM feeds WHERE id = ?1", params![id])?;
            if removed == 0 {
                return Err(StoreError::not_found("feed", id));
            }
            Ok(())
        })
        .await
    }

    /// Whether a feed with this URL is already subscribed.
    pub async fn feed_url_exists(&self, url: &str) -> Result<bool, StoreError> {
        let url = url.to_string();
        self.read("feed_url_exists", move |tx| {
            let found: Option<i64> = tx
                .query_row("SELECT id FROM feeds WHERE url = ?1", params![url], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    /// Apply a re-read of the feed: replace its metadata and add episodes not
    /// yet known, in one transaction. Returns how many episodes were new.
    pub async fn refresh_feed(
        &self,
        feed_id: i64,
        metadata: FeedUpdate,
        episodes: Vec<EpisodeFields>,
    ) -> Result<usize, StoreError> {
        metadata.validate()?;
        for episode in &episodes {
            episode.validate()?;
        }
        self.write("refresh_feed", move |tx| {
            let feed = fetch_feed(tx, feed_id)?;
            let added = insert_episodes(tx, feed_id, &episodes)?;
            tx.execute(
                "UPDATE feeds SET title = ?1, description = ?2, image_url = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![
                    metadata.title,
                    metadata.description,
                    metadata.image_url,
                    timestamp::to_db(&timestamp::after(feed.updated_at)),
                    feed_id
                ],
            )?;
            tracing::debug!(feed_id, offered = episodes.len(), added, "feed refreshed");
            Ok(added)
        })
        .await
    }

    /// Episodes of one feed, newest publication first.
    pub async fn list_episodes(&self, feed_id: i64) -> Result<Vec<Episode>, StoreError> {
        self.read("list_episodes", move |tx| {
            fetch_feed(tx, feed_id)?;
            let mut stmt = tx.prepare(&format!(
                "{SELECT_EPISODE} WHERE feed_id = ?1 ORDER BY pub_date DESC, id DESC"
            ))?;
            let rows = stmt.query_map(params![feed_id], episode_from_row)?;
            let mut episodes = Vec::new();
            for row in rows {
                episodes.push(row?);
            }
            Ok(episodes)
        })
        .await
    }

    pub async fn get_episode(&self, id: i64) -> Result<Episode, StoreError> {
        self.read("get_episode", move |tx| fetch_episode(tx, id)).await
    }

    /// Record the playback position and played flag of an episode.
    pub async fn update_progress(&self, id: i64, progress: Progress) -> Result<(), StoreError> {
        progress.validate()?;
        self.write("update_progress", move |tx| {
            let changed = tx.execute(
                "UPDATE episodes SET position = ?1, played = ?2 WHERE id = ?3",
                params![progress.position, progress.played, id],
            )?;
            if changed == 0 {
                return Err(StoreError::not_found("episode", id));
            }
            Ok(())
        })
        .await
    }

    /// Flip the played flag and return its new value.
    pub async fn toggle_played(&self, id: i64) -> Result<bool, StoreError> {
        self.write("toggle_played", move |tx| {
            let changed = tx.execute(
                "UPDATE episodes SET played = NOT played WHERE id = ?1",
                params![id],
            )?;
            if changed == 0 {
                return Err(StoreError::not_found("episode", id));
            }
            let played: bool =
                tx.query_row("SELECT played FROM episodes WHERE id = ?1", params![id], |row| {
                    row.get(0)
                })?;
            Ok(played)
        })
        .await
    }
}

fn insert_episodes(
    tx: &Transaction<'_>,
    feed_id: i64,
    episodes: &[EpisodeFields],
) -> Result<usize, StoreError> {
    let mut stmt = tx.prepare(
        "INSERT OR IGNORE INTO episodes
            (feed_id, guid, title, description, audio_url, pub_date, duration)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    let mut added = 0;
    for ep in episodes {
        added += stmt.execute(params![
            feed_id,
            ep.guid,
            ep.title,
            ep.description,
            ep.audio_url,
            ep.pub_date,
            ep.duration
        ])?;
    }
    Ok(added)
}

fn feed_from_row(row: &Row<'_>) -> rusqlite::Result<Feed> {
    Ok(Feed {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        image_url: row.get(4)?,
        added_at: timestamp_column(row, 5)?,
        updated_at: timestamp_column(row, 6)?,
    })
}

fn episode_from_row(row: &Row<'_>) -> rusqlite::Result<Episode> {
    Ok(Episode {
        id: row.get(0)?,
        feed_id: row.get(1)?,
        guid: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        audio_url: row.get(5)?,
        pub_date: row.get(6)?,
        duration: row.get(7)?,
        played: row.get(8)?,
        position: row.get(9)?,
    })
}

fn fetch_feed(tx: &Transaction<'_>, id: i64) -> Result<Feed, StoreError> {
    tx.query_row(&format!("{SELECT_FEED} WHERE id = ?1"), params![id], feed_from_row)
        .optional()?
        .ok_or_else(|| StoreError::not_found("feed", id))
}

fn fetch_episode(tx: &Transaction<'_>, id: i64) -> Result<Episode, StoreError> {
    tx.query_row(
        &format!("{SELECT_EPISODE} WHERE id = ?1"),
        params![id],
        episode_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("episode", id))
}
