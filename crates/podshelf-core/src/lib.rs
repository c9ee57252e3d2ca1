// ABOUTME: Core library for podshelf, containing the persisted domain types and their validation.
// ABOUTME: Shared by the storage manager and the HTTP dispatcher so both speak the same typed model.

pub mod episode;
pub mod error;
pub mod feed;
pub mod payload;
pub mod record;
pub mod timestamp;

pub use episode::{
    Episode, EpisodeFields, FeedItem, Progress, normalize_duration, normalize_pub_date,
};
pub use error::ValidationError;
pub use feed::{Feed, FeedFields, FeedUpdate, NewFeed, SubscribeRequest};
pub use record::{Record, RecordFields};
