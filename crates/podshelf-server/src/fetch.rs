// ABOUTME: Fetches podcast feeds over HTTP and reads their channel metadata and playable episodes.
// ABOUTME: Understands RSS 2.0 with iTunes, content and Media RSS extensions, plus basic Atom.

use std::sync::LazyLock;
use std::time::Duration;

use podshelf_core::{EpisodeFields, FeedItem, FeedUpdate};
use regex::Regex;
use reqwest::header::ACCEPT;
use roxmltree::{Document, Node};
use thiserror::Error;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Feeds larger than this are refused rather than buffered.
pub const MAX_FEED_BYTES: usize = 16 * 1024 * 1024;

const USER_AGENT: &str = concat!("podshelf/", env!("CARGO_PKG_VERSION"));
const ACCEPT_FEEDS: &str = "application/rss+xml, application/xml, text/xml, */*";

const ITUNES_NS: &str = "http://www.itunes.com/dtds/podcast-1.0.dtd";
const CONTENT_NS: &str = "http://purl.org/rss/1.0/modules/content/";
const MEDIA_NS: &str = "http://search.yahoo.com/mrss/";
const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

static MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("markup pattern is valid"));

/// Errors from fetching or reading a feed. All of them are the client's URL's fault.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to fetch feed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to fetch feed: server answered {0}")]
    Status(reqwest::StatusCode),

    #[error("failed to fetch feed: larger than {0} bytes")]
    TooLarge(usize),

    #[error("invalid RSS feed: {0}")]
    Parse(#[from] roxmltree::Error),

    #[error("no channel found in feed")]
    NoChannel,
}

/// What a feed document says about itself and its episodes.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedFeed {
    pub metadata: FeedUpdate,
    pub episodes: Vec<EpisodeFields>,
}

/// HTTP client used to download feeds.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
}

impl FeedFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// Download `url` and parse it.
    pub async fn fetch(&self, url: &str) -> Result<FetchedFeed, FetchError> {
        let mut response = self
            .client
            .get(url)
            .header(ACCEPT, ACCEPT_FEEDS)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > MAX_FEED_BYTES {
                return Err(FetchError::TooLarge(MAX_FEED_BYTES));
            }
            body.extend_from_slice(&chunk);
        }

        let feed = parse_feed(&String::from_utf8_lossy(&body))?;
        tracing::debug!(url, episodes = feed.episodes.len(), "feed fetched");
        Ok(feed)
    }
}

/// Read channel metadata and playable items from an RSS or Atom document.
///
/// Items without an http(s) enclosure are skipped.
pub fn parse_feed(xml: &str) -> Result<FetchedFeed, FetchError> {
    let doc = Document::parse(xml)?;
    let root = doc.root_element();

    if root.has_tag_name((ATOM_NS, "feed")) {
        return Ok(parse_atom(root));
    }
    let channel = if is(root, Tag::Plain("channel")) {
        root
    } else {
        child(root, Tag::Plain("channel")).ok_or(FetchError::NoChannel)?
    };
    Ok(parse_rss(channel))
}

fn parse_rss(channel: Node<'_, '_>) -> FetchedFeed {
    let image_url = child(channel, Tag::Ns(ITUNES_NS, "image"))
        .and_then(|image| image.attribute("href"))
        .map(str::to_string)
        .or_else(|| {
            child(channel, Tag::Plain("image"))
                .and_then(|image| text_of(image, &[Tag::Plain("url")]))
        });
    let metadata = FeedUpdate::from_document(
        text_of(channel, &[Tag::Plain("title")]),
        text_of(
            channel,
            &[Tag::Plain("description"), Tag::Ns(ITUNES_NS, "summary")],
        ),
        image_url,
    );

    let episodes = channel
        .children()
        .filter(|n| is(*n, Tag::Plain("item")))
        .filter_map(|item| {
            let audio_url = child(item, Tag::Plain("enclosure"))
                .and_then(|enclosure| enclosure.attribute("url"))
                .or_else(|| media_url(item))?;
            EpisodeFields::from_item(FeedItem {
                guid: text_of(item, &[Tag::Plain("guid")]),
                title: text_of(item, &[Tag::Plain("title")]),
                description: text_of(
                    item,
                    &[
                        Tag::Plain("description"),
                        Tag::Ns(CONTENT_NS, "encoded"),
                        Tag::Ns(ITUNES_NS, "summary"),
                    ],
                )
                .map(|d| strip_markup(&d)),
                audio_url: audio_url.to_string(),
                pub_date: text_of(item, &[Tag::Plain("pubDate"), Tag::Plain("published")]),
                duration: text_of(
                    item,
                    &[Tag::Ns(ITUNES_NS, "duration"), Tag::Plain("duration")],
                ),
            })
        })
        .collect();

    FetchedFeed { metadata, episodes }
}

fn parse_atom(feed: Node<'_, '_>) -> FetchedFeed {
    let metadata = FeedUpdate::from_document(
        text_of(feed, &[Tag::Ns(ATOM_NS, "title")]),
        text_of(feed, &[Tag::Ns(ATOM_NS, "subtitle")]),
        text_of(feed, &[Tag::Ns(ATOM_NS, "logo"), Tag::Ns(ATOM_NS, "icon")]),
    );

    let episodes = feed
        .children()
        .filter(|n| is(*n, Tag::Ns(ATOM_NS, "entry")))
        .filter_map(|entry| {
            let audio_url = entry
                .children()
                .find(|n| {
                    is(*n, Tag::Ns(ATOM_NS, "link")) && n.attribute("rel") == Some("enclosure")
                })
                .and_then(|link| link.attribute("href"))
                .or_else(|| media_url(entry))?;
            EpisodeFields::from_item(FeedItem {
                guid: text_of(entry, &[Tag::Ns(ATOM_NS, "id")]),
                title: text_of(entry, &[Tag::Ns(ATOM_NS, "title")]),
                description: text_of(
                    entry,
                    &[Tag::Ns(ATOM_NS, "summary"), Tag::Ns(ATOM_NS, "content")],
                )
                .map(|d| strip_markup(&d)),
                audio_url: audio_url.to_string(),
                pub_date: text_of(
                    entry,
                    &[Tag::Ns(ATOM_NS, "published"), Tag::Ns(ATOM_NS, "updated")],
                ),
                duration: text_of(entry, &[Tag::Ns(ITUNES_NS, "duration")]),
            })
        })
        .collect();

    FetchedFeed { metadata, episodes }
}

/// An element name, with or without a namespace.
#[derive(Debug, Clone, Copy)]
enum Tag {
    Plain(&'static str),
    Ns(&'static str, &'static str),
}

fn is(node: Node<'_, '_>, tag: Tag) -> bool {
    if !node.is_element() {
        return false;
    }
    let name = node.tag_name();
    match tag {
        Tag::Plain(local) => name.namespace().is_none() && name.name() == local,
        Tag::Ns(ns, local) => name.namespace() == Some(ns) && name.name() == local,
    }
}

fn child<'a, 'input>(node: Node<'a, 'input>, tag: Tag) -> Option<Node<'a, 'input>> {
    node.children().find(|n| is(*n, tag))
}

/// Trimmed text of the first listed child element that has any.
fn text_of(node: Node<'_, '_>, tags: &[Tag]) -> Option<String> {
    tags.iter().find_map(|tag| {
        node.children()
            .filter(|n| is(*n, *tag))
            .find_map(|n| n.text().map(str::trim).filter(|t| !t.is_empty()))
            .map(str::to_string)
    })
}

fn media_url<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.descendants()
        .find(|n| is(*n, Tag::Ns(MEDIA_NS, "content")))
        .and_then(|media| media.attribute("url"))
}

/// Drop tags and decode entities so descriptions read as plain text.
fn strip_markup(raw: &str) -> String {
    let without_tags = MARKUP.replace_all(raw, "");
    html_escape::decode_html_entities(&without_tags).trim().to_string()
}
