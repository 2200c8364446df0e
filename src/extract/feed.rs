//! Feed normalization
//!
//! Turns RSS, Atom or JSON Feed documents into articles. Parsing is strict
//! (a malformed document is an error the fetch policy classifies as a parse
//! failure) while per-entry problems only drop that entry.

use crate::extract::text::{strip_markup, summarize, truncate_chars};
use crate::extract::timestamp::parse_timestamp;
use crate::model::{Article, Metadata, Source};
use crate::url::canonicalize_url;
use chrono::{DateTime, Duration, Utc};
use feed_rs::model::{Entry, Feed};
use feed_rs::parser;
use thiserror::Error;
use tracing::debug;
use url::Url;

const MAX_TITLE_CHARS: usize = 500;
const MAX_SUMMARY_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Malformed feed: {0}")]
    Malformed(String),
}

/// Parses a feed document
///
/// Takes the undecoded body so the document's own encoding declaration is
/// honored. An empty but well-formed feed is a success with zero entries.
pub fn parse_feed(body: &[u8]) -> Result<Feed, FeedError> {
    let parser = parser::Builder::new()
        .timestamp_parser(parse_timestamp)
        .build();

    parser
        .parse(body)
        .map_err(|e| FeedError::Malformed(e.to_string()))
}

/// Converts feed entries into articles published within `window` of `now`
///
/// Entries are kept in feed order. The cutoff is inclusive: an entry
/// published exactly `window` before `now` is kept. Entries without a
/// timestamp are treated as published at `now`.
pub fn normalize_feed(
    feed: Feed,
    source: &Source,
    window: Duration,
    now: DateTime<Utc>,
) -> Vec<Article> {
    let cutoff = recency_cutoff(now, window);
    let base = Url::parse(&source.url).ok();

    let mut articles = Vec::new();
    for entry in feed.entries {
        let published_at = entry.published.or(entry.updated).unwrap_or(now);
        if published_at < cutoff {
            continue;
        }

        match entry_to_article(entry, source, base.as_ref(), published_at, now) {
            Some(article) => articles.push(article),
            None => debug!("Dropping feed entry without title or link from '{}'", source.name),
        }
    }

    articles
}

/// Oldest publication time kept by a recency window
///
/// Windows reaching past the representable range keep everything.
pub fn recency_cutoff(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn entry_to_article(
    entry: Entry,
    source: &Source,
    base: Option<&Url>,
    published_at: DateTime<Utc>,
    fetched_at: DateTime<Utc>,
) -> Option<Article> {
    let title = entry
        .title
        .map(|t| strip_markup(&t.content))
        .filter(|t| !t.is_empty())?;
    let title = truncate_chars(&title, MAX_TITLE_CHARS);

    let link = entry
        .links
        .iter()
        .map(|l| l.href.trim())
        .find(|href| !href.is_empty())?;
    let url = resolve_link(link, base)?;

    let summary_text = entry
        .summary
        .as_ref()
        .map(|s| strip_markup(&s.content))
        .filter(|s| !s.is_empty());

    let content = entry
        .content
        .and_then(|c| c.body)
        .map(|body| strip_markup(&body))
        .filter(|c| !c.is_empty())
        .or_else(|| summary_text.clone())
        .unwrap_or_else(|| title.clone());

    let author = entry
        .authors
        .first()
        .map(|p| p.name.trim().to_string())
        .filter(|name| !name.is_empty());

    let mut metadata = Metadata::new();
    metadata.insert("feed_url".to_string(), source.url.clone().into());
    metadata.insert("source_type".to_string(), "feed".into());
    if !entry.id.is_empty() {
        metadata.insert("entry_id".to_string(), entry.id.into());
    }

    Some(Article {
        title,
        url,
        source_id: Some(source.id.clone()),
        source_name: Some(source.name.clone()),
        word_count: content.chars().count(),
        content,
        summary: summary_text.map(|s| summarize(&s, MAX_SUMMARY_CHARS)),
        scope: source.scope.clone(),
        published_at,
        fetched_at,
        author,
        metadata,
    })
}

/// Resolves a possibly relative entry link and canonicalizes it
fn resolve_link(link: &str, base: Option<&Url>) -> Option<String> {
    let absolute = match Url::parse(link) {
        Ok(url) => url,
        Err(_) => base?.join(link).ok()?,
    };
    canonicalize_url(absolute.as_str())
        .ok()
        .map(|url| url.to_string())
}
