use crate::model::Metadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A normalized content item
///
/// `url` holds the canonical URL and is the natural key for persistence:
/// storing an article whose URL already exists updates the stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub url: String,
    pub source_id: Option<String>,
    pub source_name: Option<String>,

    /// Plain-text body
    pub content: String,

    pub summary: Option<String>,

    /// Inherited from the source, or classified from the text when there is none
    pub scope: String,

    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub author: Option<String>,

    /// Character count of `content` (feeds are frequently CJK, where
    /// whitespace-separated words are meaningless)
    pub word_count: usize,

    pub metadata: Metadata,
}
