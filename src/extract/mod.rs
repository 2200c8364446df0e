//! Content normalization: feeds and single pages into [`Article`](crate::Article)s

mod classify;
mod feed;
mod page;
mod text;
mod timestamp;

pub use classify::{ScopeClassifier, FALLBACK_SCOPE};
pub use feed::{normalize_feed, parse_feed, recency_cutoff, FeedError};
pub use page::{extract_article, ExtractError};
pub use text::{strip_markup, summarize};
pub use timestamp::parse_timestamp;
