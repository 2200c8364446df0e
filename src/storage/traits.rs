//! Storage traits and error types
//!
//! The acquisition core only talks to persistence through these traits.

use crate::model::{Article, Source};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Registry of configured sources and their health state
pub trait SourceRegistry {
    /// Lists enabled sources in a scope, highest-priority tier first
    fn list_enabled_sources(&self, scope: &str) -> StorageResult<Vec<Source>>;

    /// Gets a source by id
    fn get_source(&self, id: &str) -> StorageResult<Option<Source>>;

    /// Inserts a source or replaces the stored record with the same id
    ///
    /// Returns the source id. Storing a second source with an existing
    /// (url, scope) pair is a constraint violation.
    fn upsert_source(&mut self, source: &Source) -> StorageResult<String>;

    /// Lists every source, enabled or not
    fn list_sources(&self) -> StorageResult<Vec<Source>>;

    /// Finds a source by its natural key
    fn find_source(&self, url: &str, scope: &str) -> StorageResult<Option<Source>>;
}

/// Persistence for acquired articles, keyed by canonical URL
pub trait ArticleStore {
    /// Inserts an article or updates the stored article with the same URL
    ///
    /// Returns the article's row id, which is stable across updates.
    fn upsert_article(&mut self, article: &Article) -> StorageResult<i64>;

    fn get_article_by_url(&self, url: &str) -> StorageResult<Option<Article>>;

    fn count_articles(&self) -> StorageResult<u64>;
}
