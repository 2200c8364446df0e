//! SQLite storage implementation
//!
//! Implements both [`SourceRegistry`] and [`ArticleStore`] over one
//! connection. Timestamps are stored as RFC 3339 text, metadata as JSON.

use crate::model::{Article, Metadata, Source, SourceKind, SourcePriority};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ArticleStore, SourceRegistry, StorageError, StorageResult};
use crate::AcquireError;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;

const SOURCE_COLUMNS: &str = "id, name, url, kind, priority, scope, enabled, fetch_interval_hours,
     last_fetched_at, last_error, error_count, created_at, metadata";

const ARTICLE_COLUMNS: &str = "title, url, source_id, source_name, content, summary, scope,
     published_at, fetched_at, author, word_count, metadata";

/// Orders sources official first, custom last
const PRIORITY_ORDER: &str = "CASE priority
     WHEN 'official' THEN 0
     WHEN 'stable-mirror' THEN 1
     WHEN 'high-risk-mirror' THEN 2
     ELSE 3 END";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path` and initializes the schema
    pub fn new(path: &Path) -> Result<Self, AcquireError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> Result<Self, AcquireError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl SourceRegistry for SqliteStorage {
    fn list_enabled_sources(&self, scope: &str) -> StorageResult<Vec<Source>> {
        let sql = format!(
            "SELECT {} FROM sources WHERE scope = ?1 AND enabled = 1 ORDER BY {}, created_at, name",
            SOURCE_COLUMNS, PRIORITY_ORDER
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let sources = stmt
            .query_map(params![scope], source_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    fn get_source(&self, id: &str) -> StorageResult<Option<Source>> {
        let sql = format!("SELECT {} FROM sources WHERE id = ?1", SOURCE_COLUMNS);
        let source = self
            .conn
            .query_row(&sql, params![id], source_from_row)
            .optional()?;
        Ok(source)
    }

    fn upsert_source(&mut self, source: &Source) -> StorageResult<String> {
        let metadata = metadata_to_json(&source.metadata)?;
        self.conn
            .execute(
                "INSERT INTO sources (id, name, url, kind, priority, scope, enabled,
                 fetch_interval_hours, last_fetched_at, last_error, error_count, created_at, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    url = excluded.url,
                    kind = excluded.kind,
                    priority = excluded.priority,
                    scope = excluded.scope,
                    enabled = excluded.enabled,
                    fetch_interval_hours = excluded.fetch_interval_hours,
                    last_fetched_at = excluded.last_fetched_at,
                    last_error = excluded.last_error,
                    error_count = excluded.error_count,
                    metadata = excluded.metadata",
                params![
                    source.id,
                    source.name,
                    source.url,
                    source.kind.to_db_string(),
                    source.priority.to_db_string(),
                    source.scope,
                    source.enabled,
                    source.fetch_interval_hours,
                    source.last_fetched_at.map(|t| t.to_rfc3339()),
                    source.last_error,
                    source.error_count,
                    source.created_at.to_rfc3339(),
                    metadata,
                ],
            )
            .map_err(constraint_error)?;
        Ok(source.id.clone())
    }

    fn list_sources(&self) -> StorageResult<Vec<Source>> {
        let sql = format!(
            "SELECT {} FROM sources ORDER BY scope, {}, name",
            SOURCE_COLUMNS, PRIORITY_ORDER
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let sources = stmt
            .query_map([], source_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    fn find_source(&self, url: &str, scope: &str) -> StorageResult<Option<Source>> {
        let sql = format!(
            "SELECT {} FROM sources WHERE url = ?1 AND scope = ?2",
            SOURCE_COLUMNS
        );
        let source = self
            .conn
            .query_row(&sql, params![url, scope], source_from_row)
            .optional()?;
        Ok(source)
    }
}

impl ArticleStore for SqliteStorage {
    fn upsert_article(&mut self, article: &Article) -> StorageResult<i64> {
        let metadata = metadata_to_json(&article.metadata)?;
        self.conn.execute(
            "INSERT INTO articles (title, url, source_id, source_name, content, summary, scope,
             published_at, fetched_at, author, word_count, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(url) DO UPDATE SET
                title = excluded.title,
                source_id = excluded.source_id,
                source_name = excluded.source_name,
                content = excluded.content,
                summary = excluded.summary,
                scope = excluded.scope,
                published_at = excluded.published_at,
                fetched_at = excluded.fetched_at,
                author = excluded.author,
                word_count = excluded.word_count,
                metadata = excluded.metadata",
            params![
                article.title,
                article.url,
                article.source_id,
                article.source_name,
                article.content,
                article.summary,
                article.scope,
                article.published_at.to_rfc3339(),
                article.fetched_at.to_rfc3339(),
                article.author,
                article.word_count as i64,
                metadata,
            ],
        )?;

        let id = self.conn.query_row(
            "SELECT id FROM articles WHERE url = ?1",
            params![article.url],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn get_article_by_url(&self, url: &str) -> StorageResult<Option<Article>> {
        let sql = format!("SELECT {} FROM articles WHERE url = ?1", ARTICLE_COLUMNS);
        let article = self
            .conn
            .query_row(&sql, params![url], article_from_row)
            .optional()?;
        Ok(article)
    }

    fn count_articles(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn source_from_row(row: &Row<'_>) -> rusqlite::Result<Source> {
    let kind: String = row.get(3)?;
    let priority: String = row.get(4)?;
    let last_fetched_at: Option<String> = row.get(8)?;

    Ok(Source {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        kind: SourceKind::from_db_string(&kind)
            .ok_or_else(|| invalid_text(3, format!("unknown source kind '{}'", kind)))?,
        priority: SourcePriority::from_db_string(&priority)
            .ok_or_else(|| invalid_text(4, format!("unknown priority '{}'", priority)))?,
        scope: row.get(5)?,
        enabled: row.get(6)?,
        fetch_interval_hours: row.get(7)?,
        last_fetched_at: last_fetched_at
            .map(|raw| parse_time(8, &raw))
            .transpose()?,
        last_error: row.get(9)?,
        error_count: row.get(10)?,
        created_at: parse_time(11, &row.get::<_, String>(11)?)?,
        metadata: parse_metadata(12, &row.get::<_, String>(12)?)?,
    })
}

fn article_from_row(row: &Row<'_>) -> rusqlite::Result<Article> {
    let word_count: i64 = row.get(10)?;

    Ok(Article {
        title: row.get(0)?,
        url: row.get(1)?,
        source_id: row.get(2)?,
        source_name: row.get(3)?,
        content: row.get(4)?,
        summary: row.get(5)?,
        scope: row.get(6)?,
        published_at: parse_time(7, &row.get::<_, String>(7)?)?,
        fetched_at: parse_time(8, &row.get::<_, String>(8)?)?,
        author: row.get(9)?,
        word_count: word_count.max(0) as usize,
        metadata: parse_metadata(11, &row.get::<_, String>(11)?)?,
    })
}

fn parse_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_metadata(idx: usize, raw: &str) -> rusqlite::Result<Metadata> {
    serde_json::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn invalid_text(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn metadata_to_json(metadata: &Metadata) -> StorageResult<String> {
    serde_json::to_string(metadata).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn constraint_error(error: rusqlite::Error) -> StorageError {
    match &error {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            StorageError::ConstraintViolation(
                message.clone().unwrap_or_else(|| failure.to_string()),
            )
        }
        _ => StorageError::Sqlite(error),
    }
}
