//! Storage module for the source registry and acquired articles
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Source registry reads and health write-back
//! - Article upsert by canonical URL
//! - Syncing configured sources into the registry

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{ArticleStore, SourceRegistry, StorageError, StorageResult};

use crate::config::SourceEntry;
use crate::model::Source;
use crate::AcquireError;
use std::path::Path;
use tracing::debug;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, AcquireError> {
    SqliteStorage::new(path)
}

/// Outcome of syncing configured sources into a registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub inserted: usize,
    pub existing: usize,
}

/// Inserts configured sources that the registry does not know yet
///
/// Sources are matched on (url, scope). Existing sources are left untouched
/// so their health state survives restarts; a disabled source stays disabled
/// even if the configuration lists it as enabled.
pub fn sync_sources<R: SourceRegistry>(
    registry: &mut R,
    entries: &[SourceEntry],
) -> StorageResult<SyncSummary> {
    let mut summary = SyncSummary::default();

    for entry in entries {
        if registry.find_source(&entry.url, &entry.scope)?.is_some() {
            summary.existing += 1;
            continue;
        }

        let mut source = Source::new(
            entry.name.clone(),
            entry.url.clone(),
            entry.kind,
            entry.priority,
            entry.scope.clone(),
        );
        source.enabled = entry.enabled;
        source.fetch_interval_hours = entry.fetch_interval_hours;

        debug!("Registering source '{}' ({})", source.name, source.url);
        registry.upsert_source(&source)?;
        summary.inserted += 1;
    }

    Ok(summary)
}
