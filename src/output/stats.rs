//! Source health statistics from the registry
//!
//! This module provides functionality for summarizing the health state of
//! registered sources and displaying it.

use crate::model::{Source, SourcePriority};
use crate::storage::{ArticleStore, SourceRegistry};
use crate::AcquireError;
use std::collections::BTreeMap;

/// Snapshot of one source that is currently failing or disabled
#[derive(Debug, Clone)]
pub struct FailingSource {
    pub name: String,
    pub url: String,
    pub scope: String,
    pub priority: SourcePriority,
    pub enabled: bool,
    pub error_count: u32,
    pub last_error: Option<String>,
}

impl From<&Source> for FailingSource {
    fn from(source: &Source) -> Self {
        Self {
            name: source.name.clone(),
            url: source.url.clone(),
            scope: source.scope.clone(),
            priority: source.priority,
            enabled: source.enabled,
            error_count: source.error_count,
            last_error: source.last_error.clone(),
        }
    }
}

/// Registry-wide health statistics
#[derive(Debug, Clone, Default)]
pub struct HealthStatistics {
    /// Total number of registered sources
    pub total_sources: u64,

    pub enabled_sources: u64,
    pub disabled_sources: u64,

    /// Source count per scope
    pub sources_by_scope: BTreeMap<String, u64>,

    /// Source count per priority tier
    pub sources_by_priority: BTreeMap<String, u64>,

    /// Number of stored articles
    pub total_articles: u64,

    /// Sources with a non-zero error count or disabled, worst first
    pub failing: Vec<FailingSource>,
}

/// Loads health statistics from storage
pub fn load_statistics<S>(storage: &S) -> Result<HealthStatistics, AcquireError>
where
    S: SourceRegistry + ArticleStore,
{
    let sources = storage.list_sources()?;
    let mut stats = summarize_sources(&sources);
    stats.total_articles = storage.count_articles()?;
    Ok(stats)
}

/// Builds statistics from a list of sources
pub fn summarize_sources(sources: &[Source]) -> HealthStatistics {
    let mut stats = HealthStatistics {
        total_sources: sources.len() as u64,
        ..Default::default()
    };

    for source in sources {
        if source.enabled {
            stats.enabled_sources += 1;
        } else {
            stats.disabled_sources += 1;
        }
        *stats
            .sources_by_scope
            .entry(source.scope.clone())
            .or_insert(0) += 1;
        *stats
            .sources_by_priority
            .entry(source.priority.to_string())
            .or_insert(0) += 1;

        if source.error_count > 0 || !source.enabled {
            stats.failing.push(FailingSource::from(source));
        }
    }

    // Disabled first, then by error count
    stats.failing.sort_by(|a, b| {
        a.enabled
            .cmp(&b.enabled)
            .then(b.error_count.cmp(&a.error_count))
            .then(a.name.cmp(&b.name))
    });

    stats
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HealthStatistics) {
    println!("=== Source Health ===\n");

    println!("Overview:");
    println!("  Total sources: {}", stats.total_sources);
    println!("  Enabled: {}", stats.enabled_sources);
    println!("  Disabled: {}", stats.disabled_sources);
    println!("  Stored articles: {}", stats.total_articles);
    println!();

    if !stats.sources_by_scope.is_empty() {
        println!("Sources by Scope:");
        for (scope, count) in &stats.sources_by_scope {
            println!("  {}: {}", scope, count);
        }
        println!();
    }

    if !stats.sources_by_priority.is_empty() {
        println!("Sources by Priority:");
        for (priority, count) in &stats.sources_by_priority {
            println!("  {}: {}", priority, count);
        }
        println!();
    }

    if stats.failing.is_empty() {
        println!("No failing sources");
        return;
    }

    println!("Failing Sources ({}):", stats.failing.len());
    for source in &stats.failing {
        let state = if source.enabled { "degraded" } else { "disabled" };
        println!(
            "  - {} [{}, {}] {} errors ({})",
            source.name, source.scope, source.priority, source.error_count, state
        );
        println!("    {}", source.url);
        if let Some(error) = &source.last_error {
            println!("    last error: {}", error);
        }
    }
}
