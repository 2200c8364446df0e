//! Fetch orchestrator - concurrent batch acquisition
//!
//! This module drives one acquisition batch:
//! - Reading the enabled sources for a scope from the registry
//! - Spawning one task per source under a shared wall-clock ceiling
//! - Normalizing each source's content by its kind
//! - Deduplicating articles across sources
//! - Writing health back to the registry after every source settles

use crate::acquire::dedup::BatchDeduplicator;
use crate::config::Config;
use crate::extract::{
    extract_article, normalize_feed, parse_feed, recency_cutoff, ScopeClassifier, FALLBACK_SCOPE,
};
use crate::fetch::FetchPolicy;
use crate::model::{Article, ErrorClass, FetchOutcome, Source, SourceKind, SourcePriority};
use crate::state::{HealthPolicy, HealthTransition};
use crate::storage::SourceRegistry;
use crate::url::extract_domain;
use crate::AcquireError;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Parameters of one acquisition batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireRequest {
    pub scope: String,

    /// Recency window: only content published within this many hours is kept
    pub window_hours: u32,

    /// Restricts the batch to these source ids when set
    pub source_ids: Option<Vec<String>>,
}

impl AcquireRequest {
    pub fn new(scope: impl Into<String>, window_hours: u32) -> Self {
        Self {
            scope: scope.into(),
            window_hours,
            source_ids: None,
        }
    }

    pub fn with_sources(mut self, source_ids: Vec<String>) -> Self {
        self.source_ids = Some(source_ids);
        self
    }
}

/// Per-source result of a batch
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub source_id: String,
    pub source_name: String,
    pub url: String,
    pub priority: SourcePriority,
    pub outcome: FetchOutcome,

    /// Articles from this source that survived deduplication
    pub articles: usize,

    /// Candidate URL that served the content, when one did
    pub served_by: Option<String>,

    pub transition: HealthTransition,
}

/// Overall batch result classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Every source succeeded
    Complete,

    /// Some sources failed
    Partial,

    /// Every source failed and nothing was acquired
    NoContent,
}

/// Merged result of an acquisition batch
#[derive(Debug, Clone)]
pub struct AcquireReport {
    pub scope: String,

    /// Deduplicated articles, in completion order of their sources
    pub articles: Vec<Article>,

    pub outcomes: Vec<SourceOutcome>,
    pub elapsed: Duration,
}

impl AcquireReport {
    pub fn status(&self) -> BatchStatus {
        let failed = self.failed();
        if failed == 0 {
            BatchStatus::Complete
        } else if failed == self.outcomes.len() && self.articles.is_empty() {
            BatchStatus::NoContent
        } else {
            BatchStatus::Partial
        }
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Sources this batch disabled
    pub fn disabled(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.transition, HealthTransition::Disabled { .. }))
    }
}

/// Concurrent multi-source acquisition over a shared source registry
pub struct Orchestrator<R> {
    registry: Arc<Mutex<R>>,
    policy: Arc<FetchPolicy>,
    health: Arc<HealthPolicy>,
    classifier: Arc<ScopeClassifier>,
    batch_ceiling: Duration,
}

/// Everything one source task needs, shared across the batch
struct SourceTask<R> {
    registry: Arc<Mutex<R>>,
    policy: Arc<FetchPolicy>,
    health: Arc<HealthPolicy>,
    classifier: Arc<ScopeClassifier>,
    dedup: Arc<BatchDeduplicator>,
    window: chrono::Duration,
    deadline: tokio::time::Instant,
    ceiling: Duration,
}

impl<R> Orchestrator<R>
where
    R: SourceRegistry + Send + 'static,
{
    pub fn new(
        registry: Arc<Mutex<R>>,
        policy: FetchPolicy,
        health: HealthPolicy,
        classifier: ScopeClassifier,
        batch_ceiling: Duration,
    ) -> Self {
        Self {
            registry,
            policy: Arc::new(policy),
            health: Arc::new(health),
            classifier: Arc::new(classifier),
            batch_ceiling,
        }
    }

    pub fn from_config(registry: Arc<Mutex<R>>, config: &Config) -> Self {
        Self::new(
            registry,
            FetchPolicy::from_config(config),
            HealthPolicy::from_config(&config.health),
            ScopeClassifier::from_config(&config.classifier),
            config.fetch.batch_ceiling(),
        )
    }

    pub fn registry(&self) -> Arc<Mutex<R>> {
        Arc::clone(&self.registry)
    }

    /// Runs one acquisition batch
    ///
    /// Per-source failures are recorded in the report, never returned as
    /// errors. Errors are limited to registry failures and a scope with no
    /// enabled sources.
    pub async fn acquire(&self, request: &AcquireRequest) -> Result<AcquireReport, AcquireError> {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.batch_ceiling;

        let mut sources = {
            let registry = self
                .registry
                .lock()
                .map_err(|_| AcquireError::RegistryPoisoned)?;
            registry.list_enabled_sources(&request.scope)?
        };

        if let Some(ids) = &request.source_ids {
            sources.retain(|s| ids.contains(&s.id));
        }

        if sources.is_empty() {
            return Err(AcquireError::NoSources {
                scope: request.scope.clone(),
            });
        }

        tracing::info!(
            "Acquiring {} sources for scope '{}' (window {}h, ceiling {:?})",
            sources.len(),
            request.scope,
            request.window_hours,
            self.batch_ceiling
        );

        let dedup = Arc::new(BatchDeduplicator::new());
        let window = chrono::Duration::hours(i64::from(request.window_hours));

        let mut spawned = Vec::with_capacity(sources.len());
        for source in sources {
            let task = SourceTask {
                registry: Arc::clone(&self.registry),
                policy: Arc::clone(&self.policy),
                health: Arc::clone(&self.health),
                classifier: Arc::clone(&self.classifier),
                dedup: Arc::clone(&dedup),
                window,
                deadline,
                ceiling: self.batch_ceiling,
            };
            let fallback = source.clone();
            spawned.push((fallback, tokio::spawn(task.run(source))));
        }

        let (fallbacks, handles): (Vec<Source>, Vec<_>) = spawned.into_iter().unzip();
        let results = join_all(handles).await;

        let mut outcomes = Vec::with_capacity(results.len());
        for (source, result) in fallbacks.into_iter().zip(results) {
            let outcome = match result {
                Ok(outcome) => outcome?,
                Err(join_error) => {
                    tracing::error!("Task for source '{}' aborted: {}", source.name, join_error);
                    let outcome = FetchOutcome::failure(
                        ErrorClass::Unknown,
                        format!("acquisition task aborted: {}", join_error),
                        0,
                    );
                    let transition =
                        record_health(&self.registry, &self.health, &source, &outcome)?;
                    SourceOutcome {
                        source_id: source.id.clone(),
                        source_name: source.name.clone(),
                        url: source.url.clone(),
                        priority: source.priority,
                        outcome,
                        articles: 0,
                        served_by: None,
                        transition,
                    }
                }
            };
            outcomes.push(outcome);
        }

        let report = AcquireReport {
            scope: request.scope.clone(),
            articles: dedup.take_articles(),
            outcomes,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            "Batch for '{}' finished in {:.1}s: {} articles, {}/{} sources succeeded",
            report.scope,
            report.elapsed.as_secs_f64(),
            report.articles.len(),
            report.succeeded(),
            report.outcomes.len()
        );

        Ok(report)
    }

    /// Checks whether a source currently yields parseable content
    ///
    /// Makes a single pass over the candidates and does not touch the
    /// registry.
    pub async fn validate(&self, source: &Source) -> bool {
        let now = Utc::now();
        let result = match source.kind {
            SourceKind::Feed => self
                .policy
                .probe(source, |response| {
                    parse_feed(&response.body)
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                })
                .await
                .map(|r| r.outcome),
            SourceKind::SinglePage => self
                .policy
                .probe(source, |response| {
                    extract_article(
                        &response.text(),
                        &response.final_url,
                        Some(source),
                        &self.classifier,
                        now,
                    )
                    .map(|_| ())
                    .map_err(|e| e.to_string())
                })
                .await
                .map(|r| r.outcome),
        };

        match result {
            Ok(_) => {
                tracing::info!("Source '{}' is valid", source.name);
                true
            }
            Err(outcome) => {
                tracing::warn!(
                    "Source '{}' failed validation: {}",
                    source.name,
                    outcome.error_label().unwrap_or_default()
                );
                false
            }
        }
    }

    /// Fetches and extracts one page that no registered source owns
    ///
    /// The scope comes from keyword classification and the source name from
    /// the page's domain. Retries follow the custom tier's budget; nothing is
    /// recorded in the registry.
    pub async fn fetch_page(&self, url: &str) -> Result<Article, FetchOutcome> {
        let now = Utc::now();
        let name = ::url::Url::parse(url)
            .ok()
            .and_then(|u| extract_domain(&u))
            .unwrap_or_else(|| url.to_string());
        let target = Source::new(
            name,
            url,
            SourceKind::SinglePage,
            SourcePriority::Custom,
            FALLBACK_SCOPE,
        );

        let retrieved = self
            .policy
            .retrieve(&target, |response| {
                extract_article(
                    &response.text(),
                    &response.final_url,
                    None,
                    &self.classifier,
                    now,
                )
                .map_err(|e| e.to_string())
            })
            .await?;

        tracing::info!("Extracted '{}' from {}", retrieved.value.title, retrieved.url);
        Ok(retrieved.value)
    }
}

impl<R> SourceTask<R>
where
    R: SourceRegistry + Send + 'static,
{
    async fn run(self, source: Source) -> Result<SourceOutcome, AcquireError> {
        let now = Utc::now();
        let attempts = AtomicU32::new(0);

        let fetched = tokio::time::timeout_at(
            self.deadline,
            self.fetch_articles(&source, &attempts, now),
        )
        .await;

        let (outcome, articles, served_by) = match fetched {
            Ok(Ok((articles, outcome, served_by))) => (outcome, articles, Some(served_by)),
            Ok(Err(outcome)) => (outcome, Vec::new(), None),
            Err(_) => {
                let message = format!(
                    "Batch ceiling of {}s reached before the source settled",
                    self.ceiling.as_secs()
                );
                (
                    FetchOutcome::failure(
                        ErrorClass::Timeout,
                        message,
                        attempts.load(Ordering::Relaxed),
                    ),
                    Vec::new(),
                    None,
                )
            }
        };

        let accepted = self.dedup.offer(articles);
        let transition = record_health(&self.registry, &self.health, &source, &outcome)?;

        match outcome.error_label() {
            None => tracing::info!(
                "Source '{}': {} new articles ({} attempts)",
                source.name,
                accepted,
                outcome.attempts
            ),
            Some(label) => tracing::warn!(
                "Source '{}' failed after {} attempts: {}",
                source.name,
                outcome.attempts,
                label
            ),
        }

        Ok(SourceOutcome {
            source_id: source.id.clone(),
            source_name: source.name.clone(),
            url: source.url.clone(),
            priority: source.priority,
            outcome,
            articles: accepted,
            served_by,
            transition,
        })
    }

    /// Retrieves and normalizes one source according to its kind
    async fn fetch_articles(
        &self,
        source: &Source,
        attempts: &AtomicU32,
        now: DateTime<Utc>,
    ) -> Result<(Vec<Article>, FetchOutcome, String), FetchOutcome> {
        let (mut articles, outcome, served_by) = match source.kind {
            SourceKind::Feed => {
                let retrieved = self
                    .policy
                    .retrieve_counted(source, attempts, |response| {
                        parse_feed(&response.body).map_err(|e| e.to_string())
                    })
                    .await?;
                let articles = normalize_feed(retrieved.value, source, self.window, now);
                (articles, retrieved.outcome, retrieved.url)
            }
            SourceKind::SinglePage => {
                let retrieved = self
                    .policy
                    .retrieve_counted(source, attempts, |response| {
                        extract_article(
                            &response.text(),
                            &response.final_url,
                            Some(source),
                            &self.classifier,
                            now,
                        )
                        .map_err(|e| e.to_string())
                    })
                    .await?;
                let article = retrieved.value;
                let articles = if article.published_at >= recency_cutoff(now, self.window) {
                    vec![article]
                } else {
                    Vec::new()
                };
                (articles, retrieved.outcome, retrieved.url)
            }
        };

        let served_by = served_by.to_string();
        if served_by != source.url {
            for article in &mut articles {
                article
                    .metadata
                    .insert("served_by".to_string(), Value::String(served_by.clone()));
            }
        }

        Ok((articles, outcome, served_by))
    }
}

/// Applies an outcome to the registry's copy of a source
///
/// Read, apply and write happen under one registry lock so concurrent
/// updates to the same source cannot interleave.
fn record_health<R: SourceRegistry>(
    registry: &Mutex<R>,
    health: &HealthPolicy,
    source: &Source,
    outcome: &FetchOutcome,
) -> Result<HealthTransition, AcquireError> {
    let mut registry = registry.lock().map_err(|_| AcquireError::RegistryPoisoned)?;

    let mut current = registry
        .get_source(&source.id)?
        .unwrap_or_else(|| source.clone());
    let transition = health.apply(&mut current, outcome, Utc::now());
    registry.upsert_source(&current)?;

    if let HealthTransition::Disabled { reason } = transition {
        tracing::warn!(
            "Disabled source '{}' ({}): {} after {} consecutive failures",
            current.name,
            current.url,
            reason,
            current.error_count
        );
    }

    Ok(transition)
}
