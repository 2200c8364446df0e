//! Resilient fetch policy
//!
//! Wraps the transport with bounded retry passes, mirror failover and failure
//! classification. One pass tries every live candidate URL once, back to
//! back; passes are separated by exponential backoff.
//!
//! # Failure Handling
//!
//! | Condition | Candidate | Class |
//! |-----------|-----------|-------|
//! | Connect / DNS / TLS error | stays live | Network |
//! | Timeout | stays live | Timeout |
//! | HTTP 5xx | stays live | Protocol |
//! | HTTP 4xx | retired | Protocol |
//! | Body rejected by parser | retired | Parse |
//! | Unclassified | stays live | Unknown |

use crate::config::{Config, FetchConfig, MirrorConfig, TimeoutConfig};
use crate::fetch::transport::{Transport, TransportError, TransportResponse};
use crate::model::{ErrorClass, FetchOutcome, Source};
use crate::url::resolve_candidates;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use reqwest::header::HeaderMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Content accepted by the caller's parser, with the URL that produced it
#[derive(Debug)]
pub struct Retrieved<T> {
    pub value: T,

    /// Candidate URL that served the content
    pub url: Url,

    pub outcome: FetchOutcome,
}

/// Retry, failover and timeout policy for acquiring one source
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    transport: Transport,
    mirrors: MirrorConfig,
    timeouts: TimeoutConfig,
    extra_passes: u32,
    base_delay: Duration,
    max_delay: Duration,
}

/// Last failure seen on a candidate
struct Failure {
    class: ErrorClass,
    message: String,
}

impl FetchPolicy {
    pub fn new(transport: Transport, mirrors: MirrorConfig, fetch: &FetchConfig) -> Self {
        Self {
            transport,
            mirrors,
            timeouts: fetch.timeouts.clone(),
            extra_passes: fetch.extra_passes,
            base_delay: Duration::from_millis(fetch.base_delay_ms),
            max_delay: Duration::from_millis(fetch.max_delay_ms),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let transport = Transport::new(&config.fetch, &config.proxy);
        Self::new(transport, config.mirrors.clone(), &config.fetch)
    }

    /// Timeout budget for a source's tier
    pub fn timeout_for(&self, source: &Source) -> Duration {
        self.timeouts.for_priority(source.priority)
    }

    /// Retrieves a source, returning the first candidate response `parse` accepts
    ///
    /// `parse` receives the raw response, final URL included. Returning `Err`
    /// marks the body as structurally invalid, which retires that candidate.
    pub async fn retrieve<T, F>(&self, source: &Source, parse: F) -> Result<Retrieved<T>, FetchOutcome>
    where
        F: Fn(&TransportResponse) -> Result<T, String>,
    {
        self.run(source, self.extra_passes, &AtomicU32::new(0), parse)
            .await
    }

    /// Same as [`retrieve`](Self::retrieve), counting requests into `attempts`
    ///
    /// The counter stays readable when the returned future is dropped before
    /// completion, e.g. by an outer deadline.
    pub async fn retrieve_counted<T, F>(
        &self,
        source: &Source,
        attempts: &AtomicU32,
        parse: F,
    ) -> Result<Retrieved<T>, FetchOutcome>
    where
        F: Fn(&TransportResponse) -> Result<T, String>,
    {
        self.run(source, self.extra_passes, attempts, parse).await
    }

    /// Single-pass variant used to check that a source is reachable
    pub async fn probe<T, F>(&self, source: &Source, parse: F) -> Result<Retrieved<T>, FetchOutcome>
    where
        F: Fn(&TransportResponse) -> Result<T, String>,
    {
        self.run(source, 0, &AtomicU32::new(0), parse).await
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.base_delay,
            initial_interval: self.base_delay,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: self.max_delay,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    async fn run<T, F>(
        &self,
        source: &Source,
        extra_passes: u32,
        counter: &AtomicU32,
        parse: F,
    ) -> Result<Retrieved<T>, FetchOutcome>
    where
        F: Fn(&TransportResponse) -> Result<T, String>,
    {
        let timeout = self.timeout_for(source);

        let candidates = resolve_candidates(&source.url, &self.mirrors).map_err(|e| {
            FetchOutcome::failure(ErrorClass::Unknown, format!("Invalid source URL: {}", e), 0)
        })?;

        let mut live = vec![true; candidates.len()];
        let mut backoff = self.backoff();
        let mut attempts = 0u32;
        let mut pass_failures: Vec<Failure> = Vec::new();

        for pass in 0..=extra_passes {
            if pass > 0 {
                if !live.iter().any(|l| *l) {
                    break;
                }
                let delay = backoff.next_backoff().unwrap_or(self.max_delay);
                debug!(
                    "Source '{}' pass {} failed, retrying in {:?}",
                    source.name, pass, delay
                );
                tokio::time::sleep(delay).await;
            }

            pass_failures.clear();

            for (idx, candidate) in candidates.iter().enumerate() {
                if !live[idx] {
                    continue;
                }

                attempts += 1;
                counter.fetch_add(1, Ordering::Relaxed);
                debug!("Fetching {} (attempt {}, timeout {:?})", candidate, attempts, timeout);

                let failure = match self
                    .transport
                    .get(candidate, &HeaderMap::new(), timeout)
                    .await
                {
                    Ok(response) => match parse(&response) {
                        Ok(value) => {
                            return Ok(Retrieved {
                                value,
                                url: candidate.clone(),
                                outcome: FetchOutcome::success(attempts),
                            });
                        }
                        Err(message) => {
                            live[idx] = false;
                            Failure {
                                class: ErrorClass::Parse,
                                message: format!("{}: {}", candidate, message),
                            }
                        }
                    },
                    Err(err) => {
                        if !err.is_retryable() {
                            live[idx] = false;
                        }
                        failure_from_transport(candidate, &err)
                    }
                };

                warn!("Candidate {} failed: [{}] {}", candidate, failure.class, failure.message);
                pass_failures.push(failure);
            }
        }

        let exhausted = live.iter().any(|l| *l);
        let outcome = terminal_outcome(&pass_failures, attempts)
            .with_exhausted(exhausted)
            .with_disable_recommendation(exhausted && source.priority.is_high_risk());

        Err(outcome)
    }
}

fn failure_from_transport(candidate: &Url, err: &TransportError) -> Failure {
    Failure {
        class: err.class(),
        message: format!("{}: {}", candidate, err),
    }
}

/// Builds the failure outcome from the last pass that ran
///
/// A pass whose candidates failed for different reasons is reported as
/// `RetryExhausted`.
fn terminal_outcome(last_pass: &[Failure], attempts: u32) -> FetchOutcome {
    let Some(last) = last_pass.last() else {
        return FetchOutcome::failure(ErrorClass::Unknown, "no candidate URL was tried", attempts);
    };

    let mixed = last_pass.iter().any(|f| f.class != last.class);
    let class = if mixed {
        ErrorClass::RetryExhausted
    } else {
        last.class
    };

    FetchOutcome::failure(class, last.message.clone(), attempts)
}
