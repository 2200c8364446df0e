use crate::config::HealthConfig;
use crate::model::{FetchOutcome, Source, SourcePriority};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

/// Why a source was disabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisableReason {
    /// Consecutive failures reached the tier's threshold
    CircuitBreaker,

    /// The fetch outcome recommended disabling (high-risk mirror exhausted)
    Recommended,
}

impl fmt::Display for DisableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircuitBreaker => f.write_str("circuit breaker"),
            Self::Recommended => f.write_str("disable recommended"),
        }
    }
}

/// Health change produced by applying one outcome to a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    /// Success; counters reset
    Healthy,

    /// Failure below the disable threshold
    Degraded { error_count: u32 },

    /// This outcome disabled the source
    Disabled { reason: DisableReason },

    /// The source was already disabled; counters updated, still disabled
    StillDisabled,
}

/// Circuit-breaker policy for source health
///
/// # State Transitions
///
/// ```text
/// Healthy ──failure──> Degraded(n) ──failure, n+1 >= threshold──> Disabled
///    ^                     │
///    └──────success────────┘
/// ```
///
/// Disabled is terminal: nothing in this crate re-enables a source.
#[derive(Debug, Clone)]
pub struct HealthPolicy {
    failure_threshold: u32,
    tier_thresholds: HashMap<SourcePriority, u32>,
    honor_disable_recommendation: bool,
}

impl HealthPolicy {
    pub fn from_config(config: &HealthConfig) -> Self {
        let tier_thresholds = SourcePriority::all()
            .into_iter()
            .filter_map(|p| {
                config
                    .tier_thresholds
                    .get(p.to_db_string())
                    .map(|threshold| (p, *threshold))
            })
            .collect();

        Self {
            failure_threshold: config.failure_threshold,
            tier_thresholds,
            honor_disable_recommendation: config.honor_disable_recommendation,
        }
    }

    /// Consecutive failures that disable a source of this tier
    pub fn threshold_for(&self, priority: SourcePriority) -> u32 {
        self.tier_thresholds
            .get(&priority)
            .copied()
            .unwrap_or(self.failure_threshold)
    }

    /// Applies an outcome to the source's health fields
    ///
    /// On success the error counter and last error are cleared and
    /// `last_fetched_at` is set to `now`. On failure the counter is
    /// incremented and `last_error` records `[class] message`.
    pub fn apply(
        &self,
        source: &mut Source,
        outcome: &FetchOutcome,
        now: DateTime<Utc>,
    ) -> HealthTransition {
        let was_enabled = source.enabled;

        if outcome.success {
            source.error_count = 0;
            source.last_error = None;
            source.last_fetched_at = Some(now);
            return if was_enabled {
                HealthTransition::Healthy
            } else {
                HealthTransition::StillDisabled
            };
        }

        source.error_count = source.error_count.saturating_add(1);
        source.last_error = outcome.error_label();

        if !was_enabled {
            return HealthTransition::StillDisabled;
        }

        if source.error_count >= self.threshold_for(source.priority) {
            source.enabled = false;
            return HealthTransition::Disabled {
                reason: DisableReason::CircuitBreaker,
            };
        }

        if outcome.disable_recommended && self.honor_disable_recommendation {
            source.enabled = false;
            return HealthTransition::Disabled {
                reason: DisableReason::Recommended,
            };
        }

        HealthTransition::Degraded {
            error_count: source.error_count,
        }
    }
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self::from_config(&HealthConfig::default())
    }
}
