use crate::model::{SourceKind, SourcePriority};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Main configuration structure for NewsGap Acquire
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub mirrors: MirrorConfig,
    #[serde(default)]
    pub health: HealthConfig,
    pub storage: StorageConfig,
    #[serde(default, rename = "classifier")]
    pub classifier: Vec<ClassifierRule>,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceEntry>,
}

/// Retrieval behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Validate TLS certificates; off by default so self-signed mirrors work
    #[serde(rename = "verify-tls")]
    pub verify_tls: bool,

    /// Maximum redirect hops followed per request
    #[serde(rename = "max-redirects")]
    pub max_redirects: usize,

    /// Passes over the candidate list after the first one
    #[serde(rename = "extra-passes")]
    pub extra_passes: u32,

    /// Backoff before the second pass (milliseconds)
    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,

    /// Upper bound for any backoff delay (milliseconds)
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// Wall-clock ceiling for one whole batch (seconds)
    #[serde(rename = "batch-ceiling-secs")]
    pub batch_ceiling_secs: u64,

    pub timeouts: TimeoutConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "NewsGap/0.1.0 (Information Intelligence Tool)".to_string(),
            verify_tls: false,
            max_redirects: 10,
            extra_passes: 2,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            batch_ceiling_secs: 120,
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl FetchConfig {
    pub fn batch_ceiling(&self) -> Duration {
        Duration::from_secs(self.batch_ceiling_secs)
    }
}

/// Per-tier request timeout budgets (seconds)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub official: u64,
    #[serde(rename = "stable-mirror")]
    pub stable_mirror: u64,
    #[serde(rename = "high-risk-mirror")]
    pub high_risk_mirror: u64,
    pub custom: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            official: 15,
            stable_mirror: 20,
            high_risk_mirror: 30,
            custom: 30,
        }
    }
}

impl TimeoutConfig {
    /// Returns the timeout budget for a priority tier
    pub fn for_priority(&self, priority: SourcePriority) -> Duration {
        let secs = match priority {
            SourcePriority::Official => self.official,
            SourcePriority::StableMirror => self.stable_mirror,
            SourcePriority::HighRiskMirror => self.high_risk_mirror,
            SourcePriority::Custom => self.custom,
        };
        Duration::from_secs(secs)
    }
}

/// Forward proxies, chosen per request by URL scheme
///
/// The core never consults `HTTP_PROXY` and friends; only what is set here
/// is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProxyConfig {
    pub http: Option<String>,
    pub https: Option<String>,
    pub socks5: Option<String>,
}

impl ProxyConfig {
    pub fn is_empty(&self) -> bool {
        self.http.is_none() && self.https.is_none() && self.socks5.is_none()
    }
}

/// Aggregator mirror configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Preferred instance tried right after the original URL
    pub instance: Option<String>,

    /// Hosts (`host` or `host:port`) recognized as aggregator mirrors
    #[serde(rename = "known-hosts")]
    pub known_hosts: Vec<String>,

    /// Fallback mirror base URLs in priority order
    pub fallbacks: Vec<String>,
}

/// Source health policy configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Consecutive failures that trip the circuit breaker
    #[serde(rename = "failure-threshold")]
    pub failure_threshold: u32,

    /// Per-tier overrides of `failure-threshold`, keyed by tier name
    /// (`official`, `stable-mirror`, `high-risk-mirror`, `custom`)
    #[serde(rename = "tier-thresholds")]
    pub tier_thresholds: HashMap<String, u32>,

    /// Disable immediately when a fetch outcome recommends it
    #[serde(rename = "honor-disable-recommendation")]
    pub honor_disable_recommendation: bool,
}

impl HealthConfig {
    /// Returns the circuit-breaker threshold that applies to a tier
    pub fn threshold_for(&self, priority: SourcePriority) -> u32 {
        self.tier_thresholds
            .get(priority.to_db_string())
            .copied()
            .unwrap_or(self.failure_threshold)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            tier_thresholds: HashMap::new(),
            honor_disable_recommendation: true,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Keyword rule used to guess a scope for pages without an owning source
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierRule {
    pub scope: String,
    pub keywords: Vec<String>,
}

/// A source declared in the configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    pub name: String,
    pub url: String,
    #[serde(default = "default_kind")]
    pub kind: SourceKind,
    #[serde(default = "default_priority")]
    pub priority: SourcePriority,
    pub scope: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(rename = "fetch-interval-hours", default = "default_interval")]
    pub fetch_interval_hours: u32,
}

fn default_kind() -> SourceKind {
    SourceKind::Feed
}

fn default_priority() -> SourcePriority {
    SourcePriority::StableMirror
}

fn default_enabled() -> bool {
    true
}

fn default_interval() -> u32 {
    24
}
