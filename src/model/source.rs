use crate::model::Metadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a source's content is retrieved and turned into articles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// RSS / Atom / JSON feed with many entries
    Feed,

    /// A single web page yielding exactly one article
    SinglePage,
}

impl SourceKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Feed => "feed",
            Self::SinglePage => "single-page",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "feed" => Some(Self::Feed),
            "single-page" => Some(Self::SinglePage),
            _ => None,
        }
    }
}

/// Reliability tier of a source
///
/// Higher-risk tiers get larger timeout budgets and may be quarantined early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourcePriority {
    /// Publisher's own feed, the most stable
    Official,

    /// Aggregator mirror route known to be stable
    StableMirror,

    /// Aggregator mirror route that is frequently blocked or slow
    HighRiskMirror,

    /// Custom crawler target
    Custom,
}

impl SourcePriority {
    /// Returns true for tiers whose targets are inherently unreliable
    pub fn is_high_risk(&self) -> bool {
        matches!(self, Self::HighRiskMirror)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Official => "official",
            Self::StableMirror => "stable-mirror",
            Self::HighRiskMirror => "high-risk-mirror",
            Self::Custom => "custom",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "official" => Some(Self::Official),
            "stable-mirror" => Some(Self::StableMirror),
            "high-risk-mirror" => Some(Self::HighRiskMirror),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    /// Returns all tiers in fetch-priority order
    pub fn all() -> [Self; 4] {
        [
            Self::Official,
            Self::StableMirror,
            Self::HighRiskMirror,
            Self::Custom,
        ]
    }
}

impl fmt::Display for SourcePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// A configured content endpoint
///
/// A source is addressed by its URL; (URL, scope) is unique across the
/// registry. The health fields (`last_fetched_at`, `last_error`,
/// `error_count`, `enabled`) are only mutated through
/// [`HealthPolicy::apply`](crate::state::HealthPolicy::apply).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub name: String,
    pub url: String,
    pub kind: SourceKind,
    pub priority: SourcePriority,

    /// Logical grouping (e.g. an industry) used to select sources for a batch
    pub scope: String,

    pub enabled: bool,

    /// Suggested hours between fetches; advisory only
    pub fetch_interval_hours: u32,

    pub last_fetched_at: Option<DateTime<Utc>>,

    /// Most recent failure as `[class] message`
    pub last_error: Option<String>,

    /// Consecutive failed acquisitions since the last success
    pub error_count: u32,

    pub created_at: DateTime<Utc>,

    pub metadata: Metadata,
}

impl Source {
    /// Creates an enabled source with a fresh id and clean health counters
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        kind: SourceKind,
        priority: SourcePriority,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            url: url.into(),
            kind,
            priority,
            scope: scope.into(),
            enabled: true,
            fetch_interval_hours: 24,
            last_fetched_at: None,
            last_error: None,
            error_count: 0,
            created_at: Utc::now(),
            metadata: Metadata::new(),
        }
    }
}
