use serde::Serialize;
use std::fmt;

/// Classification of an acquisition failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// DNS, connect or TLS failure
    Network,

    /// Request exceeded its timeout budget, or the batch ceiling
    Timeout,

    /// Non-2xx HTTP status
    Protocol,

    /// Content retrieved but structurally invalid
    Parse,

    /// Every candidate failed across all passes with mixed causes
    RetryExhausted,

    /// Anything the transport could not classify
    Unknown,
}

impl ErrorClass {
    /// Short tag used in `Source::last_error`
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Protocol => "protocol",
            Self::Parse => "parse",
            Self::RetryExhausted => "retry_exhausted",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Result of one source's acquisition attempt
///
/// Never persisted; consumed by health feedback and the batch report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchOutcome {
    pub success: bool,

    /// `None` on success
    pub error_class: Option<ErrorClass>,

    pub message: Option<String>,

    /// Set when the source should be disabled without waiting for the
    /// circuit breaker
    pub disable_recommended: bool,

    /// Number of transport requests issued
    pub attempts: u32,

    /// True when the pass budget ran out while a retryable candidate remained
    pub exhausted: bool,
}

impl FetchOutcome {
    /// A successful outcome after `attempts` requests
    pub fn success(attempts: u32) -> Self {
        Self {
            success: true,
            error_class: None,
            message: None,
            disable_recommended: false,
            attempts,
            exhausted: false,
        }
    }

    /// A failed outcome with no disable recommendation
    pub fn failure(class: ErrorClass, message: impl Into<String>, attempts: u32) -> Self {
        Self {
            success: false,
            error_class: Some(class),
            message: Some(message.into()),
            disable_recommended: false,
            attempts,
            exhausted: false,
        }
    }

    /// Marks this outcome as having used up the full pass budget
    pub fn with_exhausted(mut self, exhausted: bool) -> Self {
        self.exhausted = exhausted;
        self
    }

    pub fn with_disable_recommendation(mut self, recommend: bool) -> Self {
        self.disable_recommended = recommend;
        self
    }

    /// Human-readable error as stored in `Source::last_error`
    ///
    /// Returns None for successful outcomes.
    pub fn error_label(&self) -> Option<String> {
        let class = self.error_class?;
        let message = self.message.as_deref().unwrap_or("unspecified failure");
        Some(format!("[{}] {}", class.tag(), message))
    }
}
