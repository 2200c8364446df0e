//! NewsGap Acquire: resilient multi-source content acquisition
//!
//! This crate fetches articles from syndication feeds and single-page web
//! sources, fails over between aggregator mirrors, normalizes everything into
//! a common [`Article`] shape, and feeds per-source health back into the
//! source registry so chronically failing sources get disabled.

pub mod acquire;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod model;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for acquisition operations
///
/// Per-source failures never surface through this type; they are recorded in
/// the batch report as [`FetchOutcome`] values instead.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("No enabled sources for scope '{scope}'")]
    NoSources { scope: String },

    #[error("Source registry lock poisoned")]
    RegistryPoisoned,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Duplicate source '{url}' in scope '{scope}'")]
    DuplicateSource { url: String, scope: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for acquisition operations
pub type Result<T> = std::result::Result<T, AcquireError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use acquire::{AcquireReport, AcquireRequest, BatchStatus, Orchestrator, SourceOutcome};
pub use config::Config;
pub use model::{Article, ErrorClass, FetchOutcome, Source, SourceKind, SourcePriority};
pub use state::{HealthPolicy, HealthTransition};
pub use url::{canonicalize_url, resolve_candidates};
