//! Configuration module for NewsGap Acquire
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use newsgap_acquire::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("acquire.toml")).unwrap();
//! println!("Circuit breaker threshold: {}", config.health.failure_threshold);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ClassifierRule, Config, FetchConfig, HealthConfig, MirrorConfig, ProxyConfig, SourceEntry,
    StorageConfig, TimeoutConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
