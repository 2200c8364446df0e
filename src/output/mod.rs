//! Output module for batch reports and registry statistics
//!
//! This module handles:
//! - Printing the per-source outcome table of an acquisition batch
//! - Summarizing source health from the registry

mod report;
pub mod stats;

pub use report::{format_outcome, print_report, status_label};
pub use stats::{load_statistics, print_statistics, summarize_sources, FailingSource, HealthStatistics};
