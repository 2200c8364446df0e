//! Batch acquisition across sources
//!
//! The orchestrator fans out one task per enabled source, merges their
//! articles through the batch deduplicator and reports per-source outcomes.

mod dedup;
mod orchestrator;

pub use dedup::BatchDeduplicator;
pub use orchestrator::{AcquireReport, AcquireRequest, BatchStatus, Orchestrator, SourceOutcome};
