//! Core data model
//!
//! - `Source`: a configured feed or page endpoint plus its health counters
//! - `Article`: one normalized content item
//! - `FetchOutcome`: the ephemeral result of one source's acquisition attempt

mod article;
mod outcome;
mod source;

pub use article::Article;
pub use outcome::{ErrorClass, FetchOutcome};
pub use source::{Source, SourceKind, SourcePriority};

use std::collections::BTreeMap;

/// Free-form, operator-facing key/value data attached to sources and articles
///
/// Business logic never reads from this map; anything the pipeline decides on
/// lives in a typed field.
pub type Metadata = BTreeMap<String, serde_json::Value>;
