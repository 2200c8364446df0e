//! URL handling for NewsGap Acquire
//!
//! Canonicalization of article URLs (the dedup and persistence key) and
//! candidate resolution for aggregator mirrors.

mod canonical;
mod mirror;

pub use canonical::canonicalize_url;
pub use mirror::resolve_candidates;

use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use newsgap_acquire::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}
