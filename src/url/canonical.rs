use crate::UrlError;
use url::Url;

/// Query parameters that only carry tracking state and never change content
const TRACKING_PARAMS: &[&str] = &[
    "fbclid",
    "gclid",
    "mc_eid",
    "spm",
    "from",
    "share_token",
    "ref",
];

/// Canonicalizes an article URL so the same item from different sources
/// collapses to one key
///
/// # Canonicalization Steps
///
/// 1. Parse the URL; reject non-HTTP(S) schemes and missing hosts
/// 2. Lowercase the host and remove a `www.` prefix
/// 3. Collapse repeated slashes and remove a trailing slash (except root)
/// 4. Remove the fragment
/// 5. Remove tracking query parameters (`utm_*`, `fbclid`, `spm`, ...)
/// 6. Sort the remaining query parameters, dropping an empty query
///
/// The scheme is kept as-is: mirrors frequently serve plain HTTP and the
/// same item is not assumed to exist over HTTPS.
///
/// # Examples
///
/// ```
/// use newsgap_acquire::url::canonicalize_url;
///
/// let url = canonicalize_url("https://WWW.Example.com/post/?utm_source=rss#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/post");
/// ```
pub fn canonicalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = url
        .host_str()
        .map(|h| h.to_lowercase())
        .ok_or(UrlError::MissingHost)?;
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    let path = normalize_path(url.path());
    url.set_path(&path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Collapses empty segments and strips a trailing slash
///
/// Dot segments are already resolved by the parser.
fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return "/".to_string();
    }
    format!("/{}", segments.join("/"))
}

fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}
