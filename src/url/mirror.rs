use crate::config::MirrorConfig;
use crate::{UrlError, UrlResult};
use url::Url;

/// Produces the ordered candidate URLs for a source URL
///
/// When `url` points at an aggregator mirror (its host matches a known
/// mirror host, the preferred instance or any fallback) the result is the
/// original URL, then the preferred instance, then every fallback, each
/// carrying the original route path and query. Otherwise the original URL is
/// the only candidate.
///
/// Mirror bases may carry a path prefix (`https://host/rsshub`); the route is
/// joined beneath it, and a prefix on the original URL is stripped first.
/// Duplicates are dropped, keeping the first occurrence.
///
/// # Examples
///
/// ```
/// use newsgap_acquire::config::MirrorConfig;
/// use newsgap_acquire::url::resolve_candidates;
///
/// let mirrors = MirrorConfig {
///     instance: None,
///     known_hosts: vec!["rsshub.app".to_string()],
///     fallbacks: vec!["https://rss.shab.fun".to_string()],
/// };
/// let candidates = resolve_candidates("https://rsshub.app/36kr/news?limit=5", &mirrors).unwrap();
/// assert_eq!(candidates.len(), 2);
/// assert_eq!(candidates[1].as_str(), "https://rss.shab.fun/36kr/news?limit=5");
/// ```
pub fn resolve_candidates(url: &str, mirrors: &MirrorConfig) -> UrlResult<Vec<Url>> {
    let original = Url::parse(url).map_err(|e| UrlError::Parse(e.to_string()))?;
    if original.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    let bases = mirror_bases(mirrors)?;

    let matched_base = bases.iter().find(|base| same_authority(base, &original));
    let is_mirror = matched_base.is_some()
        || mirrors
            .known_hosts
            .iter()
            .any(|known| matches_known_host(known, &original));

    if !is_mirror {
        return Ok(vec![original]);
    }

    let route = match matched_base {
        Some(base) => strip_base_path(original.path(), base.path()),
        None => original.path().to_string(),
    };

    let mut candidates = vec![original.clone()];
    for base in &bases {
        let candidate = join_route(base, &route, original.query());
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }

    Ok(candidates)
}

/// Parses the preferred instance and fallbacks, in that order
fn mirror_bases(mirrors: &MirrorConfig) -> UrlResult<Vec<Url>> {
    mirrors
        .instance
        .iter()
        .chain(mirrors.fallbacks.iter())
        .map(|base| Url::parse(base).map_err(|e| UrlError::Parse(format!("{}: {}", base, e))))
        .collect()
}

fn same_authority(a: &Url, b: &Url) -> bool {
    let host = |u: &Url| u.host_str().map(|h| h.to_ascii_lowercase());
    host(a) == host(b) && a.port_or_known_default() == b.port_or_known_default()
}

/// A known host entry without a port matches any port
fn matches_known_host(known: &str, url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let known = known.trim().to_ascii_lowercase();

    match known.rsplit_once(':') {
        Some((known_host, port)) if port.chars().all(|c| c.is_ascii_digit()) => {
            known_host == host.to_ascii_lowercase()
                && url.port_or_known_default().map(|p| p.to_string()).as_deref() == Some(port)
        }
        _ => known == host.to_ascii_lowercase(),
    }
}

fn strip_base_path(path: &str, base_path: &str) -> String {
    let prefix = base_path.trim_end_matches('/');
    if prefix.is_empty() {
        return path.to_string();
    }
    match path.strip_prefix(prefix) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.to_string(),
        _ => path.to_string(),
    }
}

fn join_route(base: &Url, route: &str, query: Option<&str>) -> Url {
    let mut candidate = base.clone();
    let prefix = base.path().trim_end_matches('/');
    let route = route.trim_start_matches('/');
    candidate.set_path(&format!("{}/{}", prefix, route));
    candidate.set_query(query);
    candidate.set_fragment(None);
    candidate
}
