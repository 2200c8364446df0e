use crate::config::types::{
    Config, FetchConfig, HealthConfig, MirrorConfig, ProxyConfig, SourceEntry,
};
use crate::model::SourcePriority;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Upper bound on `extra-passes`; more than this only delays the batch
const MAX_EXTRA_PASSES: u32 = 5;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetch_config(&config.fetch)?;
    validate_proxy_config(&config.proxy)?;
    validate_mirror_config(&config.mirrors)?;
    validate_health_config(&config.health)?;

    if config.storage.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    for rule in &config.classifier {
        if rule.scope.is_empty() || rule.keywords.is_empty() {
            return Err(ConfigError::Validation(format!(
                "classifier rule '{}' needs a scope and at least one keyword",
                rule.scope
            )));
        }
    }

    validate_sources(&config.sources)?;
    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.extra_passes > MAX_EXTRA_PASSES {
        return Err(ConfigError::Validation(format!(
            "extra_passes must be <= {}, got {}",
            MAX_EXTRA_PASSES, config.extra_passes
        )));
    }

    if config.base_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "base_delay_ms ({}) cannot exceed max_delay_ms ({})",
            config.base_delay_ms, config.max_delay_ms
        )));
    }

    if config.batch_ceiling_secs == 0 {
        return Err(ConfigError::Validation(
            "batch_ceiling_secs must be >= 1".to_string(),
        ));
    }

    for priority in SourcePriority::all() {
        if config.timeouts.for_priority(priority).is_zero() {
            return Err(ConfigError::Validation(format!(
                "timeout for tier '{}' must be >= 1s",
                priority
            )));
        }
    }

    Ok(())
}

fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    let entries = [
        ("http", &config.http),
        ("https", &config.https),
        ("socks5", &config.socks5),
    ];

    for (name, value) in entries {
        let Some(value) = value else { continue };
        let url = Url::parse(value).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid {} proxy '{}': {}", name, value, e))
        })?;
        if !matches!(url.scheme(), "http" | "https" | "socks5" | "socks5h") {
            return Err(ConfigError::Validation(format!(
                "Proxy '{}' has unsupported scheme '{}'",
                value,
                url.scheme()
            )));
        }
    }

    Ok(())
}

fn validate_mirror_config(config: &MirrorConfig) -> Result<(), ConfigError> {
    let bases = config.instance.iter().chain(config.fallbacks.iter());
    for base in bases {
        validate_http_url(base, "mirror")?;
    }

    for host in &config.known_hosts {
        if host.is_empty() || host.contains('/') {
            return Err(ConfigError::Validation(format!(
                "known mirror host '{}' must be a bare host or host:port",
                host
            )));
        }
    }

    Ok(())
}

fn validate_health_config(config: &HealthConfig) -> Result<(), ConfigError> {
    if config.failure_threshold < 1 {
        return Err(ConfigError::Validation(format!(
            "failure_threshold must be >= 1, got {}",
            config.failure_threshold
        )));
    }

    for (tier, threshold) in &config.tier_thresholds {
        if SourcePriority::from_db_string(tier).is_none() {
            return Err(ConfigError::Validation(format!(
                "unknown tier '{}' in tier-thresholds",
                tier
            )));
        }
        if *threshold < 1 {
            return Err(ConfigError::Validation(format!(
                "threshold for tier '{}' must be >= 1, got {}",
                tier, threshold
            )));
        }
    }

    Ok(())
}

/// Validates source entries and rejects duplicate (url, scope) pairs
fn validate_sources(sources: &[SourceEntry]) -> Result<(), ConfigError> {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();

    for entry in sources {
        if entry.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{}' must have a name",
                entry.url
            )));
        }

        if entry.scope.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{}' must have a scope",
                entry.name
            )));
        }

        validate_http_url(&entry.url, "source")?;

        if !seen.insert((entry.url.as_str(), entry.scope.as_str())) {
            return Err(ConfigError::DuplicateSource {
                url: entry.url.clone(),
                scope: entry.scope.clone(),
            });
        }
    }

    Ok(())
}

fn validate_http_url(value: &str, what: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} URL '{}': {}", what, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} URL '{}' must use HTTP or HTTPS",
            what, value
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "{} URL '{}' has no host",
            what, value
        )));
    }

    Ok(())
}
