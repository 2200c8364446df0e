//! NewsGap Acquire main entry point
//!
//! This is the command-line interface for the multi-source content acquirer.

use anyhow::{bail, Context};
use clap::Parser;
use newsgap_acquire::config::{load_config_with_hash, Config};
use newsgap_acquire::output::{load_statistics, print_report, print_statistics};
use newsgap_acquire::storage::{open_storage, sync_sources, ArticleStore, SourceRegistry, SqliteStorage};
use newsgap_acquire::{AcquireRequest, BatchStatus, Orchestrator, Source};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// NewsGap Acquire: resilient multi-source content acquisition
///
/// Fetches recent articles from the configured feeds and pages, fails over
/// between aggregator mirrors, and disables sources that keep failing.
#[derive(Parser, Debug)]
#[command(name = "newsgap-acquire")]
#[command(version = "1.0.0")]
#[command(about = "Resilient multi-source content acquisition", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Scope to acquire; every configured scope when omitted
    #[arg(long)]
    scope: Option<String>,

    /// Recency window in hours
    #[arg(long, default_value_t = 24)]
    hours: u32,

    /// Restrict the batch to a source, by id or name (repeatable)
    #[arg(long = "source", value_name = "SOURCE")]
    sources: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be acquired without fetching
    #[arg(long, conflicts_with_all = ["stats", "validate_sources"])]
    dry_run: bool,

    /// Show source health statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "validate_sources"])]
    stats: bool,

    /// Probe every selected source once without recording health
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    validate_sources: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        handle_dry_run(&config, &cli);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.validate_sources {
        handle_validate(config, &cli).await?;
    } else {
        handle_acquire(config, &cli).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("newsgap_acquire=info,warn"),
            1 => EnvFilter::new("newsgap_acquire=debug,info"),
            2 => EnvFilter::new("newsgap_acquire=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Scopes selected on the command line, or every configured scope
fn selected_scopes(config: &Config, cli: &Cli) -> Vec<String> {
    match &cli.scope {
        Some(scope) => vec![scope.clone()],
        None => config
            .sources
            .iter()
            .map(|s| s.scope.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    }
}

/// Opens the registry and registers configured sources it does not know yet
fn open_registry(config: &Config) -> anyhow::Result<SqliteStorage> {
    let mut storage = open_storage(Path::new(&config.storage.database_path))
        .with_context(|| format!("Failed to open database {}", config.storage.database_path))?;
    let summary = sync_sources(&mut storage, &config.sources)?;
    tracing::info!(
        "Source registry synced: {} new, {} existing",
        summary.inserted,
        summary.existing
    );
    Ok(storage)
}

/// Whether a source matches a `--source` selection by id or name
///
/// No selections means every source is selected.
fn is_selected(selections: &[String], id: Option<&str>, name: &str) -> bool {
    selections.is_empty()
        || selections
            .iter()
            .any(|sel| sel == name || Some(sel.as_str()) == id)
}

/// Ids of the `--source` selections among the scope's enabled sources
fn resolve_source_ids(enabled: &[Source], selections: &[String]) -> Vec<String> {
    enabled
        .iter()
        .filter(|s| is_selected(selections, Some(&s.id), &s.name))
        .map(|s| s.id.clone())
        .collect()
}

/// Handles the --dry-run mode: validates config and shows what would be acquired
fn handle_dry_run(config: &Config, cli: &Cli) {
    println!("=== NewsGap Acquire Dry Run ===\n");

    println!("Fetch Configuration:");
    println!("  User agent: {}", config.fetch.user_agent);
    println!("  Extra passes: {}", config.fetch.extra_passes);
    println!(
        "  Backoff: {}ms doubling to {}ms",
        config.fetch.base_delay_ms, config.fetch.max_delay_ms
    );
    println!("  Batch ceiling: {}s", config.fetch.batch_ceiling_secs);
    println!("  Verify TLS: {}", config.fetch.verify_tls);

    if !config.proxy.is_empty() {
        println!("\nProxy:");
        for (name, value) in [
            ("http", &config.proxy.http),
            ("https", &config.proxy.https),
            ("socks5", &config.proxy.socks5),
        ] {
            if let Some(value) = value {
                println!("  {}: {}", name, value);
            }
        }
    }

    println!("\nMirrors:");
    println!(
        "  Instance: {}",
        config.mirrors.instance.as_deref().unwrap_or("(none)")
    );
    println!("  Known hosts: {}", config.mirrors.known_hosts.join(", "));
    println!("  Fallbacks: {}", config.mirrors.fallbacks.len());

    println!("\nHealth:");
    println!("  Failure threshold: {}", config.health.failure_threshold);
    for (tier, threshold) in &config.health.tier_thresholds {
        println!("    {}: {}", tier, threshold);
    }

    println!("\nDatabase: {}", config.storage.database_path);

    // Ids only exist once a source is registered; read them without creating a database
    let database = Path::new(&config.storage.database_path);
    let registry = if database.exists() {
        open_storage(database).ok()
    } else {
        None
    };
    let registered_id = |url: &str, scope: &str| {
        registry
            .as_ref()
            .and_then(|r| r.find_source(url, scope).ok().flatten())
            .map(|s| s.id)
    };

    let scopes = selected_scopes(config, cli);
    for scope in &scopes {
        let sources: Vec<_> = config
            .sources
            .iter()
            .filter(|s| &s.scope == scope && s.enabled)
            .filter(|s| {
                let id = registered_id(&s.url, &s.scope);
                is_selected(&cli.sources, id.as_deref(), &s.name)
            })
            .collect();
        println!("\nScope '{}' ({} sources):", scope, sources.len());
        for source in sources {
            println!("  - {} [{}] {}", source.name, source.priority, source.url);
        }
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would acquire {} scope(s) with a {}h window", scopes.len(), cli.hours);
}

/// Handles the --stats mode: shows source health from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let storage = open_storage(Path::new(&config.storage.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --validate-sources mode: probes sources without recording health
async fn handle_validate(config: Config, cli: &Cli) -> anyhow::Result<()> {
    let registry = Arc::new(Mutex::new(open_registry(&config)?));
    let orchestrator = Orchestrator::from_config(Arc::clone(&registry), &config);

    let mut failed = 0;
    for scope in selected_scopes(&config, cli) {
        let mut sources = registry
            .lock()
            .map_err(|_| anyhow::anyhow!("source registry lock poisoned"))?
            .list_enabled_sources(&scope)?;
        if !cli.sources.is_empty() {
            let ids = resolve_source_ids(&sources, &cli.sources);
            sources.retain(|s| ids.contains(&s.id));
        }

        println!("Scope '{}':", scope);
        for source in &sources {
            let valid = orchestrator.validate(source).await;
            if !valid {
                failed += 1;
            }
            println!("  {} {}", if valid { "✓" } else { "✗" }, source.name);
        }
    }

    if failed > 0 {
        bail!("{} source(s) failed validation", failed);
    }
    Ok(())
}

/// Handles the main acquisition: sync, acquire every scope, store articles
async fn handle_acquire(config: Config, cli: &Cli) -> anyhow::Result<()> {
    let registry = Arc::new(Mutex::new(open_registry(&config)?));
    let orchestrator = Orchestrator::from_config(Arc::clone(&registry), &config);

    let mut stored = 0;
    let mut empty_batches = 0;
    let scopes = selected_scopes(&config, cli);

    for scope in &scopes {
        let mut request = AcquireRequest::new(scope.clone(), cli.hours);
        if !cli.sources.is_empty() {
            let enabled = registry
                .lock()
                .map_err(|_| anyhow::anyhow!("source registry lock poisoned"))?
                .list_enabled_sources(scope)?;
            request = request.with_sources(resolve_source_ids(&enabled, &cli.sources));
        }

        let report = match orchestrator.acquire(&request).await {
            Ok(report) => report,
            Err(newsgap_acquire::AcquireError::NoSources { scope }) => {
                tracing::warn!("No enabled sources for scope '{}', skipping", scope);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        {
            let mut storage = registry
                .lock()
                .map_err(|_| anyhow::anyhow!("source registry lock poisoned"))?;
            for article in &report.articles {
                storage.upsert_article(article)?;
                stored += 1;
            }
        }

        if report.status() == BatchStatus::NoContent {
            empty_batches += 1;
        }
        print_report(&report);
        println!();
    }

    tracing::info!("Stored {} articles across {} scope(s)", stored, scopes.len());

    if !scopes.is_empty() && empty_batches == scopes.len() {
        bail!("Every source failed; no content was acquired");
    }
    Ok(())
}
