//! Integration tests for batch acquisition
//!
//! These tests use wiremock to serve feeds and pages and run whole batches
//! through the orchestrator against an in-memory registry.

use chrono::{Duration as ChronoDuration, Utc};
use newsgap_acquire::config::{
    Config, FetchConfig, HealthConfig, MirrorConfig, ProxyConfig, SourceEntry, StorageConfig,
};
use newsgap_acquire::storage::{sync_sources, ArticleStore, SourceRegistry, SqliteStorage};
use newsgap_acquire::{
    AcquireError, AcquireRequest, BatchStatus, ErrorClass, HealthTransition, Orchestrator,
    SourceKind, SourcePriority,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with fast backoff
fn create_test_config(sources: Vec<SourceEntry>) -> Config {
    Config {
        fetch: FetchConfig {
            extra_passes: 2,
            base_delay_ms: 10,
            max_delay_ms: 50,
            batch_ceiling_secs: 30,
            ..Default::default()
        },
        proxy: ProxyConfig::default(),
        mirrors: MirrorConfig::default(),
        health: HealthConfig::default(),
        storage: StorageConfig {
            database_path: ":memory:".to_string(),
        },
        classifier: vec![],
        sources,
    }
}

fn feed_source(name: &str, url: String) -> SourceEntry {
    SourceEntry {
        name: name.to_string(),
        url,
        kind: SourceKind::Feed,
        priority: SourcePriority::StableMirror,
        scope: "tech".to_string(),
        enabled: true,
        fetch_interval_hours: 24,
    }
}

/// Builds an RSS document; each item is (link, hours ago)
fn rss(items: &[(&str, i64)]) -> String {
    let now = Utc::now();
    let items: String = items
        .iter()
        .enumerate()
        .map(|(i, (link, hours_ago))| {
            format!(
                "<item><title>Story {}</title><link>{}</link>\
                 <description>Body of story {}</description>\
                 <pubDate>{}</pubDate></item>",
                i,
                link,
                i,
                (now - ChronoDuration::hours(*hours_ago)).to_rfc2822()
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Test Feed</title><link>https://example.com</link>
<description>test</description>{}</channel></rss>"#,
        items
    )
}

async fn mount_feed(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "application/rss+xml"),
        )
        .mount(server)
        .await;
}

/// Syncs the configured sources into a fresh registry and builds an orchestrator
fn setup(config: &Config) -> (Arc<Mutex<SqliteStorage>>, Orchestrator<SqliteStorage>) {
    let mut storage = SqliteStorage::open_in_memory().expect("Failed to open storage");
    sync_sources(&mut storage, &config.sources).expect("Failed to sync sources");
    let registry = Arc::new(Mutex::new(storage));
    let orchestrator = Orchestrator::from_config(Arc::clone(&registry), config);
    (registry, orchestrator)
}

#[tokio::test]
async fn test_full_batch_with_failover_and_failure() {
    let feeds = MockServer::start().await;
    let primary = MockServer::start().await;
    let mirror = MockServer::start().await;

    mount_feed(
        &feeds,
        "/feed",
        rss(&[
            ("https://news.example.com/a/1", 1),
            ("https://news.example.com/a/2", 2),
            ("https://news.example.com/a/3", 3),
            ("https://news.example.com/a/4", 48),
            ("https://news.example.com/a/5", 72),
        ]),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/36kr/news"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&primary)
        .await;
    mount_feed(&mirror, "/36kr/news", rss(&[])).await;

    let mut config = create_test_config(vec![
        feed_source("Valid", format!("{}/feed", feeds.uri())),
        feed_source("Mirrored", format!("{}/36kr/news", primary.uri())),
        feed_source("Unreachable", "http://127.0.0.1:1/feed".to_string()),
    ]);
    config.mirrors = MirrorConfig {
        instance: Some(mirror.uri()),
        known_hosts: vec![],
        fallbacks: vec![primary.uri()],
    };

    let (registry, orchestrator) = setup(&config);
    let report = orchestrator
        .acquire(&AcquireRequest::new("tech", 24))
        .await
        .expect("Batch should not fail");

    assert_eq!(report.articles.len(), 3);
    assert_eq!(report.status(), BatchStatus::Partial);
    assert_eq!(report.succeeded(), 2);

    let by_name = |name: &str| {
        report
            .outcomes
            .iter()
            .find(|o| o.source_name == name)
            .expect("outcome missing")
    };

    let valid = by_name("Valid");
    assert!(valid.outcome.success);
    assert_eq!(valid.articles, 3);

    let mirrored = by_name("Mirrored");
    assert!(mirrored.outcome.success);
    assert_eq!(mirrored.outcome.attempts, 2);
    assert!(mirrored
        .served_by
        .as_deref()
        .is_some_and(|url| url.starts_with(&mirror.uri())));

    let unreachable = by_name("Unreachable");
    assert!(!unreachable.outcome.success);
    assert_eq!(unreachable.outcome.error_class, Some(ErrorClass::Network));
    assert_eq!(unreachable.outcome.attempts, 3);
    assert_eq!(
        unreachable.transition,
        HealthTransition::Degraded { error_count: 1 }
    );

    let registry = registry.lock().unwrap();
    let stored = registry
        .find_source("http://127.0.0.1:1/feed", "tech")
        .unwrap()
        .unwrap();
    assert_eq!(stored.error_count, 1);
    assert!(stored.enabled);
    assert!(stored.last_error.unwrap().starts_with("[network]"));

    let healthy = registry
        .find_source(&format!("{}/feed", feeds.uri()), "tech")
        .unwrap()
        .unwrap();
    assert_eq!(healthy.error_count, 0);
    assert!(healthy.last_fetched_at.is_some());
}

#[tokio::test]
async fn test_batch_ceiling_abandons_slow_source() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss(&[("https://news.example.com/slow", 1)]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    mount_feed(&server, "/fast", rss(&[("https://news.example.com/fast", 1)])).await;

    let mut config = create_test_config(vec![
        feed_source("Slow", format!("{}/slow", server.uri())),
        feed_source("Fast", format!("{}/fast", server.uri())),
    ]);
    config.fetch.batch_ceiling_secs = 1;

    let (registry, orchestrator) = setup(&config);
    let report = orchestrator
        .acquire(&AcquireRequest::new("tech", 24))
        .await
        .unwrap();

    assert!(report.elapsed < Duration::from_secs(3));
    assert_eq!(report.articles.len(), 1);

    let slow = report
        .outcomes
        .iter()
        .find(|o| o.source_name == "Slow")
        .unwrap();
    assert_eq!(slow.outcome.error_class, Some(ErrorClass::Timeout));
    // The request was in flight when the ceiling hit
    assert_eq!(slow.outcome.attempts, 1);

    let registry = registry.lock().unwrap();
    let slow = registry
        .find_source(&format!("{}/slow", server.uri()), "tech")
        .unwrap()
        .unwrap();
    assert_eq!(slow.error_count, 1);
    assert!(slow.enabled);
    assert!(slow.last_error.unwrap().starts_with("[timeout]"));

    let fast = registry
        .find_source(&format!("{}/fast", server.uri()), "tech")
        .unwrap()
        .unwrap();
    assert_eq!(fast.error_count, 0);
    assert!(fast.last_error.is_none());
    assert!(fast.last_fetched_at.is_some());
}

#[tokio::test]
async fn test_cross_source_dedup_by_canonical_url() {
    let server = MockServer::start().await;

    mount_feed(
        &server,
        "/a",
        rss(&[
            ("https://www.news.example.com/story/?utm_source=rss", 1),
            ("https://news.example.com/only-a", 1),
        ]),
    )
    .await;
    mount_feed(
        &server,
        "/b",
        rss(&[
            ("https://news.example.com/story#comments", 1),
            ("https://news.example.com/only-b", 1),
        ]),
    )
    .await;

    let config = create_test_config(vec![
        feed_source("A", format!("{}/a", server.uri())),
        feed_source("B", format!("{}/b", server.uri())),
    ]);

    let (_registry, orchestrator) = setup(&config);
    let report = orchestrator
        .acquire(&AcquireRequest::new("tech", 24))
        .await
        .unwrap();

    assert_eq!(report.status(), BatchStatus::Complete);
    assert_eq!(report.articles.len(), 3);

    let story_count = report
        .articles
        .iter()
        .filter(|a| a.url == "https://news.example.com/story")
        .count();
    assert_eq!(story_count, 1);

    let accepted: usize = report.outcomes.iter().map(|o| o.articles).sum();
    assert_eq!(accepted, 3);
}

#[tokio::test]
async fn test_article_upsert_is_idempotent_across_batches() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        "/feed",
        rss(&[
            ("https://news.example.com/1", 1),
            ("https://news.example.com/2", 1),
        ]),
    )
    .await;

    let config = create_test_config(vec![feed_source("Feed", format!("{}/feed", server.uri()))]);
    let (registry, orchestrator) = setup(&config);

    let mut ids = Vec::new();
    for _ in 0..2 {
        let report = orchestrator
            .acquire(&AcquireRequest::new("tech", 24))
            .await
            .unwrap();
        let mut storage = registry.lock().unwrap();
        for article in &report.articles {
            ids.push(storage.upsert_article(article).unwrap());
        }
    }

    let storage = registry.lock().unwrap();
    assert_eq!(storage.count_articles().unwrap(), 2);
    assert_eq!(ids[0], ids[2]);
    assert_eq!(ids[1], ids[3]);
}

#[tokio::test]
async fn test_circuit_breaker_disables_failing_source() {
    let mut config = create_test_config(vec![feed_source(
        "Dead",
        "http://127.0.0.1:1/feed".to_string(),
    )]);
    config.fetch.extra_passes = 0;
    config.health.failure_threshold = 2;

    let (registry, orchestrator) = setup(&config);
    let request = AcquireRequest::new("tech", 24);

    let first = orchestrator.acquire(&request).await.unwrap();
    assert_eq!(first.status(), BatchStatus::NoContent);
    assert_eq!(
        first.outcomes[0].transition,
        HealthTransition::Degraded { error_count: 1 }
    );

    let second = orchestrator.acquire(&request).await.unwrap();
    assert!(matches!(
        second.outcomes[0].transition,
        HealthTransition::Disabled { .. }
    ));

    let stored = registry
        .lock()
        .unwrap()
        .find_source("http://127.0.0.1:1/feed", "tech")
        .unwrap()
        .unwrap();
    assert!(!stored.enabled);
    assert_eq!(stored.error_count, 2);

    let third = orchestrator.acquire(&request).await;
    assert!(matches!(third, Err(AcquireError::NoSources { .. })));
}

#[tokio::test]
async fn test_source_subset_narrows_batch() {
    let server = MockServer::start().await;
    mount_feed(&server, "/a", rss(&[("https://news.example.com/a", 1)])).await;
    mount_feed(&server, "/b", rss(&[("https://news.example.com/b", 1)])).await;

    let config = create_test_config(vec![
        feed_source("A", format!("{}/a", server.uri())),
        feed_source("B", format!("{}/b", server.uri())),
    ]);
    let (registry, orchestrator) = setup(&config);

    let a = registry
        .lock()
        .unwrap()
        .find_source(&format!("{}/a", server.uri()), "tech")
        .unwrap()
        .unwrap();

    let report = orchestrator
        .acquire(&AcquireRequest::new("tech", 24).with_sources(vec![a.id.clone()]))
        .await
        .unwrap();
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].source_id, a.id);

    let none = orchestrator
        .acquire(&AcquireRequest::new("tech", 24).with_sources(vec!["missing".to_string()]))
        .await;
    assert!(matches!(none, Err(AcquireError::NoSources { .. })));
}

#[tokio::test]
async fn test_single_page_source_respects_window() {
    let server = MockServer::start().await;

    let page = |published: String| {
        format!(
            r#"<html><head><title>Launch</title>
            <meta property="article:published_time" content="{}"></head>
            <body><article><p>The company launched a new model with much longer context and faster inference.</p></article></body></html>"#,
            published
        )
    };

    Mock::given(method("GET"))
        .and(path("/fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page(
            (Utc::now() - ChronoDuration::hours(1)).to_rfc3339(),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stale"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page(
            (Utc::now() - ChronoDuration::days(10)).to_rfc3339(),
        )))
        .mount(&server)
        .await;

    let mut fresh = feed_source("Fresh", format!("{}/fresh", server.uri()));
    fresh.kind = SourceKind::SinglePage;
    let mut stale = feed_source("Stale", format!("{}/stale", server.uri()));
    stale.kind = SourceKind::SinglePage;

    let config = create_test_config(vec![fresh, stale]);
    let (_registry, orchestrator) = setup(&config);
    let report = orchestrator
        .acquire(&AcquireRequest::new("tech", 24))
        .await
        .unwrap();

    assert_eq!(report.status(), BatchStatus::Complete);
    assert_eq!(report.articles.len(), 1);
    assert_eq!(report.articles[0].title, "Launch");
    assert_eq!(report.articles[0].scope, "tech");
}

#[tokio::test]
async fn test_validate_does_not_record_health() {
    let server = MockServer::start().await;
    mount_feed(&server, "/ok", rss(&[])).await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("this is not a feed"))
        .mount(&server)
        .await;

    let config = create_test_config(vec![
        feed_source("Ok", format!("{}/ok", server.uri())),
        feed_source("Broken", format!("{}/broken", server.uri())),
    ]);
    let (registry, orchestrator) = setup(&config);

    let sources = registry.lock().unwrap().list_enabled_sources("tech").unwrap();
    for source in &sources {
        let valid = orchestrator.validate(source).await;
        assert_eq!(valid, source.name == "Ok");
    }

    let broken = registry
        .lock()
        .unwrap()
        .find_source(&format!("{}/broken", server.uri()), "tech")
        .unwrap()
        .unwrap();
    assert_eq!(broken.error_count, 0);
    assert!(broken.last_error.is_none());
}

#[tokio::test]
async fn test_feed_encoding_declared_in_prolog() {
    let server = MockServer::start().await;

    let xml = rss(&[("https://news.example.com/gbk", 1)])
        .replace("encoding=\"UTF-8\"", "encoding=\"gb2312\"")
        .replace("Story 0", "人工智能");
    let (body, _, _) = encoding_rs::GBK.encode(&xml);

    Mock::given(method("GET"))
        .and(path("/gbk"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(body.to_vec())
                .insert_header("content-type", "application/xml"),
        )
        .mount(&server)
        .await;

    let config = create_test_config(vec![feed_source("GBK", format!("{}/gbk", server.uri()))]);
    let (_registry, orchestrator) = setup(&config);
    let report = orchestrator
        .acquire(&AcquireRequest::new("tech", 24))
        .await
        .unwrap();

    assert_eq!(report.articles.len(), 1);
    assert_eq!(report.articles[0].title, "人工智能");
}

#[tokio::test]
async fn test_single_page_charset_from_meta() {
    let server = MockServer::start().await;

    let html = format!(
        r#"<html><head><meta charset="gbk"><title>新能源汽车</title>
        <meta property="article:published_time" content="{}"></head>
        <body><article><p>新能源汽车销量持续增长，电池技术和充电网络不断完善，行业竞争日趋激烈。</p></article></body></html>"#,
        (Utc::now() - ChronoDuration::hours(1)).to_rfc3339()
    );
    let (body, _, _) = encoding_rs::GBK.encode(&html);

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(body.to_vec())
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;

    let mut page = feed_source("Page", format!("{}/page", server.uri()));
    page.kind = SourceKind::SinglePage;
    let config = create_test_config(vec![page]);
    let (_registry, orchestrator) = setup(&config);
    let report = orchestrator
        .acquire(&AcquireRequest::new("tech", 24))
        .await
        .unwrap();

    assert_eq!(report.articles.len(), 1);
    assert_eq!(report.articles[0].title, "新能源汽车");
    assert!(report.articles[0].content.contains("电池技术"));
}

#[tokio::test]
async fn test_unbounded_window_keeps_source_healthy() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        "/feed",
        rss(&[
            ("https://news.example.com/new", 1),
            ("https://news.example.com/old", 24 * 365 * 20),
        ]),
    )
    .await;

    let config = create_test_config(vec![feed_source("Feed", format!("{}/feed", server.uri()))]);
    let (registry, orchestrator) = setup(&config);
    let report = orchestrator
        .acquire(&AcquireRequest::new("tech", u32::MAX))
        .await
        .unwrap();

    assert_eq!(report.status(), BatchStatus::Complete);
    assert_eq!(report.articles.len(), 2);
    assert_eq!(report.outcomes[0].transition, HealthTransition::Healthy);

    let stored = registry
        .lock()
        .unwrap()
        .find_source(&format!("{}/feed", server.uri()), "tech")
        .unwrap()
        .unwrap();
    assert_eq!(stored.error_count, 0);
}

#[tokio::test]
async fn test_fetch_page_without_source_classifies_scope() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/post"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><title>Model release</title></head>
            <body><article><p>The lab released a new AI model, an LLM tuned with human feedback.</p></article></body></html>"#,
        ))
        .mount(&server)
        .await;

    let config = create_test_config(vec![]);
    let (registry, orchestrator) = setup(&config);

    let article = orchestrator
        .fetch_page(&format!("{}/post", server.uri()))
        .await
        .expect("page should extract");

    assert_eq!(article.title, "Model release");
    assert_eq!(article.source_id, None);
    assert_eq!(article.source_name.as_deref(), Some("127.0.0.1"));
    assert_eq!(article.scope, "ai");
    assert!(registry.lock().unwrap().list_sources().unwrap().is_empty());
}

#[tokio::test]
async fn test_fetch_page_reports_failure_outcome() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = create_test_config(vec![]);
    let (_registry, orchestrator) = setup(&config);

    let outcome = orchestrator
        .fetch_page(&format!("{}/missing", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(outcome.error_class, Some(ErrorClass::Protocol));
    assert_eq!(outcome.attempts, 1);
}
