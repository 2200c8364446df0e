//! Integration tests for retry passes, mirror failover and failure classes

use newsgap_acquire::config::{FetchConfig, MirrorConfig, ProxyConfig};
use newsgap_acquire::fetch::{FetchPolicy, Transport, TransportResponse};
use newsgap_acquire::{ErrorClass, Source, SourceKind, SourcePriority};
use std::sync::atomic::{AtomicU32, Ordering};
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_fetch_config(extra_passes: u32) -> FetchConfig {
    FetchConfig {
        extra_passes,
        base_delay_ms: 10,
        max_delay_ms: 40,
        ..Default::default()
    }
}

fn policy(extra_passes: u32, mirrors: MirrorConfig) -> FetchPolicy {
    let fetch = fast_fetch_config(extra_passes);
    let transport = Transport::new(&fetch, &ProxyConfig::default());
    FetchPolicy::new(transport, mirrors, &fetch)
}

fn source(url: String, priority: SourcePriority) -> Source {
    Source::new("test", url, SourceKind::Feed, priority, "tech")
}

fn accept_any(response: &TransportResponse) -> Result<String, String> {
    Ok(response.text().into_owned())
}

#[tokio::test]
async fn test_attempts_equal_passes_for_dead_endpoint() {
    let policy = policy(2, MirrorConfig::default());
    let source = source(
        "http://127.0.0.1:1/feed".to_string(),
        SourcePriority::Official,
    );

    let outcome = policy.retrieve(&source, accept_any).await.unwrap_err();

    assert!(!outcome.success);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.error_class, Some(ErrorClass::Network));
    assert!(outcome.exhausted);
    assert!(!outcome.disable_recommended);
}

#[tokio::test]
async fn test_failover_within_one_pass() {
    let primary = MockServer::start().await;
    let mirror = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/36kr/news"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&primary)
        .await;
    Mock::given(method("GET"))
        .and(path("/36kr/news"))
        .respond_with(ResponseTemplate::new(200).set_body_string("mirrored"))
        .expect(1)
        .mount(&mirror)
        .await;

    let mirrors = MirrorConfig {
        instance: Some(mirror.uri()),
        known_hosts: vec![],
        fallbacks: vec![primary.uri()],
    };
    let policy = policy(2, mirrors);
    let source = source(
        format!("{}/36kr/news", primary.uri()),
        SourcePriority::StableMirror,
    );

    let retrieved = policy.retrieve(&source, accept_any).await.unwrap();

    assert_eq!(retrieved.value, "mirrored");
    assert_eq!(retrieved.outcome.attempts, 2);
    assert!(retrieved.url.as_str().starts_with(&mirror.uri()));
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let policy = policy(2, MirrorConfig::default());
    let source = source(format!("{}/gone", server.uri()), SourcePriority::Official);

    let outcome = policy.retrieve(&source, accept_any).await.unwrap_err();

    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.error_class, Some(ErrorClass::Protocol));
    assert!(!outcome.exhausted);
    assert!(outcome.message.unwrap().contains("404"));
}

#[tokio::test]
async fn test_server_error_is_retried_every_pass() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let policy = policy(2, MirrorConfig::default());
    let source = source(format!("{}/busy", server.uri()), SourcePriority::Official);

    let outcome = policy.retrieve(&source, accept_any).await.unwrap_err();

    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.error_class, Some(ErrorClass::Protocol));
    assert_eq!(
        outcome.error_label().as_deref().map(|l| l.starts_with("[protocol]")),
        Some(true)
    );
}

#[tokio::test]
async fn test_rejected_body_is_parse_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not a feed</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let policy = policy(2, MirrorConfig::default());
    let source = source(format!("{}/feed", server.uri()), SourcePriority::Official);

    let outcome = policy
        .retrieve(&source, |response| {
            if response.text().contains("<rss") {
                Ok(())
            } else {
                Err("missing feed root".to_string())
            }
        })
        .await
        .unwrap_err();

    assert_eq!(outcome.error_class, Some(ErrorClass::Parse));
    assert_eq!(outcome.attempts, 1);
    assert!(outcome.message.unwrap().contains("missing feed root"));
}

#[tokio::test]
async fn test_high_risk_exhaustion_recommends_disable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let policy = policy(1, MirrorConfig::default());
    let source = source(
        format!("{}/twitter/user/x", server.uri()),
        SourcePriority::HighRiskMirror,
    );

    let outcome = policy.retrieve(&source, accept_any).await.unwrap_err();

    assert_eq!(outcome.attempts, 2);
    assert!(outcome.exhausted);
    assert!(outcome.disable_recommended);
}

#[tokio::test]
async fn test_validation_pass_makes_one_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let policy = policy(2, MirrorConfig::default());
    let source = source(format!("{}/busy", server.uri()), SourcePriority::Official);

    let outcome = policy.probe(&source, accept_any).await.unwrap_err();
    assert_eq!(outcome.attempts, 1);
}

#[tokio::test]
async fn test_default_headers_are_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header_exists("accept-language"))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let policy = policy(0, MirrorConfig::default());
    let source = source(format!("{}/page", server.uri()), SourcePriority::Official);

    let retrieved = policy.retrieve(&source, accept_any).await.unwrap();
    assert_eq!(retrieved.value, "ok");
}

#[tokio::test]
async fn test_counted_retrieve_reports_requests() {
    let policy = policy(2, MirrorConfig::default());
    let source = source(
        "http://127.0.0.1:1/feed".to_string(),
        SourcePriority::Official,
    );
    let attempts = AtomicU32::new(0);

    let outcome = policy
        .retrieve_counted(&source, &attempts, accept_any)
        .await
        .unwrap_err();

    assert_eq!(attempts.load(Ordering::Relaxed), 3);
    assert_eq!(outcome.attempts, 3);
}

#[tokio::test]
async fn test_body_kept_as_raw_bytes() {
    let server = MockServer::start().await;
    let (gbk, _, _) = encoding_rs::GBK.encode("人工智能");

    Mock::given(method("GET"))
        .and(path("/raw"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(gbk.to_vec())
                .insert_header("content-type", "text/plain; charset=gbk"),
        )
        .mount(&server)
        .await;

    let policy = policy(0, MirrorConfig::default());
    let source = source(format!("{}/raw", server.uri()), SourcePriority::Official);

    let retrieved = policy
        .retrieve(&source, |response| {
            Ok((response.body.clone(), response.text().into_owned()))
        })
        .await
        .unwrap();

    assert_eq!(retrieved.value.0, gbk.to_vec());
    assert_eq!(retrieved.value.1, "人工智能");
}
