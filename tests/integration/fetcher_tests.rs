//! HTTP fetch strategy against a mock server

use shelf_scout::harvest::{FetchConfig, FetchOutcome, FetchStrategy, HttpFetcher, Target};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn target(base_url: &str) -> Target {
    Target {
        source: "shop".to_string(),
        search_term: "lamp".to_string(),
        page: 1,
        url: Url::parse(&format!("{}/search?q=lamp&page=1", base_url)).unwrap(),
    }
}

fn fetch_config() -> FetchConfig {
    FetchConfig {
        user_agent: "ShelfScoutTest/1.0".to_string(),
        timeout: Duration::from_secs(5),
        headers: BTreeMap::new(),
        render_js: false,
        proxy: None,
    }
}

#[tokio::test]
async fn test_fetch_success_sends_user_agent_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(header("user-agent", "ShelfScoutTest/1.0"))
        .and(header("accept-language", "en-US"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>results</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = fetch_config();
    config
        .headers
        .insert("Accept-Language".to_string(), "en-US".to_string());

    let outcome = HttpFetcher::new().fetch(&target(&server.uri()), &config).await;

    match outcome {
        FetchOutcome::Success {
            content,
            status_code,
            ..
        } => {
            assert_eq!(status_code, 200);
            assert_eq!(content, "<html>results</html>");
        }
        other => panic!("expected success, got {:?}", other),
    }
    server.verify().await;
}

#[tokio::test]
async fn test_block_statuses_are_reported_as_responses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let outcome = HttpFetcher::new()
        .fetch(&target(&server.uri()), &fetch_config())
        .await;

    // Classification is left to the block detector
    assert_eq!(outcome.status_code(), Some(429));
    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_timeout_is_network_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let config = FetchConfig {
        timeout: Duration::from_millis(200),
        ..fetch_config()
    };
    let outcome = HttpFetcher::new().fetch(&target(&server.uri()), &config).await;

    assert!(matches!(outcome, FetchOutcome::NetworkFailure { .. }));
}

#[tokio::test]
async fn test_connection_refused_is_network_failure() {
    // Grab a free port, then close it so nothing is listening
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let outcome = HttpFetcher::new()
        .fetch(&target(&format!("http://127.0.0.1:{}", port)), &fetch_config())
        .await;

    assert!(matches!(outcome, FetchOutcome::NetworkFailure { .. }));
}
