//! Integration tests for `HttpFetcher` status mapping.
//!
//! Each test stands up a local `wiremock` server, so no real network traffic
//! is made.

use std::collections::BTreeMap;
use std::time::Duration;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shelfscan_scraper::{FailureClass, FetchError, FetchOptions, Fetcher, HttpFetcher};

fn test_fetcher() -> HttpFetcher {
    HttpFetcher::new(5, "shelfscan-test/0.1").expect("failed to build test HttpFetcher")
}

async fn serve(status: u16, body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/p/1"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn ok_response_returns_body() {
    let server = serve(200, "<html><h1>Vivo Y28 5G</h1></html>").await;

    let body = test_fetcher()
        .fetch(&format!("{}/p/1", server.uri()), &FetchOptions::default())
        .await
        .expect("expected Ok");

    assert!(body.contains("Vivo Y28 5G"));
}

#[tokio::test]
async fn too_many_requests_is_transient_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/p/1"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;

    let err = test_fetcher()
        .fetch(&format!("{}/p/1", server.uri()), &FetchOptions::default())
        .await
        .unwrap_err();

    match &err {
        FetchError::RateLimited {
            retry_after_secs, ..
        } => assert_eq!(*retry_after_secs, Some(30)),
        other => panic!("expected RateLimited, got {other:?}"),
    }
    assert_eq!(err.classify(), FailureClass::Transient);
}

#[tokio::test]
async fn not_found_is_permanent() {
    let server = serve(404, "gone").await;

    let err = test_fetcher()
        .fetch(&format!("{}/p/1", server.uri()), &FetchOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::NotFound { .. }), "got {err:?}");
    assert_eq!(err.classify(), FailureClass::Permanent);
}

#[tokio::test]
async fn forbidden_is_blocked() {
    let server = serve(403, "denied").await;

    let err = test_fetcher()
        .fetch(&format!("{}/p/1", server.uri()), &FetchOptions::default())
        .await
        .unwrap_err();

    assert!(
        matches!(err, FetchError::Blocked { status: 403, .. }),
        "got {err:?}"
    );
    assert_eq!(err.classify(), FailureClass::Permanent);
}

#[tokio::test]
async fn service_unavailable_is_transient() {
    let server = serve(503, "try later").await;

    let err = test_fetcher()
        .fetch(&format!("{}/p/1", server.uri()), &FetchOptions::default())
        .await
        .unwrap_err();

    assert!(
        matches!(err, FetchError::UnexpectedStatus { status: 503, .. }),
        "got {err:?}"
    );
    assert_eq!(err.classify(), FailureClass::Transient);
}

#[tokio::test]
async fn challenge_page_with_ok_status_is_rejected() {
    let server = serve(
        200,
        r#"<html><head><title>Just a moment...</title></head>
           <body><script src="/cdn-cgi/challenge-platform/h/b/orchestrate/jsch/v1"></script></body></html>"#,
    )
    .await;

    let err = test_fetcher()
        .fetch(&format!("{}/p/1", server.uri()), &FetchOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Challenge { .. }), "got {err:?}");
    assert_eq!(err.classify(), FailureClass::Permanent);
}

#[tokio::test]
async fn profile_user_agent_and_headers_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/p/1"))
        .and(header("user-agent", "custom-agent/2.0"))
        .and(header("x-requested-with", "shelfscan"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let options = FetchOptions {
        timeout: Duration::from_secs(5),
        user_agent: Some("custom-agent/2.0".to_owned()),
        headers: BTreeMap::from([("x-requested-with".to_owned(), "shelfscan".to_owned())]),
    };
    let body = test_fetcher()
        .fetch(&format!("{}/p/1", server.uri()), &options)
        .await
        .expect("expected Ok when headers match");

    assert_eq!(body, "<html>ok</html>");
}

#[tokio::test]
async fn slow_response_times_out_as_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/p/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html>late</html>")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let options = FetchOptions {
        timeout: Duration::from_millis(200),
        ..FetchOptions::default()
    };
    let err = test_fetcher()
        .fetch(&format!("{}/p/1", server.uri()), &options)
        .await
        .unwrap_err();

    assert_eq!(err.classify(), FailureClass::Transient, "got {err:?}");
}
