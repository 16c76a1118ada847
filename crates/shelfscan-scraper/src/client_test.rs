use super::*;

#[test]
fn extract_domain_returns_host() {
    assert_eq!(
        extract_domain("https://www.flipkart.com/search?q=mobile+phones"),
        "www.flipkart.com"
    );
}

#[test]
fn extract_domain_falls_back_to_input() {
    assert_eq!(extract_domain("not a url"), "not a url");
}

#[test]
fn detects_cloudflare_interstitial() {
    let body = r#"<html><head><title>Just a moment...</title></head>
        <body><script src="/cdn-cgi/challenge-platform/h/b/orchestrate/jsch/v1"></script></body></html>"#;
    assert!(looks_like_bot_challenge(body));
}

#[test]
fn detects_captcha_page() {
    let body = "<html><body><h4>Enter the characters you see below</h4>\
                <form action=\"/errors/validateCaptcha\"></form></body></html>";
    assert!(looks_like_bot_challenge(body));
}

#[test]
fn ordinary_product_page_is_not_a_challenge() {
    let body = r#"<html><head><title>Vivo Y28 5G</title></head>
        <body><h1>Vivo Y28 5G</h1><span class="price">₹13,999</span>
        <p>Just a moment... while we load offers</p></body></html>"#;
    assert!(!looks_like_bot_challenge(body));
}

#[test]
fn default_options_use_thirty_second_timeout() {
    let options = FetchOptions::default();
    assert_eq!(options.timeout, Duration::from_secs(30));
    assert!(options.user_agent.is_none());
    assert!(options.headers.is_empty());
}

#[tokio::test]
async fn rejects_non_http_urls_without_network() {
    let fetcher = HttpFetcher::new(5, "shelfscan-test/0.1").unwrap();
    let err = fetcher
        .fetch("ftp://shop.example/p/1", &FetchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::InvalidUrl { .. }), "got {err:?}");

    let err = fetcher
        .fetch("/relative/path", &FetchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::InvalidUrl { .. }), "got {err:?}");
}
