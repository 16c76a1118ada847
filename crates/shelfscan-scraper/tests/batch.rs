//! End-to-end batch runs against a local `wiremock` server.

use futures::StreamExt;
use shelfscan_core::{parse_profiles, FieldName};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shelfscan_scraper::{
    Aggregator, DiagnosticEvent, Diagnostics, FailureReason, FetchController, FieldOrigin,
    FieldValue, HttpFetcher, ItemOutcome, Outcome, OutcomeCounts, Pipeline, RequestLimiter,
    ScrapeItem,
};

const PROFILES: &str = r#"
profiles:
  - id: shop
    required_fields: [name, price]
    fields:
      price: { min: 1, max: 1000000 }
    selector_tiers:
      - tier: standard
        container: div.product
        selectors:
          name: ["h1.title"]
          price: ["span.price"]
          original_price: ["span.mrp"]
    fetch:
      max_retries: 3
      base_backoff_ms: 10
      max_wait_ms: 50
      jitter_ratio: 0.0
      timeout_secs: 5
"#;

const PRODUCT: &str = r#"<html><body><div class="product">
    <h1 class="title">Vivo Y28 5G</h1>
    <span class="price">₹13,999</span>
    <span class="mrp">₹18,999</span>
</div></body></html>"#;

/// A page whose markup no selector matches; only free-text scanning finds data.
const LISTING_STYLE: &str = r"<html><body>
    <h1>Boat Rockerz 450</h1>
    <p>Deal price ₹1,299 M.R.P.: ₹3,990 (67% off)</p>
    <p>4.1 out of 5 stars 12,345 ratings</p>
    <p>In stock</p>
</body></html>";

fn aggregator(diagnostics: Diagnostics) -> Aggregator<HttpFetcher> {
    let fetcher = HttpFetcher::new(5, "shelfscan-test/0.1").expect("failed to build HttpFetcher");
    let controller = FetchController::new(fetcher)
        .with_limiter(RequestLimiter::per_second(100))
        .with_diagnostics(diagnostics);
    let registry = parse_profiles(PROFILES).expect("valid profiles");
    Aggregator::new(Pipeline::new(registry, controller), 2, CancellationToken::new())
}

#[tokio::test]
async fn batch_recovers_transient_failures_and_reports_each_item() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/p/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PRODUCT))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p/plain"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTING_STYLE))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p/down"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let (diagnostics, mut events) = Diagnostics::channel();
    let aggregator = aggregator(diagnostics);
    let base = server.uri();
    let items = vec![
        ScrapeItem::url("shop", format!("{base}/p/flaky")),
        ScrapeItem::url("shop", format!("{base}/p/plain")),
        ScrapeItem::url("shop", format!("{base}/p/down")),
        ScrapeItem::url("shop", format!("{base}/p/flaky?utm_source=newsletter")),
    ];

    let mut outcomes: Vec<ItemOutcome> = aggregator.run(items).collect().await;
    outcomes.sort_by_key(|o| o.identity.index);
    assert_eq!(outcomes.len(), 3);

    let Outcome::Accepted { record } = &outcomes[0].outcome else {
        panic!("expected accepted, got {:?}", outcomes[0].outcome);
    };
    assert_eq!(record.name(), Some("Vivo Y28 5G"));
    assert_eq!(
        record.get(FieldName::DiscountPct),
        &FieldValue::Percentage(26.into())
    );
    assert_eq!(
        record.origin(FieldName::DiscountPct),
        Some(FieldOrigin::Derived)
    );

    let Outcome::Accepted { record } = &outcomes[1].outcome else {
        panic!("expected accepted, got {:?}", outcomes[1].outcome);
    };
    assert_eq!(record.origin(FieldName::Price), Some(FieldOrigin::Aggressive));
    assert_eq!(
        record.get(FieldName::Price),
        &FieldValue::Money("1299.00".parse().unwrap())
    );
    assert_eq!(
        record.get(FieldName::OriginalPrice),
        &FieldValue::Money("3990.00".parse().unwrap())
    );
    assert_eq!(record.get(FieldName::ReviewCount), &FieldValue::Count(12_345));
    assert_eq!(record.get(FieldName::Availability), &FieldValue::Boolean(true));

    assert!(
        matches!(
            outcomes[2].outcome,
            Outcome::Failed {
                reason: FailureReason::ExhaustedRetries { attempts: 3, .. }
            }
        ),
        "got {:?}",
        outcomes[2].outcome
    );

    assert_eq!(
        aggregator.counts(),
        OutcomeCounts {
            accepted: 2,
            degraded: 0,
            failed: 1,
            duplicates: 1,
        }
    );

    let mut retried = 0;
    while let Ok(event) = events.try_recv() {
        if let DiagnosticEvent::FetchAttempt {
            backoff_ms: Some(_),
            ..
        } = event
        {
            retried += 1;
        }
    }
    // One retry for the flaky page, two for the page that never recovers.
    assert_eq!(retried, 3);
}
