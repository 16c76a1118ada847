use std::sync::Arc;

use rust_decimal::Decimal;
use shelfscan_core::parse_profiles;

use super::*;
use crate::quality::decide;
use crate::types::Outcome;

const PROFILE: &str = r#"
profiles:
  - id: shop
    base_url: https://shop.example
    required_fields: [name, price]
    fields:
      name: { min_len: 3, reject_patterns: ["Add to Compare"] }
      price: { min: 1 }
    selector_tiers:
      - tier: standard
        container: div.product
        selectors:
          name: ["h2.title"]
          price: ["span.price"]
          original_price: ["span.mrp"]
          image_urls: ["img.main"]
          offers: ['li:contains("offer")']
      - tier: alternative
        selectors:
          name: ["h3.alt-name", "img@alt"]
          price: ["span.alt-price"]
"#;

fn profile() -> Arc<SiteProfile> {
    parse_profiles(PROFILE).unwrap().get("shop").unwrap()
}

fn doc(body: &str) -> RawDocument {
    RawDocument::new("shop", Some("https://shop.example/p/1".to_owned()), body, 1)
}

fn money(s: &str) -> FieldValue {
    FieldValue::Money(s.parse().unwrap())
}

fn text(s: &str) -> FieldValue {
    FieldValue::Text(s.to_owned())
}

#[test]
fn alternative_selectors_fill_when_standard_misses() {
    let profile = profile();
    let record = extract(
        &doc(r#"<html><body>
            <h3 class="alt-name">Vivo Y28 5G</h3>
            <span class="alt-price">₹13,999</span>
        </body></html>"#),
        &profile,
    );

    assert_eq!(record.get(FieldName::Name), &text("Vivo Y28 5G"));
    assert_eq!(record.get(FieldName::Price), &money("13999.00"));
    assert_eq!(record.origin(FieldName::Name), Some(FieldOrigin::Alternative));
    assert_eq!(record.origin(FieldName::Price), Some(FieldOrigin::Alternative));
    assert_eq!(record.tier(), Some(Tier::Alternative));
    assert_eq!(decide(record, &profile).status(), "accepted");
}

#[test]
fn earlier_tier_value_is_never_overwritten() {
    let profile = profile();
    let record = extract(
        &doc(r#"<html><body>
            <div class="product"><span class="price">₹999</span></div>
            <h3 class="alt-name">Boat Rockerz 450</h3>
            <span class="alt-price">₹1,299</span>
        </body></html>"#),
        &profile,
    );

    assert_eq!(record.get(FieldName::Price), &money("999.00"));
    assert_eq!(record.origin(FieldName::Price), Some(FieldOrigin::Standard));
    assert_eq!(record.origin(FieldName::Name), Some(FieldOrigin::Alternative));
}

#[test]
fn chain_stops_once_sufficient() {
    let profile = profile();
    let record = extract(
        &doc(r#"<html><body>
            <div class="product">
              <h2 class="title">Samsung Galaxy M14</h2>
              <span class="price">₹10,490</span>
              <p>4.2 out of 5 stars</p>
            </div>
        </body></html>"#),
        &profile,
    );

    assert_eq!(record.tier(), Some(Tier::Standard));
    // The rating is only reachable by the aggressive tier, which never ran.
    assert!(!record.is_present(FieldName::Rating));
    assert!(record.fields().all(|(_, f)| f.origin == FieldOrigin::Standard));
}

#[test]
fn container_scopes_selectors() {
    let profile = profile();
    let record = extract(
        &doc(r#"<html><body>
            <div class="ad"><h2 class="title">Promoted listing</h2><span class="price">₹1</span></div>
            <div class="product"><h2 class="title">Vivo Y28 5G</h2><span class="price">₹13,999</span></div>
        </body></html>"#),
        &profile,
    );

    assert_eq!(record.get(FieldName::Name), &text("Vivo Y28 5G"));
    assert_eq!(record.get(FieldName::Price), &money("13999.00"));
}

#[test]
fn offers_are_joined_and_images_use_lazy_attributes() {
    let profile = profile();
    let record = extract(
        &doc(r#"<html><body><div class="product">
            <h2 class="title">Vivo Y28 5G</h2>
            <span class="price">₹13,999</span>
            <img class="main" data-src="/img/y28.jpg?w=200">
            <ul>
              <li>Bank offer 10% instant discount</li>
              <li>No cost EMI offer</li>
              <li>Bank offer 10% instant discount</li>
              <li>Free delivery</li>
            </ul>
        </div></body></html>"#),
        &profile,
    );

    assert_eq!(
        record.get(FieldName::Offers),
        &text("Bank offer 10% instant discount; No cost EMI offer")
    );
    assert_eq!(
        record.get(FieldName::ImageUrls),
        &FieldValue::UrlList(vec!["https://shop.example/img/y28.jpg".to_owned()])
    );
}

#[test]
fn aggressive_scan_and_emergency_name_with_derived_discount() {
    let profile = profile();
    let record = extract(
        &doc(r#"<html><body>
            <h1>Redmi 13C</h1>
            <p>M.R.P: ₹12,999</p>
            <p>Deal price ₹9,999</p>
            <p>4.1 out of 5 stars</p>
            <p>2,345 ratings</p>
            <script>var teaser = "₹1";</script>
        </body></html>"#),
        &profile,
    );

    assert_eq!(record.get(FieldName::Price), &money("9999.00"));
    assert_eq!(record.origin(FieldName::Price), Some(FieldOrigin::Aggressive));
    assert_eq!(record.get(FieldName::OriginalPrice), &money("12999.00"));
    assert_eq!(
        record.get(FieldName::Rating),
        &FieldValue::Rating {
            value: "4.1".parse().unwrap(),
            scale: Decimal::from(5),
        }
    );
    assert_eq!(record.get(FieldName::ReviewCount), &FieldValue::Count(2345));
    assert_eq!(record.get(FieldName::Name), &text("Redmi 13C"));
    assert_eq!(record.origin(FieldName::Name), Some(FieldOrigin::Emergency));
    assert_eq!(
        record.get(FieldName::DiscountPct),
        &FieldValue::Percentage(Decimal::from(23))
    );
    assert_eq!(record.origin(FieldName::DiscountPct), Some(FieldOrigin::Derived));
    assert_eq!(record.tier(), Some(Tier::Emergency));
}

#[test]
fn scraped_discount_wins_over_derivation() {
    let yaml = r#"
profiles:
  - id: shop
    required_fields: [name, price]
    selector_tiers:
      - tier: standard
        selectors:
          name: ["h2"]
          price: ["span.price"]
          original_price: ["span.mrp"]
          discount_pct: ['span:contains("% off")']
"#;
    let profile = parse_profiles(yaml).unwrap().get("shop").unwrap();
    let record = extract(
        &doc(r#"<html><body>
            <h2>Noise ColorFit Pro</h2>
            <span class="price">₹80</span>
            <span class="mrp">₹100</span>
            <span>10% off</span>
        </body></html>"#),
        &profile,
    );

    assert_eq!(
        record.get(FieldName::DiscountPct),
        &FieldValue::Percentage(Decimal::from(10))
    );
    assert_eq!(record.origin(FieldName::DiscountPct), Some(FieldOrigin::Standard));
}

#[test]
fn inconsistent_prices_leave_discount_missing() {
    let profile = profile();
    let record = extract(
        &doc(r#"<html><body><div class="product">
            <h2 class="title">Vivo Y28 5G</h2>
            <span class="price">₹100</span>
            <span class="mrp">₹80</span>
        </div></body></html>"#),
        &profile,
    );
    assert!(!record.is_present(FieldName::DiscountPct));
}

#[test]
fn rejected_name_falls_through_to_next_selector() {
    let profile = profile();
    let record = extract(
        &doc(r#"<html><body>
            <h3 class="alt-name">Add to Compare</h3>
            <img alt="Realme Narzo 70" src="/img/n70.jpg">
            <span class="alt-price">₹11,999</span>
        </body></html>"#),
        &profile,
    );
    assert_eq!(record.get(FieldName::Name), &text("Realme Narzo 70"));
}

#[test]
fn non_markup_payload_goes_straight_to_emergency() {
    let profile = profile();
    let record = extract(&doc("\n\n  Vivo Y28 5G 128GB  \nsecond line"), &profile);

    assert_eq!(record.get(FieldName::Name), &text("Vivo Y28 5G 128GB"));
    assert_eq!(record.origin(FieldName::Name), Some(FieldOrigin::Emergency));
    assert_eq!(record.tier(), Some(Tier::Emergency));
    match decide(record, &profile) {
        Outcome::Degraded { missing, .. } => {
            assert!(missing.contains(&FieldName::Price));
        }
        other => panic!("expected degraded, got {other:?}"),
    }
}

#[test]
fn empty_document_fails_with_no_product_data() {
    let profile = profile();
    let record = extract(&doc("   "), &profile);
    assert_eq!(record.fields().count(), 0);
    assert_eq!(
        decide(record, &profile),
        Outcome::failed(crate::types::FailureReason::NoProductData)
    );
}

#[test]
fn emergency_name_is_truncated() {
    let profile = profile();
    let long = "Ultra ".repeat(40);
    let record = extract(&doc(&format!("<html><body><h1>{long}</h1></body></html>")), &profile);
    let name = record.name().unwrap();
    assert!(name.chars().count() <= 100);
    assert!(name.starts_with("Ultra Ultra"));
}

#[test]
fn confidence_never_drops_across_tiers() {
    let profile = profile();
    let (diagnostics, mut rx) = Diagnostics::channel();
    let record = extract_observed(
        &doc(r#"<html><body>
            <div class="product"><span class="price">₹999</span></div>
            <h1>Boat Airdopes 141</h1>
        </body></html>"#),
        &profile,
        &diagnostics,
        "#0 shop",
    );

    let mut scores = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let DiagnosticEvent::TierCompleted { score, .. } = event {
            scores.push(score);
        }
    }
    assert!(scores.len() >= 2);
    assert!(scores.windows(2).all(|w| w[0] <= w[1]), "{scores:?}");
    assert!(record.confidence() >= *scores.last().unwrap());
}

#[test]
fn escalation_events_follow_plan() {
    let profile = profile();
    let (diagnostics, mut rx) = Diagnostics::channel();
    extract_observed(
        &doc(r#"<html><body>
            <h3 class="alt-name">Vivo Y28 5G</h3>
            <span class="alt-price">₹13,999</span>
        </body></html>"#),
        &profile,
        &diagnostics,
        "#0 shop",
    );

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(match event {
            DiagnosticEvent::TierCompleted { tier, .. } => format!("completed:{tier}"),
            DiagnosticEvent::TierEscalation { from, to, .. } => format!("escalate:{from}->{to}"),
            other => panic!("unexpected event {other:?}"),
        });
    }
    assert_eq!(
        kinds,
        vec![
            "completed:standard",
            "escalate:standard->alternative",
            "completed:alternative",
        ]
    );
}

#[test]
fn unparsed_document_plans_only_emergency() {
    let profile = profile();
    assert_eq!(plan(&profile, false), vec![Tier::Emergency]);
    assert_eq!(
        plan(&profile, true),
        vec![
            Tier::Standard,
            Tier::Alternative,
            Tier::Aggressive,
            Tier::Emergency
        ]
    );
}

const TEN_POINT_PROFILE: &str = r"
profiles:
  - id: shop
    required_fields: [name, price, rating]
    fields:
      rating: { scale: 10 }
";

#[test]
fn aggressive_rating_follows_profile_scale() {
    let profile = parse_profiles(TEN_POINT_PROFILE)
        .unwrap()
        .get("shop")
        .unwrap();
    let record = extract(
        &doc(
            "<html><body><h1>Cotton Kurta Set</h1><p>₹499</p>\
             <p>Rated 7/10 by buyers</p></body></html>",
        ),
        &profile,
    );

    assert_eq!(
        record.get(FieldName::Rating),
        &FieldValue::Rating {
            value: Decimal::from(7),
            scale: Decimal::from(10),
        }
    );
    assert_eq!(record.origin(FieldName::Rating), Some(FieldOrigin::Aggressive));
}

#[test]
fn aggressive_availability_needs_a_stock_statement() {
    let profile = profile();
    let availability = |body: &str| {
        extract(&doc(body), &profile)
            .get(FieldName::Availability)
            .clone()
    };

    assert_eq!(
        availability("<html><body><h1>Redmi 13C</h1><p>Available offers</p></body></html>"),
        FieldValue::Missing
    );
    assert_eq!(
        availability(
            "<html><body><h1>Redmi 13C</h1><p>Available offers</p><p>In stock</p></body></html>"
        ),
        FieldValue::Boolean(true)
    );
    assert_eq!(
        availability(
            "<html><body><h1>Redmi 13C</h1><button>Buy now</button>\
             <p>Currently unavailable</p></body></html>"
        ),
        FieldValue::Boolean(false)
    );
}
