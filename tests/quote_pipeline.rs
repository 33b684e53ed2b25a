//! Full quote-pipeline coverage: pricing identities, discount ordering,
//! cache idempotence, and the documented worked examples.
//!
//! The pipeline runs fully offline here: geocoding uses the built-in
//! centroid table only and distance falls back to great-circle, so the
//! numbers are deterministic.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use haulquote::audit::AuditSink;
use haulquote::cache::TieredCache;
use haulquote::errors::AppError;
use haulquote::models::quote::{ExtraRequest, QuoteOutcome, QuoteRequest};
use haulquote::models::rate_table::RateTable;
use haulquote::quote::QuoteService;
use haulquote::rates::loader::RawRateDocument;
use haulquote::rates::RateTableHandle;
use haulquote::resolve::geocode::{CentroidLookup, GeocodeStrategy};
use haulquote::resolve::zone::{classify, ZoneAssignment};
use haulquote::resolve::{DistanceResolver, GeocodeResolver};

/// Rate-table export mirroring a real sheet-sync document. The Dallas
/// branch sits exactly on the Dallas centroid so centroid-geocoded
/// Dallas addresses resolve at distance zero (local zone).
const RATES_JSON: &str = r#"{
    "version": "2026-08-01#17",
    "effective_date": "2026-08-01",
    "trailer_rates": [
        {"trailer_type": "2_stall", "daily": 125, "weekly": 650, "monthly": 2200},
        {"trailer_type": "4_stall", "daily": 175, "weekly": 950, "monthly": 3200, "size_multiplier": 1.15},
        {"trailer_type": "8_stall_luxury", "daily": 320, "weekly": 1800, "monthly": 5900, "size_multiplier": 1.4}
    ],
    "usage_multipliers": {"event": 1.0, "construction": 1.25, "disaster_relief": 1.1},
    "seasonal_multipliers": {"1": 0.9, "2": 0.9, "3": 1.0, "4": 1.0, "5": 1.1, "6": 1.2, "7": 1.2, "8": 1.15, "9": 1.1, "10": 1.0, "11": 0.95, "12": 0.9},
    "extras": [
        {"id": "generator", "name": "Towable Generator", "pricing": {"model": "duration_based", "daily": 45, "weekly": 240, "monthly": 800}},
        {"id": "cleaning", "name": "Mid-Rental Cleaning", "pricing": {"model": "per_service", "flat": 95}},
        {"id": "attendant", "name": "On-Site Attendant", "pricing": {"model": "per_hour", "rate": 35, "minimum_hours": 4}}
    ],
    "tax_rates": {
        "state_city": [{"state": "TX", "city": "Dallas", "rate": 0.0825}],
        "state": [{"state": "TX", "rate": 0.0625}, {"state": "OK", "rate": 0.045}],
        "default_rate": 0.07
    },
    "delivery_zones": [
        {"name": "local", "max_distance": 25, "rate_per_mile": 3.5, "minimum_charge": 75},
        {"name": "regional", "max_distance": 75, "rate_per_mile": 3.0, "minimum_charge": 150},
        {"name": "extended", "max_distance": 250, "rate_per_mile": 2.5, "minimum_charge": 300}
    ],
    "branches": [
        {"id": "dal-01", "name": "Dallas Yard", "lat": 32.7767, "lon": -96.797, "service_radius": 250, "priority": 1},
        {"id": "okc-01", "name": "OKC Yard", "lat": 35.4676, "lon": -97.5164, "service_radius": 250, "priority": 2}
    ],
    "discounts": [
        {"id": "weekly_base", "name": "7+ Day Base Discount", "stage": "base", "kind": "percent", "value": 10, "eligibility": {"min_rental_days": 7}},
        {"id": "event_delivery", "name": "Event Delivery Credit", "stage": "delivery", "kind": "flat", "value": 25, "eligibility": {"usage_types": ["event"]}},
        {"id": "big_order", "name": "Large Order Discount", "stage": "order", "kind": "percent", "value": 5, "eligibility": {"min_amount": 2000}}
    ],
    "delivery_rate": {"base_rate": 50}
}"#;

fn rate_table() -> RateTable {
    serde_json::from_str::<RawRateDocument>(RATES_JSON)
        .expect("fixture parses")
        .validate()
        .expect("fixture validates")
}

/// Offline service: centroid-only geocoding, great-circle distance,
/// log-only audit sink.
fn service() -> QuoteService {
    let cache = Arc::new(TieredCache::with_defaults(None));
    let chain: Vec<Arc<dyn GeocodeStrategy>> = vec![Arc::new(CentroidLookup)];
    QuoteService::new(
        cache.clone(),
        RateTableHandle::new(rate_table()),
        GeocodeResolver::new(cache.clone(), chain),
        DistanceResolver::new(cache, None),
        AuditSink::new(Vec::new(), None),
        512,
    )
}

fn request(trailer: &str, days: u32, usage: &str) -> QuoteRequest {
    QuoteRequest {
        delivery_address: "2100 Ross Ave, Dallas, TX 75201".into(),
        trailer_type: trailer.into(),
        rental_days: days,
        usage_type: usage.into(),
        rental_start_date: NaiveDate::from_ymd_opt(2026, 6, 12).unwrap(),
        extras: Vec::new(),
        tax_exempt: false,
    }
}

fn priced(outcome: QuoteOutcome) -> haulquote::models::quote::QuoteResult {
    match outcome {
        QuoteOutcome::Priced(result) => result,
        other => panic!("expected priced outcome, got {other:?}"),
    }
}

// ═══════════════════════════════════════════════════════════════════
//  Worked examples
// ═══════════════════════════════════════════════════════════════════

/// 4-stall, 3 days, event usage, Dallas address at the branch doorstep:
/// local zone, June seasonal 1.2, city tax, event delivery credit.
#[tokio::test]
async fn test_four_stall_three_day_event_quote() {
    let svc = service();
    let result = priced(svc.quote(&request("4_stall", 3, "event"), "req-1").await.unwrap());

    assert_eq!(result.zone, "local");
    assert_eq!(result.branch_id, "dal-01");
    // 175 * 3 days * 1.0 event * 1.2 June.
    assert_eq!(result.base_cost, dec!(630.00));
    // (50 + 0 miles * 3.5) * 1.15 = 57.50, floored at the 75 minimum.
    assert_eq!(result.delivery_cost, dec!(75.00));
    // Event delivery credit.
    assert_eq!(result.discounts.len(), 1);
    assert_eq!(result.discounts[0].rule_id, "event_delivery");
    assert_eq!(result.subtotal, dec!(680.00));
    // Dallas city rate 8.25%.
    assert_eq!(result.tax_amount, dec!(56.10));
    assert_eq!(result.total, dec!(736.10));
    assert_eq!(result.currency, "USD");
    assert_eq!(result.pricing_version, "2026-08-01#17");
}

/// Unknown trailer type fails validation before any resolution or
/// calculation happens.
#[tokio::test]
async fn test_unknown_trailer_type_is_rejected_upfront() {
    let svc = service();
    let err = svc
        .quote(&request("12_stall", 3, "event"), "req-2")
        .await
        .unwrap_err();
    match err {
        AppError::Validation { code, .. } => assert_eq!(code, "unknown_trailer_type"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

/// An address far beyond the widest zone produces the out-of-area
/// outcome, not an error, and carries the boundary that was exceeded.
#[tokio::test]
async fn test_distant_address_is_out_of_service_area() {
    let svc = service();
    let mut req = request("4_stall", 3, "event");
    req.delivery_address = "800 Central Ave, Albuquerque, NM 87102".into();
    match svc.quote(&req, "req-3").await.unwrap() {
        QuoteOutcome::OutOfServiceArea {
            distance_miles,
            max_zone_boundary,
            nearest_branch,
        } => {
            assert!(distance_miles > 250.0, "got {distance_miles}");
            assert_eq!(max_zone_boundary, Some(250.0));
            assert_eq!(nearest_branch, "okc-01");
        }
        other => panic!("expected out of service area, got {other:?}"),
    }
}

// ═══════════════════════════════════════════════════════════════════
//  Identities and invariants
// ═══════════════════════════════════════════════════════════════════

/// subtotal = base + delivery + extras - Σ discounts, and
/// total = subtotal + tax, exactly.
#[tokio::test]
async fn test_sum_identity_with_extras_and_discounts() {
    let svc = service();
    let mut req = request("8_stall_luxury", 10, "event");
    req.extras = vec![
        ExtraRequest {
            extra_id: "generator".into(),
            quantity: 1,
            hours: None,
        },
        ExtraRequest {
            extra_id: "attendant".into(),
            quantity: 2,
            hours: Some(6),
        },
        ExtraRequest {
            extra_id: "cleaning".into(),
            quantity: 1,
            hours: None,
        },
    ];
    let result = priced(svc.quote(&req, "req-4").await.unwrap());

    let discount_sum: Decimal = result.discounts.iter().map(|d| d.amount).sum();
    assert_eq!(
        result.subtotal,
        result.base_cost + result.delivery_cost + result.extras_cost - discount_sum
    );
    assert_eq!(result.total, result.subtotal + result.tax_amount);

    let extras_sum: Decimal = result.extras.iter().map(|e| e.total_price).sum();
    assert_eq!(result.extras_cost, extras_sum);
}

/// The same request twice within the quote TTL returns the identical
/// result, quote_id and expires_at included.
#[tokio::test]
async fn test_identical_request_is_served_from_cache() {
    let svc = service();
    let req = request("4_stall", 3, "event");
    let first = priced(svc.quote(&req, "req-5a").await.unwrap());
    let second = priced(svc.quote(&req, "req-5b").await.unwrap());

    assert_eq!(first.quote_id, second.quote_id);
    assert_eq!(first.expires_at, second.expires_at);
    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
}

/// Cosmetic address differences (case, spacing) hit the same cached
/// quote; a real field change does not.
#[tokio::test]
async fn test_fingerprint_normalization_and_sensitivity() {
    let svc = service();
    let first = priced(svc.quote(&request("4_stall", 3, "event"), "req-6a").await.unwrap());

    let mut cosmetic = request("4_stall", 3, "event");
    cosmetic.delivery_address = "  2100  ROSS ave, Dallas,  tx 75201 ".into();
    let second = priced(svc.quote(&cosmetic, "req-6b").await.unwrap());
    assert_eq!(first.quote_id, second.quote_id);

    let mut changed = request("4_stall", 4, "event");
    changed.delivery_address = first_address();
    let third = priced(svc.quote(&changed, "req-6c").await.unwrap());
    assert_ne!(first.quote_id, third.quote_id);
}

fn first_address() -> String {
    "2100 Ross Ave, Dallas, TX 75201".into()
}

/// A closer address never lands in a wider zone than a farther one.
#[test]
fn test_zone_assignment_is_monotonic_in_distance() {
    let table = rate_table();
    let branch = &table.branches[0];
    let mut last_boundary = 0.0_f64;
    for distance in [0.0, 10.0, 25.0, 26.0, 60.0, 75.0, 76.0, 200.0, 250.0] {
        match classify(&table, branch, distance) {
            ZoneAssignment::InZone { zone, .. } => {
                assert!(
                    zone.max_distance >= last_boundary,
                    "zone shrank at {distance} mi"
                );
                last_boundary = zone.max_distance;
            }
            ZoneAssignment::OutOfArea { .. } => panic!("unexpected out-of-area at {distance}"),
        }
    }
}

/// Discount stages are applied base-first, so the whole-order discount
/// sees the already-discounted amount. Reversing the order would tax a
/// different subtotal.
#[tokio::test]
async fn test_discount_ordering_drives_the_taxable_amount() {
    let svc = service();
    // 10-day construction rental: weekly 10% base discount, then the 5%
    // order discount on what remains.
    let mut req = request("8_stall_luxury", 10, "construction");
    req.delivery_address = first_address();
    let result = priced(svc.quote(&req, "req-7").await.unwrap());

    // base: 1800 * 2 weeks * 1.25 construction * 1.2 June = 5400.
    // delivery: (50 + 0 miles) * 1.4 = 70, floored at the 75 minimum.
    assert_eq!(result.base_cost, dec!(5400.00));
    assert_eq!(result.delivery_cost, dec!(75.00));

    let base_discount = result
        .discounts
        .iter()
        .find(|d| d.rule_id == "weekly_base")
        .expect("base discount applies");
    assert_eq!(base_discount.amount, dec!(540.00));

    let order_discount = result
        .discounts
        .iter()
        .find(|d| d.rule_id == "big_order")
        .expect("order discount applies");
    // 5% of (5400 - 540 + 75) = 5% of 4935 = 246.75. Reversed ordering
    // would have given 5% of 5475 = 273.75.
    assert_eq!(order_discount.amount, dec!(246.75));
    assert_ne!(order_discount.amount, dec!(273.75));

    // Tax applies to the fully discounted subtotal at the Dallas city rate.
    assert_eq!(result.subtotal, dec!(4688.25));
    assert_eq!(result.tax_amount, dec!(386.78));
    assert_eq!(result.total, dec!(5075.03));
}

/// Tax-exempt requests carry zero tax and the reason code instead.
#[tokio::test]
async fn test_tax_exempt_quote() {
    let svc = service();
    let mut req = request("2_stall", 3, "event");
    req.tax_exempt = true;
    let result = priced(svc.quote(&req, "req-8").await.unwrap());
    assert_eq!(result.tax_amount, Decimal::ZERO);
    assert_eq!(result.tax_reason.as_deref(), Some("tax_exempt_org"));
    assert_eq!(result.total, result.subtotal);
}

/// Zero rental days is rejected before anything else runs.
#[tokio::test]
async fn test_zero_rental_days_rejected() {
    let svc = service();
    let err = svc
        .quote(&request("4_stall", 0, "event"), "req-9")
        .await
        .unwrap_err();
    match err {
        AppError::Validation { code, .. } => assert_eq!(code, "invalid_rental_days"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

/// The trace records validation, resolution, and every calculator step.
#[tokio::test]
async fn test_trace_covers_the_pipeline() {
    let svc = service();
    let result = priced(svc.quote(&request("4_stall", 3, "event"), "req-10").await.unwrap());
    let stages: Vec<&str> = result.trace.steps.iter().map(|s| s.stage.as_str()).collect();
    assert!(stages.contains(&"validating"));
    assert!(stages.contains(&"resolving_location"));
    assert!(stages.contains(&"base_cost"));
    assert!(stages.contains(&"delivery_cost"));
    assert!(stages.contains(&"tax"));
}

/// Location-only lookup classifies without pricing.
#[tokio::test]
async fn test_location_lookup() {
    let svc = service();
    let info = svc.locate("2100 Ross Ave, Dallas, TX 75201").await.unwrap();
    assert!(info.in_service_area);
    assert_eq!(info.zone.as_deref(), Some("local"));
    assert_eq!(info.branch_id.as_deref(), Some("dal-01"));
    assert_eq!(info.state.as_deref(), Some("TX"));
}
