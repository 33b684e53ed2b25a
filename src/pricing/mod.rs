//! Pricing calculators and the assembly pipeline.
//!
//! All currency math is `Decimal`; every line item is rounded half-up
//! to 2 dp as it is produced, so the sum identity
//! `subtotal = base + delivery + extras - discounts` holds exactly.

pub mod base;
pub mod delivery;
pub mod discounts;
pub mod extras;
pub mod tax;

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::errors::AppError;
use crate::models::location::GeocodeResult;
use crate::models::quote::{
    CalculationTrace, DiscountLineItem, ExtraLineItem, QuoteRequest,
};
use crate::models::rate_table::{RateTable, ServiceZone};

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// All monetary outputs of the pipeline, before the orchestrator wraps
/// them in a `QuoteResult`.
#[derive(Debug, Clone)]
pub struct QuoteAmounts {
    pub base_cost: Decimal,
    pub delivery_cost: Decimal,
    pub extras_cost: Decimal,
    pub extras: Vec<ExtraLineItem>,
    pub discounts: Vec<DiscountLineItem>,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub tax_reason: Option<String>,
    pub total: Decimal,
}

/// Run the full calculator pipeline for an in-zone request. Stages run
/// in fixed order because tax applies to the post-discount subtotal.
pub fn price(
    table: &RateTable,
    request: &QuoteRequest,
    zone: &ServiceZone,
    distance_miles: f64,
    location: &GeocodeResult,
    trace: &mut CalculationTrace,
) -> Result<QuoteAmounts, AppError> {
    let rate = table.trailer_rate(&request.trailer_type).ok_or_else(|| {
        AppError::validation(
            "unknown_trailer_type",
            format!("trailer type '{}' is not configured", request.trailer_type),
        )
    })?;

    let base = base::compute(
        table,
        rate,
        &request.usage_type,
        request.rental_days,
        request.rental_start_date,
    )?;
    trace.push(
        "base_cost",
        format!(
            "{} x {} {} @ usage {} seasonal {} = {}",
            request.trailer_type,
            base.units,
            base.tier.as_str(),
            base.usage_multiplier,
            base.seasonal_multiplier,
            base.amount
        ),
    );

    let delivery_cost = delivery::compute(
        zone,
        &table.delivery_rate,
        distance_miles,
        &request.trailer_type,
        rate.size_multiplier,
    );
    trace.push(
        "delivery_cost",
        format!("zone {} at {:.1} mi = {}", zone.name, distance_miles, delivery_cost),
    );

    let (extra_items, extras_cost) =
        extras::compute(table, &request.extras, base.tier, request.rental_days)?;
    if !extra_items.is_empty() {
        trace.push(
            "extras_cost",
            format!("{} item(s) = {}", extra_items.len(), extras_cost),
        );
    }

    let (discount_items, discount_total) = discounts::apply(
        &table.discount_rules,
        discounts::StageAmounts {
            base: base.amount,
            delivery: delivery_cost,
            extras: extras_cost,
        },
        request.rental_days,
        &request.usage_type,
    );
    for item in &discount_items {
        trace.push(
            "discount",
            format!("{} ({} stage) -{}", item.rule_id, item.stage, item.amount),
        );
    }

    let subtotal = round_money(base.amount + delivery_cost + extras_cost - discount_total);
    let tax = tax::compute(
        &table.tax_rates,
        location.state.as_deref(),
        location.city.as_deref(),
        subtotal,
        request.tax_exempt,
    );
    trace.push(
        "tax",
        match &tax.reason {
            Some(reason) => format!("suppressed ({})", reason),
            None => format!("rate {} on {} = {}", tax.rate, subtotal, tax.amount),
        },
    );

    let total = round_money(subtotal + tax.amount);
    debug!(
        %subtotal,
        tax = %tax.amount,
        %total,
        pricing_version = %table.version,
        "quote priced"
    );

    Ok(QuoteAmounts {
        base_cost: base.amount,
        delivery_cost,
        extras_cost,
        extras: extra_items,
        discounts: discount_items,
        subtotal,
        tax_rate: tax.rate,
        tax_amount: tax.amount,
        tax_reason: tax.reason,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::location::{CoordinateSource, Coordinates};
    use crate::models::quote::ExtraRequest;
    use crate::rates::loader::tests::fixture_document;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn table() -> RateTable {
        fixture_document().validate().unwrap()
    }

    fn dallas_location() -> GeocodeResult {
        GeocodeResult {
            coords: Coordinates::new(32.7767, -96.797, CoordinateSource::PrimaryGeocoder),
            city: Some("Dallas".into()),
            state: Some("TX".into()),
            postal_code: Some("75201".into()),
        }
    }

    fn request(trailer: &str, days: u32, usage: &str) -> QuoteRequest {
        QuoteRequest {
            delivery_address: "123 Main St, Dallas, TX".into(),
            trailer_type: trailer.into(),
            rental_days: days,
            usage_type: usage.into(),
            rental_start_date: NaiveDate::from_ymd_opt(2026, 6, 12).unwrap(),
            extras: Vec::new(),
            tax_exempt: false,
        }
    }

    fn local_zone(table: &RateTable) -> ServiceZone {
        table.delivery_zones[0].clone()
    }

    #[test]
    fn test_worked_example_four_stall_three_day_event() {
        let table = table();
        let mut trace = CalculationTrace::default();
        let amounts = price(
            &table,
            &request("4_stall", 3, "event"),
            &local_zone(&table),
            15.0,
            &dallas_location(),
            &mut trace,
        )
        .unwrap();

        // 175 * 3 * 1.0 (event) * 1.2 (June) = 630.
        assert_eq!(amounts.base_cost, dec!(630.00));
        // (50 + 15 * 3.5) * 1.15 = 117.88, above the 75 minimum.
        assert_eq!(amounts.delivery_cost, dec!(117.88));
        assert_eq!(amounts.extras_cost, Decimal::ZERO);
        // Event delivery credit: -25.
        assert_eq!(amounts.discounts.len(), 1);
        assert_eq!(amounts.discounts[0].rule_id, "event_delivery");
        assert_eq!(amounts.subtotal, dec!(722.88));
        // Dallas, TX city rate 8.25%.
        assert_eq!(amounts.tax_rate, dec!(0.0825));
        assert_eq!(amounts.tax_amount, dec!(59.64));
        assert_eq!(amounts.total, dec!(782.52));
    }

    #[test]
    fn test_sum_identity_holds_with_extras_and_discounts() {
        let table = table();
        let mut req = request("8_stall_luxury", 10, "event");
        req.extras = vec![
            ExtraRequest {
                extra_id: "generator".into(),
                quantity: 1,
                hours: None,
            },
            ExtraRequest {
                extra_id: "attendant".into(),
                quantity: 1,
                hours: Some(6),
            },
        ];
        let mut trace = CalculationTrace::default();
        let amounts = price(
            &table,
            &req,
            &local_zone(&table),
            12.0,
            &dallas_location(),
            &mut trace,
        )
        .unwrap();

        let discount_sum: Decimal = amounts.discounts.iter().map(|d| d.amount).sum();
        assert_eq!(
            amounts.subtotal,
            amounts.base_cost + amounts.delivery_cost + amounts.extras_cost - discount_sum
        );
        assert_eq!(amounts.total, amounts.subtotal + amounts.tax_amount);
    }

    #[test]
    fn test_unknown_trailer_type_stops_before_any_calculation() {
        let table = table();
        let mut trace = CalculationTrace::default();
        let err = price(
            &table,
            &request("12_stall", 3, "event"),
            &local_zone(&table),
            15.0,
            &dallas_location(),
            &mut trace,
        )
        .unwrap_err();
        match err {
            AppError::Validation { code, .. } => assert_eq!(code, "unknown_trailer_type"),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(trace.steps.is_empty());
    }

    #[test]
    fn test_tax_exempt_zeroes_tax_with_reason() {
        let table = table();
        let mut req = request("2_stall", 3, "event");
        req.tax_exempt = true;
        let mut trace = CalculationTrace::default();
        let amounts = price(
            &table,
            &req,
            &local_zone(&table),
            10.0,
            &dallas_location(),
            &mut trace,
        )
        .unwrap();
        assert_eq!(amounts.tax_amount, Decimal::ZERO);
        assert_eq!(amounts.tax_reason.as_deref(), Some("tax_exempt_org"));
        assert_eq!(amounts.total, amounts.subtotal);
    }
}
