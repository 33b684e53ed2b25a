//! Base rental charge: per-tier rate scaled by usage and season.

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;

use crate::errors::AppError;
use crate::models::rate_table::{DurationTier, RateTable, TrailerRate};
use crate::pricing::round_money;

#[derive(Debug, Clone, PartialEq)]
pub struct BaseCharge {
    pub tier: DurationTier,
    /// Billing units at the selected tier (days, weeks, or months).
    pub units: u32,
    pub usage_multiplier: Decimal,
    pub seasonal_multiplier: Decimal,
    pub amount: Decimal,
}

/// Billable units for a tier: days for daily, whole weeks (rounded up)
/// for weekly, whole months (rounded up, 30-day months) for monthly.
fn billing_units(tier: DurationTier, rental_days: u32) -> u32 {
    match tier {
        DurationTier::Daily => rental_days,
        DurationTier::Weekly => rental_days.div_ceil(7),
        DurationTier::Monthly => rental_days.div_ceil(30),
    }
}

/// Highest seasonal multiplier among the calendar months the rental
/// touches. A month absent from the table counts as 1.0.
pub fn seasonal_multiplier(table: &RateTable, start: NaiveDate, rental_days: u32) -> Decimal {
    let end = start + Duration::days(rental_days.max(1) as i64 - 1);
    let mut highest: Option<Decimal> = None;
    let mut cursor = start;
    loop {
        let m = table
            .seasonal_multipliers
            .get(&cursor.month())
            .copied()
            .unwrap_or(Decimal::ONE);
        if highest.map_or(true, |h| m > h) {
            highest = Some(m);
        }
        // Jump to the first day of the next month.
        let next = if cursor.month() == 12 {
            NaiveDate::from_ymd_opt(cursor.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(cursor.year(), cursor.month() + 1, 1)
        };
        match next {
            Some(next) if next <= end => cursor = next,
            _ => break,
        }
    }
    highest.unwrap_or(Decimal::ONE)
}

pub fn compute(
    table: &RateTable,
    rate: &TrailerRate,
    usage_type: &str,
    rental_days: u32,
    start: NaiveDate,
) -> Result<BaseCharge, AppError> {
    let usage = table.usage_multiplier(usage_type).ok_or_else(|| {
        AppError::validation(
            "unknown_usage_type",
            format!("usage type '{}' is not configured", usage_type),
        )
    })?;

    let tier = DurationTier::for_rental_days(rental_days);
    let units = billing_units(tier, rental_days);
    let seasonal = seasonal_multiplier(table, start, rental_days);
    let amount = round_money(rate.rate_for(tier) * Decimal::from(units) * usage * seasonal);

    Ok(BaseCharge {
        tier,
        units,
        usage_multiplier: usage,
        seasonal_multiplier: seasonal,
        amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::loader::tests::fixture_document;
    use rust_decimal_macros::dec;

    fn table() -> RateTable {
        fixture_document().validate().unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_daily_tier_event_in_june() {
        let table = table();
        let rate = table.trailer_rate("4_stall").unwrap();
        let charge = compute(&table, rate, "event", 3, date(2026, 6, 12)).unwrap();
        assert_eq!(charge.tier, DurationTier::Daily);
        assert_eq!(charge.units, 3);
        assert_eq!(charge.usage_multiplier, dec!(1.0));
        assert_eq!(charge.seasonal_multiplier, dec!(1.2));
        // 175 * 3 * 1.0 * 1.2
        assert_eq!(charge.amount, dec!(630.00));
    }

    #[test]
    fn test_weekly_units_round_up() {
        let table = table();
        let rate = table.trailer_rate("2_stall").unwrap();
        // 10 days -> weekly tier, 2 billing weeks.
        let charge = compute(&table, rate, "construction", 10, date(2026, 3, 2)).unwrap();
        assert_eq!(charge.tier, DurationTier::Weekly);
        assert_eq!(charge.units, 2);
        // 650 * 2 * 1.25 * 1.0
        assert_eq!(charge.amount, dec!(1625.00));
    }

    #[test]
    fn test_monthly_tier_at_thirty_days() {
        let table = table();
        let rate = table.trailer_rate("8_stall_luxury").unwrap();
        let charge = compute(&table, rate, "event", 30, date(2026, 10, 1)).unwrap();
        assert_eq!(charge.tier, DurationTier::Monthly);
        assert_eq!(charge.units, 1);
        assert_eq!(charge.amount, dec!(5900.00));
    }

    #[test]
    fn test_seasonal_takes_highest_spanned_month() {
        let table = table();
        // May (1.1) into June (1.2): whole rental gets 1.2.
        let m = seasonal_multiplier(&table, date(2026, 5, 25), 14);
        assert_eq!(m, dec!(1.2));
        // Entirely in January (0.9).
        let m = seasonal_multiplier(&table, date(2026, 1, 5), 10);
        assert_eq!(m, dec!(0.9));
        // December (0.9) wrapping into January (0.9).
        let m = seasonal_multiplier(&table, date(2026, 12, 28), 10);
        assert_eq!(m, dec!(0.9));
    }

    #[test]
    fn test_unknown_usage_type_rejected() {
        let table = table();
        let rate = table.trailer_rate("2_stall").unwrap();
        let err = compute(&table, rate, "wedding", 3, date(2026, 6, 12)).unwrap_err();
        match err {
            AppError::Validation { code, .. } => assert_eq!(code, "unknown_usage_type"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
