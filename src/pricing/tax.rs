//! Tax resolution: (state, city) → state → global default.

use rust_decimal::Decimal;

use crate::models::rate_table::TaxRates;
use crate::pricing::round_money;

pub const EXEMPT_REASON: &str = "tax_exempt_org";

#[derive(Debug, Clone, PartialEq)]
pub struct TaxOutcome {
    pub rate: Decimal,
    pub amount: Decimal,
    /// Set only when tax was waived for an exempt organization.
    pub reason: Option<String>,
}

pub fn compute(
    rates: &TaxRates,
    state: Option<&str>,
    city: Option<&str>,
    taxable: Decimal,
    tax_exempt: bool,
) -> TaxOutcome {
    if tax_exempt {
        return TaxOutcome {
            rate: Decimal::ZERO,
            amount: Decimal::ZERO,
            reason: Some(EXEMPT_REASON.to_string()),
        };
    }

    let rate = state
        .and_then(|s| {
            city.and_then(|c| rates.by_state_city.get(&TaxRates::city_key(s, c)))
                .or_else(|| rates.by_state.get(&s.to_uppercase()))
        })
        .copied()
        .unwrap_or(rates.default_rate);

    TaxOutcome {
        rate,
        amount: round_money(taxable * rate),
        reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::loader::tests::fixture_document;
    use rust_decimal_macros::dec;

    fn rates() -> TaxRates {
        fixture_document().validate().unwrap().tax_rates
    }

    #[test]
    fn test_city_rate_wins() {
        let t = compute(&rates(), Some("TX"), Some("Dallas"), dec!(1000), false);
        assert_eq!(t.rate, dec!(0.0825));
        assert_eq!(t.amount, dec!(82.50));
        assert!(t.reason.is_none());
    }

    #[test]
    fn test_state_fallback_for_unlisted_city() {
        let t = compute(&rates(), Some("TX"), Some("Waco"), dec!(1000), false);
        assert_eq!(t.rate, dec!(0.0625));
    }

    #[test]
    fn test_default_for_unknown_state() {
        let t = compute(&rates(), Some("CO"), Some("Denver"), dec!(1000), false);
        assert_eq!(t.rate, dec!(0.07));
        let t = compute(&rates(), None, None, dec!(1000), false);
        assert_eq!(t.rate, dec!(0.07));
    }

    #[test]
    fn test_exempt_suppresses_with_reason() {
        let t = compute(&rates(), Some("TX"), Some("Dallas"), dec!(1000), true);
        assert_eq!(t.amount, Decimal::ZERO);
        assert_eq!(t.reason.as_deref(), Some(EXEMPT_REASON));
    }

    #[test]
    fn test_city_key_is_case_insensitive() {
        let t = compute(&rates(), Some("tx"), Some("DALLAS"), dec!(100), false);
        assert_eq!(t.rate, dec!(0.0825));
    }

    #[test]
    fn test_rounding_half_up() {
        // 101 * 0.0625 = 6.3125 -> 6.31; 102 * 0.0625 = 6.375 -> 6.38.
        let t = compute(&rates(), Some("TX"), None, dec!(101), false);
        assert_eq!(t.amount, dec!(6.31));
        let t = compute(&rates(), Some("TX"), None, dec!(102), false);
        assert_eq!(t.amount, dec!(6.38));
    }
}
