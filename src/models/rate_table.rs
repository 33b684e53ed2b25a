//! Typed, validated rate-table snapshot.
//!
//! The sheet-sync source supplies loosely-typed rows; `rates::loader`
//! converts them into this structure exactly once, at load time. Anything
//! that would make a calculation ambiguous (negative rate, multiplier
//! outside (0, 2], unsorted zones) is rejected there, never here.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::location::Coordinates;

/// Pricing bracket selected by rental length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationTier {
    Daily,
    Weekly,
    Monthly,
}

impl DurationTier {
    /// Fixed breakpoints: 1-6 days daily, 7-29 weekly, >=30 monthly.
    pub fn for_rental_days(days: u32) -> Self {
        match days {
            0..=6 => DurationTier::Daily,
            7..=29 => DurationTier::Weekly,
            _ => DurationTier::Monthly,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DurationTier::Daily => "daily",
            DurationTier::Weekly => "weekly",
            DurationTier::Monthly => "monthly",
        }
    }
}

/// Per-trailer-type rates. Each tier carries its own rate rather than a
/// multiplier over the daily rate, so tier pricing never accumulates
/// rounding drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailerRate {
    pub trailer_type: String,
    pub daily: Decimal,
    pub weekly: Decimal,
    pub monthly: Decimal,
    /// Multiplier applied to the delivery cost for oversized units.
    /// Absent means 1.0 (logged as a configuration gap at lookup).
    pub size_multiplier: Option<Decimal>,
}

impl TrailerRate {
    pub fn rate_for(&self, tier: DurationTier) -> Decimal {
        match tier {
            DurationTier::Daily => self.daily,
            DurationTier::Weekly => self.weekly,
            DurationTier::Monthly => self.monthly,
        }
    }
}

/// A physical depot from which delivery distance is measured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    pub name: String,
    pub coordinates: Coordinates,
    /// Miles this branch is willing to serve.
    pub service_radius: f64,
    /// Lower wins on distance ties.
    pub priority: u32,
}

/// Named delivery-distance bracket. Zones are held sorted by `max_distance`
/// ascending; the first zone covering the resolved distance is selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceZone {
    pub name: String,
    pub max_distance: f64,
    pub rate_per_mile: Decimal,
    pub minimum_charge: Decimal,
}

/// How an add-on is priced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "model")]
pub enum ExtraPricing {
    /// Unit rate depends on the rental's duration tier.
    DurationBased {
        daily: Decimal,
        weekly: Decimal,
        monthly: Decimal,
    },
    /// One flat charge per unit, regardless of rental length.
    PerService { flat: Decimal },
    /// Hourly with a minimum billable block.
    PerHour { rate: Decimal, minimum_hours: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extra {
    pub id: String,
    pub name: String,
    pub pricing: ExtraPricing,
}

/// Tax rates resolved most-specific-first: (state, city), then state,
/// then the global default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxRates {
    /// Keyed by "STATE|city" (uppercase state, lowercase city).
    pub by_state_city: HashMap<String, Decimal>,
    /// Keyed by uppercase two-letter state.
    pub by_state: HashMap<String, Decimal>,
    pub default_rate: Decimal,
}

impl TaxRates {
    pub fn city_key(state: &str, city: &str) -> String {
        format!("{}|{}", state.to_uppercase(), city.to_lowercase())
    }
}

/// Which bucket of the order a discount reduces. The pricing pipeline
/// applies stages strictly in declaration order because tax is computed
/// on the post-discount subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountStage {
    Base,
    Delivery,
    Extras,
    Order,
}

impl DiscountStage {
    /// Fixed, non-negotiable application order.
    pub const ORDER: [DiscountStage; 4] = [
        DiscountStage::Base,
        DiscountStage::Delivery,
        DiscountStage::Extras,
        DiscountStage::Order,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountStage::Base => "base",
            DiscountStage::Delivery => "delivery",
            DiscountStage::Extras => "extras",
            DiscountStage::Order => "order",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DiscountKind {
    /// Percentage of the stage amount, expressed as e.g. "10" for 10%.
    Percent { value: Decimal },
    /// Flat amount off the stage, capped at the stage amount.
    Flat { value: Decimal },
}

/// Conditions that must all hold for a rule to apply. A rule whose
/// eligibility is not met is omitted from the breakdown, never applied
/// at zero value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscountEligibility {
    pub min_rental_days: Option<u32>,
    /// Empty means any usage type.
    #[serde(default)]
    pub usage_types: Vec<String>,
    /// Minimum stage amount for the rule to kick in.
    pub min_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountRule {
    pub id: String,
    pub name: String,
    pub stage: DiscountStage,
    #[serde(flatten)]
    pub kind: DiscountKind,
    #[serde(default)]
    pub eligibility: DiscountEligibility,
}

impl DiscountEligibility {
    /// All configured conditions must hold.
    pub fn matches(&self, rental_days: u32, usage_type: &str, stage_amount: Decimal) -> bool {
        if let Some(min_days) = self.min_rental_days {
            if rental_days < min_days {
                return false;
            }
        }
        if !self.usage_types.is_empty() && !self.usage_types.iter().any(|u| u == usage_type) {
            return false;
        }
        if let Some(min_amount) = self.min_amount {
            if stage_amount < min_amount {
                return false;
            }
        }
        true
    }
}

/// Flat per-trip component of the delivery charge, before the per-mile part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRate {
    pub base_rate: Decimal,
}

/// Immutable pricing snapshot. A new version fully replaces the old one
/// via `rates::RateTableHandle` — concurrent readers always see one
/// complete snapshot, never a mix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateTable {
    pub version: String,
    pub effective_date: NaiveDate,
    pub trailer_rates: HashMap<String, TrailerRate>,
    pub usage_multipliers: HashMap<String, Decimal>,
    /// Keyed by calendar month 1-12.
    pub seasonal_multipliers: HashMap<u32, Decimal>,
    pub extras_catalog: HashMap<String, Extra>,
    pub tax_rates: TaxRates,
    /// Sorted by `max_distance` ascending (enforced at load).
    pub delivery_zones: Vec<ServiceZone>,
    pub branches: Vec<Branch>,
    pub discount_rules: Vec<DiscountRule>,
    pub delivery_rate: DeliveryRate,
}

impl RateTable {
    pub fn trailer_rate(&self, trailer_type: &str) -> Option<&TrailerRate> {
        self.trailer_rates.get(trailer_type)
    }

    pub fn usage_multiplier(&self, usage_type: &str) -> Option<Decimal> {
        self.usage_multipliers.get(usage_type).copied()
    }

    pub fn extra(&self, extra_id: &str) -> Option<&Extra> {
        self.extras_catalog.get(extra_id)
    }

    /// Widest zone boundary, used in the out-of-area outcome payload.
    pub fn max_zone_boundary(&self) -> Option<f64> {
        self.delivery_zones.last().map(|z| z.max_distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_duration_tier_breakpoints() {
        assert_eq!(DurationTier::for_rental_days(1), DurationTier::Daily);
        assert_eq!(DurationTier::for_rental_days(6), DurationTier::Daily);
        assert_eq!(DurationTier::for_rental_days(7), DurationTier::Weekly);
        assert_eq!(DurationTier::for_rental_days(29), DurationTier::Weekly);
        assert_eq!(DurationTier::for_rental_days(30), DurationTier::Monthly);
        assert_eq!(DurationTier::for_rental_days(365), DurationTier::Monthly);
    }

    #[test]
    fn test_trailer_rate_per_tier() {
        let rate = TrailerRate {
            trailer_type: "4_stall".into(),
            daily: dec!(175),
            weekly: dec!(950),
            monthly: dec!(3200),
            size_multiplier: None,
        };
        assert_eq!(rate.rate_for(DurationTier::Daily), dec!(175));
        assert_eq!(rate.rate_for(DurationTier::Weekly), dec!(950));
        assert_eq!(rate.rate_for(DurationTier::Monthly), dec!(3200));
    }

    #[test]
    fn test_tax_city_key_normalizes() {
        assert_eq!(TaxRates::city_key("tx", "Dallas"), "TX|dallas");
    }

    #[test]
    fn test_discount_stage_order_is_fixed() {
        assert_eq!(
            DiscountStage::ORDER,
            [
                DiscountStage::Base,
                DiscountStage::Delivery,
                DiscountStage::Extras,
                DiscountStage::Order,
            ]
        );
    }
}
