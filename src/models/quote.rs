//! Quote request/response DTOs and the calculation trace.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::location::Coordinates;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraRequest {
    pub extra_id: String,
    /// Must be >= 1; validated by the orchestrator.
    pub quantity: u32,
    /// Only meaningful for per-hour extras.
    pub hours: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRequest {
    pub delivery_address: String,
    pub trailer_type: String,
    pub rental_days: u32,
    pub usage_type: String,
    pub rental_start_date: NaiveDate,
    #[serde(default)]
    pub extras: Vec<ExtraRequest>,
    /// Tax-exempt organizations get zero tax with a recorded reason code.
    #[serde(default)]
    pub tax_exempt: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraLineItem {
    pub extra_id: String,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub duration_days: u32,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountLineItem {
    pub rule_id: String,
    pub name: String,
    pub stage: String,
    pub amount: Decimal,
}

/// Whether a resolution step was served from cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheOutcome {
    Hit,
    Miss,
    Bypass,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    pub stage: String,
    pub detail: String,
    pub cache: Option<CacheOutcome>,
    /// Provider or fallback that produced the value, when applicable.
    pub source: Option<String>,
}

/// Ordered record of how the quote was produced: every resolution step,
/// calculator output, and discount decision. Shipped to the audit sink
/// with each result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalculationTrace {
    pub steps: Vec<TraceStep>,
}

impl CalculationTrace {
    pub fn push(&mut self, stage: &str, detail: impl Into<String>) {
        self.steps.push(TraceStep {
            stage: stage.to_string(),
            detail: detail.into(),
            cache: None,
            source: None,
        });
    }

    pub fn push_cached(
        &mut self,
        stage: &str,
        detail: impl Into<String>,
        cache: CacheOutcome,
        source: Option<String>,
    ) {
        self.steps.push(TraceStep {
            stage: stage.to_string(),
            detail: detail.into(),
            cache: Some(cache),
            source,
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteResult {
    pub quote_id: Uuid,
    pub base_cost: Decimal,
    pub delivery_cost: Decimal,
    pub extras_cost: Decimal,
    pub extras: Vec<ExtraLineItem>,
    pub discounts: Vec<DiscountLineItem>,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    /// Reason code when tax was suppressed, e.g. "tax_exempt_org".
    pub tax_reason: Option<String>,
    pub total: Decimal,
    pub currency: String,
    pub zone: String,
    pub distance_miles: f64,
    pub branch_id: String,
    pub delivery_coords: Coordinates,
    pub trace: CalculationTrace,
    pub pricing_version: String,
    /// How long this number may be honored without recomputation.
    pub expires_at: DateTime<Utc>,
}

/// Out-of-area is an expected business outcome, not a failure: the address
/// resolved fine but no zone covers the distance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum QuoteOutcome {
    Priced(QuoteResult),
    OutOfServiceArea {
        distance_miles: f64,
        max_zone_boundary: Option<f64>,
        nearest_branch: String,
    },
}
