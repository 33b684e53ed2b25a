//! Delivery charge: flat trip base plus mileage, floored at the zone
//! minimum, scaled for oversized trailers.

use rust_decimal::Decimal;
use tracing::warn;

use crate::models::rate_table::{DeliveryRate, ServiceZone};
use crate::pricing::round_money;

pub fn compute(
    zone: &ServiceZone,
    delivery_rate: &DeliveryRate,
    distance_miles: f64,
    trailer_type: &str,
    size_multiplier: Option<Decimal>,
) -> Decimal {
    let multiplier = match size_multiplier {
        Some(m) => m,
        None => {
            warn!(
                trailer_type,
                "no size multiplier configured, defaulting to 1.0"
            );
            Decimal::ONE
        }
    };

    let miles = Decimal::from_f64_retain(distance_miles).unwrap_or(Decimal::ZERO);
    let variable = (delivery_rate.base_rate + miles * zone.rate_per_mile) * multiplier;
    round_money(variable.max(zone.minimum_charge))
}
