//! Add-on pricing: one line item per requested extra.

use rust_decimal::Decimal;

use crate::errors::AppError;
use crate::models::quote::{ExtraLineItem, ExtraRequest};
use crate::models::rate_table::{DurationTier, ExtraPricing, RateTable};
use crate::pricing::round_money;

/// Price every requested extra against the catalog. Unknown ids and
/// zero quantities are hard validation errors, never skipped.
pub fn compute(
    table: &RateTable,
    requests: &[ExtraRequest],
    tier: DurationTier,
    rental_days: u32,
) -> Result<(Vec<ExtraLineItem>, Decimal), AppError> {
    let mut items = Vec::with_capacity(requests.len());
    let mut total = Decimal::ZERO;

    for req in requests {
        if req.quantity == 0 {
            return Err(AppError::validation(
                "invalid_extra_quantity",
                format!("extra '{}' requested with quantity 0", req.extra_id),
            ));
        }
        let extra = table.extra(&req.extra_id).ok_or_else(|| {
            AppError::validation(
                "unknown_extra",
                format!("extra '{}' is not in the catalog", req.extra_id),
            )
        })?;

        let unit_price = match &extra.pricing {
            ExtraPricing::DurationBased {
                daily,
                weekly,
                monthly,
            } => match tier {
                DurationTier::Daily => *daily,
                DurationTier::Weekly => *weekly,
                DurationTier::Monthly => *monthly,
            },
            ExtraPricing::PerService { flat } => *flat,
            ExtraPricing::PerHour {
                rate,
                minimum_hours,
            } => {
                let hours = req.hours.unwrap_or(0).max(*minimum_hours);
                *rate * Decimal::from(hours)
            }
        };

        let total_price = round_money(unit_price * Decimal::from(req.quantity));
        total += total_price;
        items.push(ExtraLineItem {
            extra_id: extra.id.clone(),
            name: extra.name.clone(),
            unit_price,
            quantity: req.quantity,
            duration_days: rental_days,
            total_price,
        });
    }

    Ok((items, round_money(total)))
}
