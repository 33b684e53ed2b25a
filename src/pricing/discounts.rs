//! Discount pipeline over the fixed stage order.
//!
//! Tax is computed on the post-discount subtotal, so stage order is a
//! correctness invariant, not a preference. The pipeline walks
//! `DiscountStage::ORDER` and never lets callers reorder it.

use rust_decimal::Decimal;

use crate::models::quote::DiscountLineItem;
use crate::models::rate_table::{DiscountKind, DiscountRule, DiscountStage};
use crate::pricing::round_money;

#[derive(Debug, Clone, Copy)]
pub struct StageAmounts {
    pub base: Decimal,
    pub delivery: Decimal,
    pub extras: Decimal,
}

/// Apply every eligible rule, stage by stage, each against what remains
/// of its stage after earlier rules in the same stage. The order stage
/// sees the whole discounted order. Returns one line item per applied
/// rule plus the total reduction.
pub fn apply(
    rules: &[DiscountRule],
    amounts: StageAmounts,
    rental_days: u32,
    usage_type: &str,
) -> (Vec<DiscountLineItem>, Decimal) {
    let mut remaining = [amounts.base, amounts.delivery, amounts.extras];
    let mut items = Vec::new();
    let mut total = Decimal::ZERO;

    for stage in DiscountStage::ORDER {
        for rule in rules.iter().filter(|r| r.stage == stage) {
            let stage_amount = match stage {
                DiscountStage::Base => remaining[0],
                DiscountStage::Delivery => remaining[1],
                DiscountStage::Extras => remaining[2],
                DiscountStage::Order => remaining.iter().copied().sum(),
            };
            if !rule.eligibility.matches(rental_days, usage_type, stage_amount) {
                continue;
            }

            let raw = match &rule.kind {
                DiscountKind::Percent { value } => stage_amount * *value / Decimal::ONE_HUNDRED,
                DiscountKind::Flat { value } => *value,
            };
            let amount = round_money(raw.min(stage_amount).max(Decimal::ZERO));
            if amount == Decimal::ZERO {
                continue;
            }

            match stage {
                DiscountStage::Base => remaining[0] -= amount,
                DiscountStage::Delivery => remaining[1] -= amount,
                DiscountStage::Extras => remaining[2] -= amount,
                // Order-level reductions come off the largest bucket
                // first so no bucket goes negative.
                DiscountStage::Order => {
                    let mut left = amount;
                    while left > Decimal::ZERO {
                        let (idx, _) = remaining
                            .iter()
                            .enumerate()
                            .max_by(|(_, a), (_, b)| a.cmp(b))
                            .unwrap_or((0, &Decimal::ZERO));
                        let take = left.min(remaining[idx]);
                        if take == Decimal::ZERO {
                            break;
                        }
                        remaining[idx] -= take;
                        left -= take;
                    }
                }
            }

            total += amount;
            items.push(DiscountLineItem {
                rule_id: rule.id.clone(),
                name: rule.name.clone(),
                stage: stage.as_str().to_string(),
                amount,
            });
        }
    }

    (items, round_money(total))
}
