//! FEFO lot selection for material allocation and goods issue

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Snapshot of a candidate lot for allocation planning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotAvailability {
    pub lot_id: Uuid,
    pub warehouse_id: Uuid,
    /// quantity - reserved_quantity at snapshot time
    pub available: Decimal,
    pub expiry_date: Option<NaiveDate>,
    pub manufacture_date: Option<NaiveDate>,
}

/// A planned draw against one lot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotDraw {
    pub lot_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: Decimal,
}

/// Shortage detected while planning draws for one material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortage {
    pub shortage: Decimal,
}

/// First-expired-first-out ordering: earliest expiry first with dated lots
/// before undated ones, then earliest manufacture date, then lot id so the
/// walk (and the backend's lock order within equal dates) is deterministic.
pub fn fefo_cmp(a: &LotAvailability, b: &LotAvailability) -> Ordering {
    let expiry = match (a.expiry_date, b.expiry_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    expiry
        .then_with(|| match (a.manufacture_date, b.manufacture_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.lot_id.cmp(&b.lot_id))
}

/// Sort candidate lots into FEFO order
pub fn sort_fefo(lots: &mut [LotAvailability]) {
    lots.sort_by(fefo_cmp);
}

/// Walk FEFO-ordered lots, drawing `min(available, remaining)` from each
/// until the requirement is covered.
///
/// Returns the draw list, or the uncovered shortage if the lots run out.
/// Pure planning: nothing is reserved until the caller applies the draws,
/// so a shortage leaves no partial state behind.
pub fn plan_draws(required: Decimal, lots: &[LotAvailability]) -> Result<Vec<LotDraw>, Shortage> {
    let mut remaining = required;
    let mut draws = Vec::new();

    for lot in lots {
        if remaining <= Decimal::ZERO {
            break;
        }
        if lot.available <= Decimal::ZERO {
            continue;
        }
        let take = lot.available.min(remaining);
        draws.push(LotDraw {
            lot_id: lot.lot_id,
            warehouse_id: lot.warehouse_id,
            quantity: take,
        });
        remaining -= take;
    }

    if remaining > Decimal::ZERO {
        Err(Shortage { shortage: remaining })
    } else {
        Ok(draws)
    }
}
