//! Material requirement arithmetic for production plans

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One active bill-of-materials line joined with its material cost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementLine {
    pub material_id: Uuid,
    pub material_name: String,
    /// Quantity of material consumed to build one unit of product
    pub usage_per_piece: Decimal,
    /// Fractional loss expected during production (0.05 = 5%)
    pub scrap_factor: Decimal,
    pub unit: String,
    pub unit_cost: Decimal,
}

/// Computed requirement for one material
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialRequirement {
    pub material_id: Uuid,
    pub material_name: String,
    pub unit: String,
    pub required_quantity: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
}

/// Compute per-material requirements for building `target_quantity` units.
///
/// For each line: net = usage * target, scrap = net * scrap_factor,
/// required = net + scrap, cost = required * unit_cost.
pub fn compute_requirements(
    target_quantity: Decimal,
    lines: &[RequirementLine],
) -> Vec<MaterialRequirement> {
    lines
        .iter()
        .map(|line| {
            let net = line.usage_per_piece * target_quantity;
            let scrap = net * line.scrap_factor;
            let required = net + scrap;
            MaterialRequirement {
                material_id: line.material_id,
                material_name: line.material_name.clone(),
                unit: line.unit.clone(),
                required_quantity: required,
                unit_cost: line.unit_cost,
                total_cost: required * line.unit_cost,
            }
        })
        .collect()
}

/// Total estimated cost across a requirement list
pub fn total_cost(requirements: &[MaterialRequirement]) -> Decimal {
    requirements.iter().map(|r| r.total_cost).sum()
}
