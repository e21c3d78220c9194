//! Requirement calculation for production plans
//!
//! Pure read path: computes per-material requirements from the active bill
//! of materials and, for previews, the available-to-promise per warehouse.
//! Safe to call repeatedly; used by both the preview endpoint and confirm.

use rust_decimal::Decimal;
use serde::Serialize;
use shared::{compute_requirements, total_cost, MaterialRequirement, RequirementLine};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::bom::BomService;

/// Requirement calculator service
#[derive(Clone)]
pub struct RequirementService {
    db: PgPool,
}

/// Available-to-promise for one material in one warehouse
#[derive(Debug, Clone, Serialize)]
pub struct WarehouseAvailability {
    pub warehouse_id: Uuid,
    pub warehouse_name: String,
    pub available: Decimal,
}

/// One material requirement with its current availability
#[derive(Debug, Clone, Serialize)]
pub struct RequirementItem {
    #[serde(flatten)]
    pub requirement: MaterialRequirement,
    pub availability: Vec<WarehouseAvailability>,
    pub total_available: Decimal,
}

/// Full requirement preview for a product and target quantity
#[derive(Debug, Clone, Serialize)]
pub struct RequirementSummary {
    pub product_id: Uuid,
    pub target_quantity: Decimal,
    pub items: Vec<RequirementItem>,
    pub total_cost: Decimal,
}

impl RequirementService {
    /// Create a new RequirementService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Active BOM lines with material cost, failing when none exist
    pub async fn requirement_lines(&self, product_id: Uuid) -> AppResult<Vec<RequirementLine>> {
        let lines = BomService::new(self.db.clone())
            .get_active_lines(product_id)
            .await?;

        if lines.is_empty() {
            return Err(AppError::UnknownProduct(product_id));
        }

        Ok(lines)
    }

    /// Compute requirements without availability (confirm path)
    pub async fn compute(
        &self,
        product_id: Uuid,
        target_quantity: Decimal,
    ) -> AppResult<Vec<MaterialRequirement>> {
        if let Err(msg) = shared::validate_positive_quantity(target_quantity) {
            return Err(AppError::Validation {
                field: "target_quantity".to_string(),
                message: msg.to_string(),
            });
        }

        let lines = self.requirement_lines(product_id).await?;
        Ok(compute_requirements(target_quantity, &lines))
    }

    /// Compute requirements with per-warehouse availability (preview path)
    pub async fn preview(
        &self,
        product_id: Uuid,
        target_quantity: Decimal,
    ) -> AppResult<RequirementSummary> {
        let requirements = self.compute(product_id, target_quantity).await?;

        let mut items = Vec::with_capacity(requirements.len());
        for requirement in requirements {
            let availability = self.availability_by_warehouse(requirement.material_id).await?;
            let total_available = availability.iter().map(|a| a.available).sum();
            items.push(RequirementItem {
                requirement,
                availability,
                total_available,
            });
        }

        let total = total_cost(
            &items
                .iter()
                .map(|i| i.requirement.clone())
                .collect::<Vec<_>>(),
        );

        Ok(RequirementSummary {
            product_id,
            target_quantity,
            items,
            total_cost: total,
        })
    }

    /// Available-to-promise per warehouse for one material (no mutation)
    async fn availability_by_warehouse(
        &self,
        material_id: Uuid,
    ) -> AppResult<Vec<WarehouseAvailability>> {
        let rows = sqlx::query_as::<_, (Uuid, String, Decimal)>(
            r#"
            SELECT w.id, w.name,
                   COALESCE(SUM(l.quantity - l.reserved_quantity), 0) AS available
            FROM inventory_lots l
            JOIN warehouses w ON w.id = l.warehouse_id
            WHERE l.material_id = $1
            GROUP BY w.id, w.name
            ORDER BY w.name
            "#,
        )
        .bind(material_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| WarehouseAvailability {
                warehouse_id: r.0,
                warehouse_name: r.1,
                available: r.2,
            })
            .collect())
    }
}
