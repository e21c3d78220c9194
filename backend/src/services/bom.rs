//! Bill-of-materials lookups (read-only collaborator)

use rust_decimal::Decimal;
use shared::RequirementLine;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::AppResult;

/// Read-only access to the active bill of materials
#[derive(Clone)]
pub struct BomService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct ActiveLineRow {
    material_id: Uuid,
    material_name: String,
    usage_per_piece: Decimal,
    scrap_factor: Decimal,
    unit: String,
    cost_per_unit: Decimal,
}

impl BomService {
    /// Create a new BomService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get the active BOM lines for a product, joined with material cost.
    ///
    /// At most one active line exists per (product, material) pair; an empty
    /// result means the product has no usable bill of materials.
    pub async fn get_active_lines(&self, product_id: Uuid) -> AppResult<Vec<RequirementLine>> {
        let rows = sqlx::query_as::<_, ActiveLineRow>(
            r#"
            SELECT b.material_id, m.name AS material_name, b.usage_per_piece,
                   b.scrap_factor, b.unit, m.cost_per_unit
            FROM bom_lines b
            JOIN materials m ON m.id = b.material_id
            WHERE b.product_id = $1 AND b.is_active = TRUE AND m.is_active = TRUE
            ORDER BY m.name, m.id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| RequirementLine {
                material_id: r.material_id,
                material_name: r.material_name,
                usage_per_piece: r.usage_per_piece,
                scrap_factor: r.scrap_factor,
                unit: r.unit,
                unit_cost: r.cost_per_unit,
            })
            .collect())
    }
}
