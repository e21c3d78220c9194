//! Allocation engine: reserves inventory lots against plan requirements
//!
//! The single place where "do we have enough stock" is decided. Runs inside
//! the caller's database transaction so that a shortage on any material
//! rolls back every reservation made for the plan. Reservations are soft
//! holds: they bump `reserved_quantity` and write no ledger rows.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{plan_draws, LotAvailability, MaterialRequirement};
use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Allocation engine; stateless, always invoked within a transaction
pub struct AllocationEngine;

/// One allocation row tying a plan to a lot
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MaterialAllocation {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub material_id: Uuid,
    pub warehouse_id: Uuid,
    pub lot_id: Uuid,
    pub allocated_quantity: Decimal,
    pub used_quantity: Decimal,
    pub returned_quantity: Decimal,
    /// Material cost snapshot taken at allocation time, immutable thereafter
    pub unit_cost: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct CandidateLotRow {
    id: Uuid,
    warehouse_id: Uuid,
    quantity: Decimal,
    reserved_quantity: Decimal,
    expiry_date: Option<NaiveDate>,
    manufacture_date: Option<NaiveDate>,
}

impl AllocationEngine {
    /// Reserve lots FEFO for every requirement, all-or-nothing.
    ///
    /// Candidate lots are locked in FEFO order (expiry nulls last, then
    /// manufacture date, then lot id); the ordering is identical for every
    /// concurrent allocator, so competing confirms cannot deadlock. A
    /// shortage on any material returns `InsufficientStock` and the caller's
    /// rollback discards the reservations already applied in this call.
    pub async fn reserve(
        tx: &mut Transaction<'_, Postgres>,
        plan_id: Uuid,
        requirements: &[MaterialRequirement],
    ) -> AppResult<Vec<MaterialAllocation>> {
        let mut allocations = Vec::new();

        for requirement in requirements {
            let rows = sqlx::query_as::<_, CandidateLotRow>(
                r#"
                SELECT id, warehouse_id, quantity, reserved_quantity,
                       expiry_date, manufacture_date
                FROM inventory_lots
                WHERE material_id = $1
                ORDER BY expiry_date ASC NULLS LAST,
                         manufacture_date ASC NULLS LAST,
                         id ASC
                FOR UPDATE
                "#,
            )
            .bind(requirement.material_id)
            .fetch_all(&mut **tx)
            .await?;

            let candidates: Vec<LotAvailability> = rows
                .iter()
                .map(|r| LotAvailability {
                    lot_id: r.id,
                    warehouse_id: r.warehouse_id,
                    available: r.quantity - r.reserved_quantity,
                    expiry_date: r.expiry_date,
                    manufacture_date: r.manufacture_date,
                })
                .collect();

            let draws = plan_draws(requirement.required_quantity, &candidates).map_err(
                |shortage| AppError::InsufficientStock {
                    material_id: requirement.material_id,
                    shortage: shortage.shortage,
                },
            )?;

            for draw in draws {
                sqlx::query(
                    r#"
                    UPDATE inventory_lots
                    SET reserved_quantity = reserved_quantity + $1, updated_at = NOW()
                    WHERE id = $2
                    "#,
                )
                .bind(draw.quantity)
                .bind(draw.lot_id)
                .execute(&mut **tx)
                .await?;

                // One allocation row per (plan, lot); re-drawing from the
                // same lot accumulates into the existing row
                let allocation = sqlx::query_as::<_, MaterialAllocation>(
                    r#"
                    INSERT INTO material_allocations
                        (plan_id, material_id, warehouse_id, lot_id, allocated_quantity, unit_cost)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (plan_id, lot_id)
                    DO UPDATE SET allocated_quantity =
                        material_allocations.allocated_quantity + EXCLUDED.allocated_quantity
                    RETURNING id, plan_id, material_id, warehouse_id, lot_id,
                              allocated_quantity, used_quantity, returned_quantity,
                              unit_cost, created_at
                    "#,
                )
                .bind(plan_id)
                .bind(requirement.material_id)
                .bind(draw.warehouse_id)
                .bind(draw.lot_id)
                .bind(draw.quantity)
                .bind(requirement.unit_cost)
                .fetch_one(&mut **tx)
                .await?;

                allocations.push(allocation);
            }
        }

        Ok(allocations)
    }

    /// Release the reservations of a confirmed plan being cancelled.
    ///
    /// Nothing physical moved, so no ledger rows are written; the lots'
    /// `reserved_quantity` drops back and each allocation is marked fully
    /// returned. Allocations must be supplied in the order `reserve`
    /// acquired their locks (material, then FEFO) so the lock order matches
    /// every other multi-lot operation.
    pub async fn release(
        tx: &mut Transaction<'_, Postgres>,
        allocations: &[MaterialAllocation],
    ) -> AppResult<()> {
        for allocation in allocations {
            let result = sqlx::query(
                r#"
                UPDATE inventory_lots
                SET reserved_quantity = reserved_quantity - $1, updated_at = NOW()
                WHERE id = $2 AND reserved_quantity >= $1
                "#,
            )
            .bind(allocation.allocated_quantity)
            .bind(allocation.lot_id)
            .execute(&mut **tx)
            .await?;

            if result.rows_affected() == 0 {
                // Reservation no longer covers the allocation; a concurrent
                // mutation broke the invariant, abort the whole release
                return Err(AppError::DeductionConflict);
            }

            sqlx::query(
                r#"
                UPDATE material_allocations
                SET returned_quantity = allocated_quantity
                WHERE id = $1
                "#,
            )
            .bind(allocation.id)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}
