//! Production plan lifecycle service
//!
//! Owns the draft -> confirmed -> started -> completed state machine, with
//! cancellation possible from draft or confirmed only. Every transition is
//! validated against the current status before any side effect, re-checked
//! under a row lock inside the transaction, and either commits completely
//! or leaves no trace. Re-invoking a transition already applied returns the
//! current snapshot instead of repeating side effects.

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::{check_transition, PlanStatus, PlanTransition, TransitionCheck};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::allocation::{AllocationEngine, MaterialAllocation};
use crate::services::audit::{AuditAction, AuditService};
use crate::services::requirement::RequirementService;
use shared::{compute_requirements, total_cost, Pagination, PaginatedResponse, PaginationMeta};

/// Production plan service
#[derive(Clone)]
pub struct PlanService {
    db: PgPool,
    lock_timeout_ms: u32,
}

/// Production plan record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductionPlan {
    pub id: Uuid,
    pub plan_number: String,
    pub product_id: Uuid,
    pub planned_quantity: Decimal,
    pub status: String,
    pub priority: i32,
    pub estimated_cost: Option<Decimal>,
    pub actual_cost: Option<Decimal>,
    pub actual_quantity: Option<Decimal>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Plan snapshot with its allocations
#[derive(Debug, Clone, Serialize)]
pub struct PlanWithAllocations {
    #[serde(flatten)]
    pub plan: ProductionPlan,
    pub allocations: Vec<MaterialAllocation>,
}

/// Input for creating a draft plan
#[derive(Debug, Deserialize)]
pub struct CreatePlanInput {
    pub product_id: Uuid,
    pub planned_quantity: Decimal,
    pub priority: Option<i32>,
}

/// Input for completing a plan
#[derive(Debug, Deserialize)]
pub struct CompletePlanInput {
    pub actual_quantity: Decimal,
}

/// Input for cancelling a plan
#[derive(Debug, Deserialize)]
pub struct CancelPlanInput {
    pub reason: String,
}

const PLAN_COLUMNS: &str = "id, plan_number, product_id, planned_quantity, status, priority, \
     estimated_cost, actual_cost, actual_quantity, started_at, completed_at, \
     cancelled_at, cancel_reason, created_at, updated_at";

impl PlanService {
    /// Create a new PlanService instance
    pub fn new(db: PgPool, lock_timeout_ms: u32) -> Self {
        Self { db, lock_timeout_ms }
    }

    fn audit(&self) -> AuditService {
        AuditService::new(self.db.clone())
    }

    /// Begin a transaction with the configured row-lock wait bound; an
    /// expired lock_timeout surfaces as a retryable LockTimeout error
    async fn begin_tx(&self) -> AppResult<Transaction<'static, Postgres>> {
        let mut tx = self.db.begin().await?;
        sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout_ms))
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    /// Create a draft production plan
    pub async fn create_plan(&self, input: CreatePlanInput) -> AppResult<ProductionPlan> {
        if let Err(msg) = shared::validate_positive_quantity(input.planned_quantity) {
            return Err(AppError::Validation {
                field: "planned_quantity".to_string(),
                message: msg.to_string(),
            });
        }

        let product_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM products WHERE id = $1 AND is_active = TRUE)",
        )
        .bind(input.product_id)
        .fetch_one(&self.db)
        .await?;

        if !product_exists {
            return Err(AppError::NotFound("Product".to_string()));
        }

        let sequence: i64 = sqlx::query_scalar("SELECT nextval('production_plan_number_seq')")
            .fetch_one(&self.db)
            .await?;
        let plan_number = format!("PP-{}-{:04}", Utc::now().year(), sequence);

        let plan = sqlx::query_as::<_, ProductionPlan>(&format!(
            r#"
            INSERT INTO production_plans (plan_number, product_id, planned_quantity, status, priority)
            VALUES ($1, $2, $3, 'draft', $4)
            RETURNING {PLAN_COLUMNS}
            "#,
        ))
        .bind(&plan_number)
        .bind(input.product_id)
        .bind(input.planned_quantity)
        .bind(input.priority.unwrap_or(0))
        .fetch_one(&self.db)
        .await?;

        Ok(plan)
    }

    /// Get a plan with its allocations
    pub async fn get_plan(&self, plan_id: Uuid) -> AppResult<PlanWithAllocations> {
        let plan = self.fetch_plan(plan_id).await?;
        let allocations = self.fetch_allocations(plan_id).await?;
        Ok(PlanWithAllocations { plan, allocations })
    }

    /// List plans, optionally filtered by status
    pub async fn list_plans(
        &self,
        status: Option<String>,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<ProductionPlan>> {
        if let Some(ref s) = status {
            if PlanStatus::from_str(s).is_none() {
                return Err(AppError::Validation {
                    field: "status".to_string(),
                    message: format!("Unknown plan status '{}'", s),
                });
            }
        }

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM production_plans WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(&status)
        .fetch_one(&self.db)
        .await?;

        let plans = sqlx::query_as::<_, ProductionPlan>(&format!(
            r#"
            SELECT {PLAN_COLUMNS}
            FROM production_plans
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        ))
        .bind(&status)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse {
            data: plans,
            pagination: PaginationMeta::new(&pagination, total as u64),
        })
    }

    /// Confirm a draft plan: compute requirements, reserve lots, set the
    /// estimated cost. On shortage the plan stays draft with no reservation
    /// left behind.
    pub async fn confirm(&self, plan_id: Uuid) -> AppResult<PlanWithAllocations> {
        let plan = self.fetch_plan(plan_id).await?;
        match self.check(&plan, PlanTransition::Confirm)? {
            TransitionCheck::AlreadyDone => return self.get_plan(plan_id).await,
            TransitionCheck::Allowed => {}
            TransitionCheck::Invalid => unreachable!("check maps Invalid to an error"),
        }

        let lines = RequirementService::new(self.db.clone())
            .requirement_lines(plan.product_id)
            .await?;
        let requirements = compute_requirements(plan.planned_quantity, &lines);
        let estimated_cost = total_cost(&requirements);

        let mut tx = self.begin_tx().await?;

        // Re-check under the plan row lock; a concurrent confirm either
        // already won (no-op success) or this one proceeds exclusively
        let locked = self.lock_plan(&mut tx, plan_id).await?;
        match self.check(&locked, PlanTransition::Confirm)? {
            TransitionCheck::AlreadyDone => {
                tx.rollback().await?;
                return self.get_plan(plan_id).await;
            }
            TransitionCheck::Allowed => {}
            TransitionCheck::Invalid => unreachable!("check maps Invalid to an error"),
        }

        let allocations = AllocationEngine::reserve(&mut tx, plan_id, &requirements).await?;

        sqlx::query(
            r#"
            UPDATE production_plans
            SET status = 'confirmed', estimated_cost = $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(estimated_cost)
        .bind(plan_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("Plan {} confirmed, estimated cost {}", plan.plan_number, estimated_cost);

        let audit = self.audit();
        for allocation in &allocations {
            audit
                .record(
                    AuditAction::StockReserved,
                    "material_allocation",
                    allocation.id,
                    None,
                    Some(json!({
                        "plan_id": plan_id,
                        "material_id": allocation.material_id,
                        "lot_id": allocation.lot_id,
                        "allocated_quantity": allocation.allocated_quantity,
                    })),
                )
                .await;
        }
        audit
            .record(
                AuditAction::PlanConfirmed,
                "production_plan",
                plan_id,
                Some(json!({ "status": "draft" })),
                Some(json!({ "status": "confirmed", "estimated_cost": estimated_cost })),
            )
            .await;

        self.get_plan(plan_id).await
    }

    /// Start a confirmed plan: consume every reservation by deducting the
    /// allocated quantity from each lot and writing an OUT ledger row, all
    /// atomically across the plan's allocations.
    pub async fn start(&self, plan_id: Uuid) -> AppResult<PlanWithAllocations> {
        let plan = self.fetch_plan(plan_id).await?;
        match self.check(&plan, PlanTransition::Start)? {
            TransitionCheck::AlreadyDone => return self.get_plan(plan_id).await,
            TransitionCheck::Allowed => {}
            TransitionCheck::Invalid => unreachable!("check maps Invalid to an error"),
        }

        let mut tx = self.begin_tx().await?;

        let locked = self.lock_plan(&mut tx, plan_id).await?;
        match self.check(&locked, PlanTransition::Start)? {
            TransitionCheck::AlreadyDone => {
                tx.rollback().await?;
                return self.get_plan(plan_id).await;
            }
            TransitionCheck::Allowed => {}
            TransitionCheck::Invalid => unreachable!("check maps Invalid to an error"),
        }

        // Lots are locked in the order confirm acquired them (material,
        // then FEFO) so competing multi-lot operations cannot form a cycle
        let allocations = self.fetch_allocations_for_update(&mut tx, plan_id).await?;

        let today = Utc::now().date_naive();
        for allocation in &allocations {
            // The reservation is consumed, not released: on-hand and
            // reserved decrease together. A guard miss means a concurrent
            // mutation dropped the lot below its reservation.
            let result = sqlx::query(
                r#"
                UPDATE inventory_lots
                SET quantity = quantity - $1,
                    reserved_quantity = reserved_quantity - $1,
                    updated_at = NOW()
                WHERE id = $2 AND quantity >= $1 AND reserved_quantity >= $1
                "#,
            )
            .bind(allocation.allocated_quantity)
            .bind(allocation.lot_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                tracing::warn!(
                    "Deduction conflict on lot {} while starting plan {}",
                    allocation.lot_id,
                    plan.plan_number
                );
                return Err(AppError::DeductionConflict);
            }

            sqlx::query(
                r#"
                INSERT INTO inventory_transactions
                    (transaction_type, quantity, lot_id, warehouse_id,
                     reference_number, reason, transaction_date)
                VALUES ('out', $1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(allocation.allocated_quantity)
            .bind(allocation.lot_id)
            .bind(allocation.warehouse_id)
            .bind(&plan.plan_number)
            .bind(format!("Production deduction for plan {}", plan.plan_number))
            .bind(today)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "UPDATE material_allocations SET used_quantity = allocated_quantity WHERE id = $1",
            )
            .bind(allocation.id)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            UPDATE production_plans
            SET status = 'started', started_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(plan_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("Plan {} started", plan.plan_number);

        let audit = self.audit();
        for allocation in &allocations {
            audit
                .record(
                    AuditAction::StockDeducted,
                    "material_allocation",
                    allocation.id,
                    Some(json!({ "used_quantity": Decimal::ZERO })),
                    Some(json!({
                        "plan_id": plan_id,
                        "material_id": allocation.material_id,
                        "lot_id": allocation.lot_id,
                        "used_quantity": allocation.allocated_quantity,
                    })),
                )
                .await;
        }
        audit
            .record(
                AuditAction::PlanStarted,
                "production_plan",
                plan_id,
                Some(json!({ "status": "confirmed" })),
                Some(json!({ "status": "started" })),
            )
            .await;

        self.get_plan(plan_id).await
    }

    /// Complete a started plan, recording actual produced quantity and
    /// actual cost. Start already deducted the full allocation, so no
    /// ledger rows are written here and returned quantities stay zero.
    pub async fn complete(
        &self,
        plan_id: Uuid,
        input: CompletePlanInput,
    ) -> AppResult<PlanWithAllocations> {
        if input.actual_quantity < Decimal::ZERO {
            return Err(AppError::Validation {
                field: "actual_quantity".to_string(),
                message: "Actual produced quantity cannot be negative".to_string(),
            });
        }

        let plan = self.fetch_plan(plan_id).await?;
        match self.check(&plan, PlanTransition::Complete)? {
            TransitionCheck::AlreadyDone => return self.get_plan(plan_id).await,
            TransitionCheck::Allowed => {}
            TransitionCheck::Invalid => unreachable!("check maps Invalid to an error"),
        }

        let mut tx = self.begin_tx().await?;

        let locked = self.lock_plan(&mut tx, plan_id).await?;
        match self.check(&locked, PlanTransition::Complete)? {
            TransitionCheck::AlreadyDone => {
                tx.rollback().await?;
                return self.get_plan(plan_id).await;
            }
            TransitionCheck::Allowed => {}
            TransitionCheck::Invalid => unreachable!("check maps Invalid to an error"),
        }

        let actual_cost: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(used_quantity * unit_cost), 0)
            FROM material_allocations
            WHERE plan_id = $1
            "#,
        )
        .bind(plan_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE production_plans
            SET status = 'completed', actual_cost = $1, actual_quantity = $2,
                completed_at = NOW(), updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(actual_cost)
        .bind(input.actual_quantity)
        .bind(plan_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            "Plan {} completed: produced {}, actual cost {}",
            plan.plan_number,
            input.actual_quantity,
            actual_cost
        );

        self.audit()
            .record(
                AuditAction::PlanCompleted,
                "production_plan",
                plan_id,
                Some(json!({ "status": "started" })),
                Some(json!({
                    "status": "completed",
                    "actual_quantity": input.actual_quantity,
                    "actual_cost": actual_cost,
                })),
            )
            .await;

        self.get_plan(plan_id).await
    }

    /// Cancel a draft or confirmed plan. From confirmed, every reservation
    /// is released (no ledger rows; nothing physical moved). Cancelling
    /// started plans is forbidden: their stock is already consumed.
    pub async fn cancel(
        &self,
        plan_id: Uuid,
        input: CancelPlanInput,
    ) -> AppResult<PlanWithAllocations> {
        if let Err(msg) = shared::validate_reason(&input.reason) {
            return Err(AppError::Validation {
                field: "reason".to_string(),
                message: msg.to_string(),
            });
        }

        let plan = self.fetch_plan(plan_id).await?;
        match self.check(&plan, PlanTransition::Cancel)? {
            TransitionCheck::AlreadyDone => return self.get_plan(plan_id).await,
            TransitionCheck::Allowed => {}
            TransitionCheck::Invalid => unreachable!("check maps Invalid to an error"),
        }

        let mut tx = self.begin_tx().await?;

        let locked = self.lock_plan(&mut tx, plan_id).await?;
        match self.check(&locked, PlanTransition::Cancel)? {
            TransitionCheck::AlreadyDone => {
                tx.rollback().await?;
                return self.get_plan(plan_id).await;
            }
            TransitionCheck::Allowed => {}
            TransitionCheck::Invalid => unreachable!("check maps Invalid to an error"),
        }

        let previous_status = locked.status.clone();
        let mut released: Vec<MaterialAllocation> = Vec::new();

        if PlanStatus::from_str(&previous_status) == Some(PlanStatus::Confirmed) {
            released = self.fetch_allocations_for_update(&mut tx, plan_id).await?;
            AllocationEngine::release(&mut tx, &released).await?;
        }

        sqlx::query(
            r#"
            UPDATE production_plans
            SET status = 'cancelled', cancelled_at = NOW(), cancel_reason = $1,
                updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(&input.reason)
        .bind(plan_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("Plan {} cancelled: {}", plan.plan_number, input.reason);

        let audit = self.audit();
        for allocation in &released {
            audit
                .record(
                    AuditAction::StockReturned,
                    "material_allocation",
                    allocation.id,
                    Some(json!({ "returned_quantity": Decimal::ZERO })),
                    Some(json!({
                        "plan_id": plan_id,
                        "material_id": allocation.material_id,
                        "lot_id": allocation.lot_id,
                        "returned_quantity": allocation.allocated_quantity,
                    })),
                )
                .await;
        }
        audit
            .record(
                AuditAction::PlanCancelled,
                "production_plan",
                plan_id,
                Some(json!({ "status": previous_status })),
                Some(json!({ "status": "cancelled", "cancel_reason": input.reason })),
            )
            .await;

        self.get_plan(plan_id).await
    }

    /// Map a transition check to its error, leaving Allowed/AlreadyDone
    fn check(
        &self,
        plan: &ProductionPlan,
        transition: PlanTransition,
    ) -> AppResult<TransitionCheck> {
        let current = PlanStatus::from_str(&plan.status).ok_or_else(|| {
            AppError::Internal(format!("Plan {} has unknown status '{}'", plan.id, plan.status))
        })?;

        match check_transition(current, transition) {
            TransitionCheck::Invalid => Err(AppError::InvalidPlanState {
                current_status: plan.status.clone(),
                requested_transition: transition.as_str().to_string(),
            }),
            other => Ok(other),
        }
    }

    async fn fetch_plan(&self, plan_id: Uuid) -> AppResult<ProductionPlan> {
        sqlx::query_as::<_, ProductionPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM production_plans WHERE id = $1"
        ))
        .bind(plan_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Production plan".to_string()))
    }

    async fn lock_plan(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        plan_id: Uuid,
    ) -> AppResult<ProductionPlan> {
        sqlx::query_as::<_, ProductionPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM production_plans WHERE id = $1 FOR UPDATE"
        ))
        .bind(plan_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Production plan".to_string()))
    }

    /// Allocations ordered the way confirm locked their lots: by material
    /// (name then id, matching the BOM walk), then FEFO within the
    /// material. Start and cancel iterate in this order so every multi-lot
    /// path acquires row locks in the same sequence.
    async fn fetch_allocations_for_update(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        plan_id: Uuid,
    ) -> AppResult<Vec<MaterialAllocation>> {
        let allocations = sqlx::query_as::<_, MaterialAllocation>(
            r#"
            SELECT a.id, a.plan_id, a.material_id, a.warehouse_id, a.lot_id,
                   a.allocated_quantity, a.used_quantity, a.returned_quantity,
                   a.unit_cost, a.created_at
            FROM material_allocations a
            JOIN materials m ON m.id = a.material_id
            JOIN inventory_lots l ON l.id = a.lot_id
            WHERE a.plan_id = $1
            ORDER BY m.name ASC, m.id ASC,
                     l.expiry_date ASC NULLS LAST,
                     l.manufacture_date ASC NULLS LAST,
                     l.id ASC
            "#,
        )
        .bind(plan_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(allocations)
    }

    async fn fetch_allocations(&self, plan_id: Uuid) -> AppResult<Vec<MaterialAllocation>> {
        let allocations = sqlx::query_as::<_, MaterialAllocation>(
            r#"
            SELECT id, plan_id, material_id, warehouse_id, lot_id,
                   allocated_quantity, used_quantity, returned_quantity,
                   unit_cost, created_at
            FROM material_allocations
            WHERE plan_id = $1
            ORDER BY created_at ASC, lot_id ASC
            "#,
        )
        .bind(plan_id)
        .fetch_all(&self.db)
        .await?;

        Ok(allocations)
    }
}
