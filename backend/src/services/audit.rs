//! Audit trail recorder for plan transitions and stock movements

use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// Audit service recording before/after snapshots of mutating transitions
#[derive(Clone)]
pub struct AuditService {
    db: PgPool,
}

/// Actions emitted by the allocation and plan engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    PlanConfirmed,
    PlanStarted,
    PlanCompleted,
    PlanCancelled,
    StockReserved,
    StockDeducted,
    StockReturned,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::PlanConfirmed => "PLAN_CONFIRMED",
            AuditAction::PlanStarted => "PLAN_STARTED",
            AuditAction::PlanCompleted => "PLAN_COMPLETED",
            AuditAction::PlanCancelled => "PLAN_CANCELLED",
            AuditAction::StockReserved => "STOCK_RESERVED",
            AuditAction::StockDeducted => "STOCK_DEDUCTED",
            AuditAction::StockReturned => "STOCK_RETURNED",
        }
    }
}

impl AuditService {
    /// Create a new AuditService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record an audit entry.
    ///
    /// Fire-and-forget from the engine's perspective: a failed insert is
    /// logged and never fails the business operation that triggered it.
    pub async fn record(
        &self,
        action: AuditAction,
        entity_type: &str,
        entity_id: Uuid,
        old_values: Option<Value>,
        new_values: Option<Value>,
    ) {
        let result = sqlx::query(
            r#"
            INSERT INTO audit_logs (action, entity_type, entity_id, old_values, new_values)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(action.as_str())
        .bind(entity_type)
        .bind(entity_id)
        .bind(old_values)
        .bind(new_values)
        .execute(&self.db)
        .await;

        if let Err(err) = result {
            tracing::warn!(
                "Failed to record audit entry {} for {} {}: {}",
                action.as_str(),
                entity_type,
                entity_id,
                err
            );
        }
    }
}
