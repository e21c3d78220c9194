//! Warehouse master lookups (labeling only, never business logic)

use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Read-only access to the warehouse master
#[derive(Clone)]
pub struct WarehouseService {
    db: PgPool,
}

/// Warehouse master fields consumed by the engine
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WarehouseInfo {
    pub id: Uuid,
    pub code: String,
    pub name: String,
}

impl WarehouseService {
    /// Create a new WarehouseService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get an active warehouse by id
    pub async fn get_warehouse(&self, warehouse_id: Uuid) -> AppResult<WarehouseInfo> {
        let warehouse = sqlx::query_as::<_, WarehouseInfo>(
            r#"
            SELECT id, code, name
            FROM warehouses
            WHERE id = $1 AND is_active = TRUE
            "#,
        )
        .bind(warehouse_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Warehouse".to_string()))?;

        Ok(warehouse)
    }
}
