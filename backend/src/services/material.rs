//! Material master lookups (read-only collaborator)

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Read-only access to the material master
#[derive(Clone)]
pub struct MaterialService {
    db: PgPool,
}

/// Material master fields consumed by the engine
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MaterialInfo {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub unit: String,
    pub cost_per_unit: Decimal,
}

impl MaterialService {
    /// Create a new MaterialService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get an active material by id
    pub async fn get_material(&self, material_id: Uuid) -> AppResult<MaterialInfo> {
        let material = sqlx::query_as::<_, MaterialInfo>(
            r#"
            SELECT id, code, name, unit, cost_per_unit
            FROM materials
            WHERE id = $1 AND is_active = TRUE
            "#,
        )
        .bind(material_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Material".to_string()))?;

        Ok(material)
    }
}
