//! Goods movement service: the append-only inventory ledger and lot store
//!
//! Four movements (receipt, issue, transfer, adjustment), each writing its
//! ledger row(s) and mutating the referenced lot(s) in one database
//! transaction, so the cached lot quantity never diverges from the ledger
//! replay. Reads include a replay check used for auditing and repair.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{plan_draws, LotAvailability, TransactionType};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::material::MaterialService;
use crate::services::warehouse::WarehouseService;
use shared::{Pagination, PaginatedResponse, PaginationMeta};

/// Stock movement service
#[derive(Clone)]
pub struct StockService {
    db: PgPool,
    lock_timeout_ms: u32,
}

/// Inventory lot: one receipt batch of a material at a warehouse
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InventoryLot {
    pub id: Uuid,
    pub material_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: Decimal,
    pub reserved_quantity: Decimal,
    pub manufacture_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub order_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryLot {
    /// Portion of the lot free to allocate
    pub fn available_to_promise(&self) -> Decimal {
        self.quantity - self.reserved_quantity
    }
}

/// One row of the append-only inventory ledger
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub transaction_type: String,
    pub quantity: Decimal,
    pub lot_id: Uuid,
    pub warehouse_id: Uuid,
    pub reference_number: Option<String>,
    pub reason: Option<String>,
    pub transaction_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Input for a goods receipt
#[derive(Debug, Deserialize)]
pub struct ReceiveGoodsInput {
    pub material_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: Decimal,
    pub order_number: Option<String>,
    pub manufacture_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub reference_number: Option<String>,
    pub reason: Option<String>,
}

/// Input for a goods issue
#[derive(Debug, Deserialize)]
pub struct IssueGoodsInput {
    pub material_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: Decimal,
    /// Issue from a specific lot; FEFO selection across the warehouse when absent
    pub lot_id: Option<Uuid>,
    pub reference_number: Option<String>,
    pub reason: Option<String>,
}

/// Input for a warehouse transfer
#[derive(Debug, Deserialize)]
pub struct TransferGoodsInput {
    pub lot_id: Uuid,
    pub target_warehouse_id: Uuid,
    pub quantity: Decimal,
    pub reason: Option<String>,
}

/// Input for a stock adjustment
#[derive(Debug, Deserialize)]
pub struct AdjustStockInput {
    pub lot_id: Uuid,
    /// Signed: positive increases on-hand, negative decreases it
    pub quantity_change: Decimal,
    pub reason: String,
}

/// Result of a warehouse transfer: the two linked sides
#[derive(Debug, Clone, Serialize)]
pub struct TransferResult {
    pub reference_number: String,
    pub source_lot: InventoryLot,
    pub target_lot: InventoryLot,
}

/// Result of replaying a lot's ledger against its cached quantity
#[derive(Debug, Clone, Serialize)]
pub struct LotVerification {
    pub lot_id: Uuid,
    pub cached_quantity: Decimal,
    pub ledger_balance: Decimal,
    pub consistent: bool,
}

/// Query filters for listing lots
#[derive(Debug, Default, Deserialize)]
pub struct LotFilter {
    pub material_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
}

const LOT_COLUMNS: &str = "id, material_id, warehouse_id, quantity, reserved_quantity, \
     manufacture_date, expiry_date, order_number, created_at, updated_at";

const LEDGER_COLUMNS: &str = "id, transaction_type, quantity, lot_id, warehouse_id, \
     reference_number, reason, transaction_date, created_at";

impl StockService {
    /// Create a new StockService instance
    pub fn new(db: PgPool, lock_timeout_ms: u32) -> Self {
        Self { db, lock_timeout_ms }
    }

    async fn begin_tx(&self) -> AppResult<Transaction<'static, Postgres>> {
        let mut tx = self.db.begin().await?;
        sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout_ms))
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    /// Goods receipt: credit an existing lot matching (material, warehouse,
    /// order number) or create a new one, and append an IN ledger row.
    pub async fn receive(&self, input: ReceiveGoodsInput) -> AppResult<InventoryLot> {
        self.validate_quantity("quantity", input.quantity)?;
        MaterialService::new(self.db.clone())
            .get_material(input.material_id)
            .await?;
        WarehouseService::new(self.db.clone())
            .get_warehouse(input.warehouse_id)
            .await?;

        let mut tx = self.begin_tx().await?;

        let existing = sqlx::query_as::<_, InventoryLot>(&format!(
            r#"
            SELECT {LOT_COLUMNS}
            FROM inventory_lots
            WHERE material_id = $1 AND warehouse_id = $2
              AND order_number IS NOT DISTINCT FROM $3
            FOR UPDATE
            "#,
        ))
        .bind(input.material_id)
        .bind(input.warehouse_id)
        .bind(&input.order_number)
        .fetch_optional(&mut *tx)
        .await?;

        let lot = match existing {
            Some(lot) => {
                sqlx::query_as::<_, InventoryLot>(&format!(
                    r#"
                    UPDATE inventory_lots
                    SET quantity = quantity + $1, updated_at = NOW()
                    WHERE id = $2
                    RETURNING {LOT_COLUMNS}
                    "#,
                ))
                .bind(input.quantity)
                .bind(lot.id)
                .fetch_one(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_as::<_, InventoryLot>(&format!(
                    r#"
                    INSERT INTO inventory_lots
                        (material_id, warehouse_id, quantity, manufacture_date,
                         expiry_date, order_number)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    RETURNING {LOT_COLUMNS}
                    "#,
                ))
                .bind(input.material_id)
                .bind(input.warehouse_id)
                .bind(input.quantity)
                .bind(input.manufacture_date)
                .bind(input.expiry_date)
                .bind(&input.order_number)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        let reference = input.reference_number.or_else(|| input.order_number.clone());
        self.append_ledger(
            &mut tx,
            TransactionType::In,
            input.quantity,
            lot.id,
            lot.warehouse_id,
            reference,
            input.reason,
        )
        .await?;

        tx.commit().await?;

        tracing::info!("Received {} of material {} into lot {}", input.quantity, input.material_id, lot.id);

        Ok(lot)
    }

    /// Goods issue: deduct from a specific lot, or FEFO across the
    /// warehouse's lots when no lot is given. All-or-nothing: a shortage
    /// leaves no partial deduction and no ledger rows.
    pub async fn issue(&self, input: IssueGoodsInput) -> AppResult<Vec<LedgerEntry>> {
        self.validate_quantity("quantity", input.quantity)?;

        let mut tx = self.begin_tx().await?;

        let candidates = match input.lot_id {
            Some(lot_id) => {
                let lot = self.lock_lot(&mut tx, lot_id).await?;
                if lot.material_id != input.material_id || lot.warehouse_id != input.warehouse_id {
                    return Err(AppError::Validation {
                        field: "lot_id".to_string(),
                        message: "Lot does not hold this material in this warehouse".to_string(),
                    });
                }
                vec![LotAvailability {
                    lot_id: lot.id,
                    warehouse_id: lot.warehouse_id,
                    available: lot.available_to_promise(),
                    expiry_date: lot.expiry_date,
                    manufacture_date: lot.manufacture_date,
                }]
            }
            None => self
                .lock_candidates(&mut tx, input.material_id, input.warehouse_id)
                .await?,
        };

        let draws = plan_draws(input.quantity, &candidates).map_err(|shortage| {
            AppError::InsufficientStock {
                material_id: input.material_id,
                shortage: shortage.shortage,
            }
        })?;

        let mut entries = Vec::with_capacity(draws.len());
        for draw in draws {
            self.deduct_lot(&mut tx, draw.lot_id, draw.quantity).await?;
            let entry = self
                .append_ledger(
                    &mut tx,
                    TransactionType::Out,
                    draw.quantity,
                    draw.lot_id,
                    draw.warehouse_id,
                    input.reference_number.clone(),
                    input.reason.clone(),
                )
                .await?;
            entries.push(entry);
        }

        tx.commit().await?;

        tracing::info!("Issued {} of material {} from warehouse {}", input.quantity, input.material_id, input.warehouse_id);

        Ok(entries)
    }

    /// Warehouse transfer: one TRANSFER_OUT and one TRANSFER_IN sharing a
    /// generated reference number, committed together or not at all.
    pub async fn transfer(&self, input: TransferGoodsInput) -> AppResult<TransferResult> {
        self.validate_quantity("quantity", input.quantity)?;
        WarehouseService::new(self.db.clone())
            .get_warehouse(input.target_warehouse_id)
            .await?;

        let mut tx = self.begin_tx().await?;

        let source = self.lock_lot(&mut tx, input.lot_id).await?;
        if source.warehouse_id == input.target_warehouse_id {
            return Err(AppError::Validation {
                field: "target_warehouse_id".to_string(),
                message: "Source and target warehouses must differ".to_string(),
            });
        }

        let available = source.available_to_promise();
        if available < input.quantity {
            return Err(AppError::InsufficientStock {
                material_id: source.material_id,
                shortage: input.quantity - available,
            });
        }

        self.deduct_lot(&mut tx, source.id, input.quantity).await?;

        // Credit or create the matching lot in the target warehouse,
        // carrying provenance for traceability
        let target_existing = sqlx::query_as::<_, InventoryLot>(&format!(
            r#"
            SELECT {LOT_COLUMNS}
            FROM inventory_lots
            WHERE material_id = $1 AND warehouse_id = $2
              AND order_number IS NOT DISTINCT FROM $3
            FOR UPDATE
            "#,
        ))
        .bind(source.material_id)
        .bind(input.target_warehouse_id)
        .bind(&source.order_number)
        .fetch_optional(&mut *tx)
        .await?;

        let target = match target_existing {
            Some(lot) => {
                sqlx::query_as::<_, InventoryLot>(&format!(
                    r#"
                    UPDATE inventory_lots
                    SET quantity = quantity + $1, updated_at = NOW()
                    WHERE id = $2
                    RETURNING {LOT_COLUMNS}
                    "#,
                ))
                .bind(input.quantity)
                .bind(lot.id)
                .fetch_one(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_as::<_, InventoryLot>(&format!(
                    r#"
                    INSERT INTO inventory_lots
                        (material_id, warehouse_id, quantity, manufacture_date,
                         expiry_date, order_number)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    RETURNING {LOT_COLUMNS}
                    "#,
                ))
                .bind(source.material_id)
                .bind(input.target_warehouse_id)
                .bind(input.quantity)
                .bind(source.manufacture_date)
                .bind(source.expiry_date)
                .bind(&source.order_number)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        let reference = format!("TRF-{}", Uuid::new_v4().as_simple());
        self.append_ledger(
            &mut tx,
            TransactionType::TransferOut,
            input.quantity,
            source.id,
            source.warehouse_id,
            Some(reference.clone()),
            input.reason.clone(),
        )
        .await?;
        self.append_ledger(
            &mut tx,
            TransactionType::TransferIn,
            input.quantity,
            target.id,
            target.warehouse_id,
            Some(reference.clone()),
            input.reason,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            "Transferred {} from lot {} to warehouse {} ({})",
            input.quantity,
            source.id,
            input.target_warehouse_id,
            reference
        );

        let source_lot = self.get_lot(source.id).await?;
        let target_lot = self.get_lot(target.id).await?;
        Ok(TransferResult {
            reference_number: reference,
            source_lot,
            target_lot,
        })
    }

    /// Stock adjustment: signed quantity change with a mandatory reason.
    pub async fn adjust(&self, input: AdjustStockInput) -> AppResult<InventoryLot> {
        if let Err(msg) = shared::validate_adjustment_change(input.quantity_change) {
            return Err(AppError::Validation {
                field: "quantity_change".to_string(),
                message: msg.to_string(),
            });
        }
        if let Err(msg) = shared::validate_reason(&input.reason) {
            return Err(AppError::Validation {
                field: "reason".to_string(),
                message: msg.to_string(),
            });
        }

        let mut tx = self.begin_tx().await?;

        let lot = self.lock_lot(&mut tx, input.lot_id).await?;

        if input.quantity_change > Decimal::ZERO {
            sqlx::query(
                "UPDATE inventory_lots SET quantity = quantity + $1, updated_at = NOW() WHERE id = $2",
            )
            .bind(input.quantity_change)
            .bind(lot.id)
            .execute(&mut *tx)
            .await?;

            self.append_ledger(
                &mut tx,
                TransactionType::AdjustmentIn,
                input.quantity_change,
                lot.id,
                lot.warehouse_id,
                None,
                Some(input.reason),
            )
            .await?;
        } else {
            let decrease = -input.quantity_change;
            let available = lot.available_to_promise();
            if available < decrease {
                return Err(AppError::InsufficientStock {
                    material_id: lot.material_id,
                    shortage: decrease - available,
                });
            }

            self.deduct_lot(&mut tx, lot.id, decrease).await?;
            self.append_ledger(
                &mut tx,
                TransactionType::AdjustmentOut,
                decrease,
                lot.id,
                lot.warehouse_id,
                None,
                Some(input.reason),
            )
            .await?;
        }

        tx.commit().await?;

        self.get_lot(input.lot_id).await
    }

    /// Get a lot by id
    pub async fn get_lot(&self, lot_id: Uuid) -> AppResult<InventoryLot> {
        sqlx::query_as::<_, InventoryLot>(&format!(
            "SELECT {LOT_COLUMNS} FROM inventory_lots WHERE id = $1"
        ))
        .bind(lot_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory lot".to_string()))
    }

    /// List lots with optional material/warehouse filters
    pub async fn list_lots(
        &self,
        filter: LotFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<InventoryLot>> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM inventory_lots
            WHERE ($1::uuid IS NULL OR material_id = $1)
              AND ($2::uuid IS NULL OR warehouse_id = $2)
            "#,
        )
        .bind(filter.material_id)
        .bind(filter.warehouse_id)
        .fetch_one(&self.db)
        .await?;

        let lots = sqlx::query_as::<_, InventoryLot>(&format!(
            r#"
            SELECT {LOT_COLUMNS}
            FROM inventory_lots
            WHERE ($1::uuid IS NULL OR material_id = $1)
              AND ($2::uuid IS NULL OR warehouse_id = $2)
            ORDER BY expiry_date ASC NULLS LAST, manufacture_date ASC NULLS LAST, id ASC
            LIMIT $3 OFFSET $4
            "#,
        ))
        .bind(filter.material_id)
        .bind(filter.warehouse_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse {
            data: lots,
            pagination: PaginationMeta::new(&pagination, total as u64),
        })
    }

    /// Ledger history for a lot, oldest first
    pub async fn get_lot_ledger(&self, lot_id: Uuid) -> AppResult<Vec<LedgerEntry>> {
        // Surface NotFound rather than an empty history for unknown lots
        self.get_lot(lot_id).await?;

        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"
            SELECT {LEDGER_COLUMNS}
            FROM inventory_transactions
            WHERE lot_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        ))
        .bind(lot_id)
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }

    /// Replay the lot's ledger and compare against the cached quantity.
    /// Audit/repair tool; live reads use the cached value.
    pub async fn verify_lot(&self, lot_id: Uuid) -> AppResult<LotVerification> {
        let lot = self.get_lot(lot_id).await?;
        let entries = self.get_lot_ledger(lot_id).await?;

        let mut history = Vec::with_capacity(entries.len());
        for entry in &entries {
            let tx_type = TransactionType::from_str(&entry.transaction_type).ok_or_else(|| {
                AppError::Internal(format!(
                    "Ledger entry {} has unknown transaction type '{}'",
                    entry.id, entry.transaction_type
                ))
            })?;
            history.push((tx_type, entry.quantity));
        }

        let ledger_balance = shared::replay_balance(&history);
        let consistent = ledger_balance == lot.quantity;

        if !consistent {
            tracing::warn!(
                "Lot {} cached quantity {} diverges from ledger balance {}",
                lot_id,
                lot.quantity,
                ledger_balance
            );
        }

        Ok(LotVerification {
            lot_id,
            cached_quantity: lot.quantity,
            ledger_balance,
            consistent,
        })
    }

    fn validate_quantity(&self, field: &str, quantity: Decimal) -> AppResult<()> {
        if let Err(msg) = shared::validate_positive_quantity(quantity) {
            return Err(AppError::Validation {
                field: field.to_string(),
                message: msg.to_string(),
            });
        }
        Ok(())
    }

    async fn lock_lot(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        lot_id: Uuid,
    ) -> AppResult<InventoryLot> {
        sqlx::query_as::<_, InventoryLot>(&format!(
            "SELECT {LOT_COLUMNS} FROM inventory_lots WHERE id = $1 FOR UPDATE"
        ))
        .bind(lot_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory lot".to_string()))
    }

    /// Lock a warehouse's lots for one material in FEFO order
    async fn lock_candidates(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        material_id: Uuid,
        warehouse_id: Uuid,
    ) -> AppResult<Vec<LotAvailability>> {
        let lots = sqlx::query_as::<_, InventoryLot>(&format!(
            r#"
            SELECT {LOT_COLUMNS}
            FROM inventory_lots
            WHERE material_id = $1 AND warehouse_id = $2
            ORDER BY expiry_date ASC NULLS LAST, manufacture_date ASC NULLS LAST, id ASC
            FOR UPDATE
            "#,
        ))
        .bind(material_id)
        .bind(warehouse_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(lots
            .into_iter()
            .map(|lot| LotAvailability {
                lot_id: lot.id,
                warehouse_id: lot.warehouse_id,
                available: lot.available_to_promise(),
                expiry_date: lot.expiry_date,
                manufacture_date: lot.manufacture_date,
            })
            .collect())
    }

    /// Guarded deduction keeping the lot above its reservation; a miss
    /// means concurrent interference and aborts the operation
    async fn deduct_lot(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        lot_id: Uuid,
        quantity: Decimal,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_lots
            SET quantity = quantity - $1, updated_at = NOW()
            WHERE id = $2 AND quantity - reserved_quantity >= $1
            "#,
        )
        .bind(quantity)
        .bind(lot_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!("Deduction conflict on lot {}", lot_id);
            return Err(AppError::DeductionConflict);
        }

        Ok(())
    }

    async fn append_ledger(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        tx_type: TransactionType,
        quantity: Decimal,
        lot_id: Uuid,
        warehouse_id: Uuid,
        reference_number: Option<String>,
        reason: Option<String>,
    ) -> AppResult<LedgerEntry> {
        let entry = sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"
            INSERT INTO inventory_transactions
                (transaction_type, quantity, lot_id, warehouse_id,
                 reference_number, reason, transaction_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {LEDGER_COLUMNS}
            "#,
        ))
        .bind(tx_type.as_str())
        .bind(quantity)
        .bind(lot_id)
        .bind(warehouse_id)
        .bind(reference_number)
        .bind(reason)
        .bind(Utc::now().date_naive())
        .fetch_one(&mut **tx)
        .await?;

        Ok(entry)
    }
}
