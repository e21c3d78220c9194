//! HTTP handlers for stock movement and lot endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use shared::{PaginatedResponse, Pagination};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::stock::{
    AdjustStockInput, InventoryLot, IssueGoodsInput, LedgerEntry, LotFilter, LotVerification,
    ReceiveGoodsInput, StockService, TransferGoodsInput, TransferResult,
};
use crate::AppState;

fn stock_service(state: &AppState) -> StockService {
    StockService::new(state.db.clone(), state.config.engine.lock_timeout_ms)
}

/// Query parameters for listing lots
#[derive(Debug, Deserialize)]
pub struct ListLotsQuery {
    pub material_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Record a goods receipt
pub async fn receive_goods(
    State(state): State<AppState>,
    Json(input): Json<ReceiveGoodsInput>,
) -> AppResult<Json<InventoryLot>> {
    let lot = stock_service(&state).receive(input).await?;
    Ok(Json(lot))
}

/// Record a goods issue
pub async fn issue_goods(
    State(state): State<AppState>,
    Json(input): Json<IssueGoodsInput>,
) -> AppResult<Json<Vec<LedgerEntry>>> {
    let entries = stock_service(&state).issue(input).await?;
    Ok(Json(entries))
}

/// Transfer stock between warehouses
pub async fn transfer_goods(
    State(state): State<AppState>,
    Json(input): Json<TransferGoodsInput>,
) -> AppResult<Json<TransferResult>> {
    let result = stock_service(&state).transfer(input).await?;
    Ok(Json(result))
}

/// Record a stock adjustment
pub async fn adjust_stock(
    State(state): State<AppState>,
    Json(input): Json<AdjustStockInput>,
) -> AppResult<Json<InventoryLot>> {
    let lot = stock_service(&state).adjust(input).await?;
    Ok(Json(lot))
}

/// List inventory lots
pub async fn list_lots(
    State(state): State<AppState>,
    Query(query): Query<ListLotsQuery>,
) -> AppResult<Json<PaginatedResponse<InventoryLot>>> {
    let filter = LotFilter {
        material_id: query.material_id,
        warehouse_id: query.warehouse_id,
    };
    let pagination = Pagination {
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    };
    let lots = stock_service(&state).list_lots(filter, pagination).await?;
    Ok(Json(lots))
}

/// Get a lot by id
pub async fn get_lot(
    State(state): State<AppState>,
    Path(lot_id): Path<Uuid>,
) -> AppResult<Json<InventoryLot>> {
    let lot = stock_service(&state).get_lot(lot_id).await?;
    Ok(Json(lot))
}

/// Get a lot's ledger history
pub async fn get_lot_ledger(
    State(state): State<AppState>,
    Path(lot_id): Path<Uuid>,
) -> AppResult<Json<Vec<LedgerEntry>>> {
    let entries = stock_service(&state).get_lot_ledger(lot_id).await?;
    Ok(Json(entries))
}

/// Replay a lot's ledger against its cached quantity
pub async fn verify_lot(
    State(state): State<AppState>,
    Path(lot_id): Path<Uuid>,
) -> AppResult<Json<LotVerification>> {
    let verification = stock_service(&state).verify_lot(lot_id).await?;
    Ok(Json(verification))
}
