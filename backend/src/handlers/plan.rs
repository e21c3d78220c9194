//! HTTP handlers for production plan endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{PaginatedResponse, Pagination};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::plan::{
    CancelPlanInput, CompletePlanInput, CreatePlanInput, PlanService, PlanWithAllocations,
    ProductionPlan,
};
use crate::services::requirement::{RequirementService, RequirementSummary};
use crate::AppState;

fn plan_service(state: &AppState) -> PlanService {
    PlanService::new(state.db.clone(), state.config.engine.lock_timeout_ms)
}

/// Query parameters for listing plans
#[derive(Debug, Deserialize)]
pub struct ListPlansQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Query parameters for requirement preview
#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    /// Override the plan's quantity; defaults to the planned quantity
    pub quantity: Option<Decimal>,
}

/// Create a draft production plan
pub async fn create_plan(
    State(state): State<AppState>,
    Json(input): Json<CreatePlanInput>,
) -> AppResult<Json<ProductionPlan>> {
    let plan = plan_service(&state).create_plan(input).await?;
    Ok(Json(plan))
}

/// List production plans
pub async fn list_plans(
    State(state): State<AppState>,
    Query(query): Query<ListPlansQuery>,
) -> AppResult<Json<PaginatedResponse<ProductionPlan>>> {
    let pagination = Pagination {
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    };
    let plans = plan_service(&state)
        .list_plans(query.status, pagination)
        .await?;
    Ok(Json(plans))
}

/// Get a plan with its allocations
pub async fn get_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<Uuid>,
) -> AppResult<Json<PlanWithAllocations>> {
    let plan = plan_service(&state).get_plan(plan_id).await?;
    Ok(Json(plan))
}

/// Preview material requirements and availability for a plan (read-only)
pub async fn preview_requirements(
    State(state): State<AppState>,
    Path(plan_id): Path<Uuid>,
    Query(query): Query<PreviewQuery>,
) -> AppResult<Json<RequirementSummary>> {
    let plan = plan_service(&state).get_plan(plan_id).await?;
    let quantity = query.quantity.unwrap_or(plan.plan.planned_quantity);
    let summary = RequirementService::new(state.db.clone())
        .preview(plan.plan.product_id, quantity)
        .await?;
    Ok(Json(summary))
}

/// Confirm a draft plan, reserving stock for its requirements
pub async fn confirm_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<Uuid>,
) -> AppResult<Json<PlanWithAllocations>> {
    let plan = plan_service(&state).confirm(plan_id).await?;
    Ok(Json(plan))
}

/// Start a confirmed plan, deducting all reserved stock
pub async fn start_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<Uuid>,
) -> AppResult<Json<PlanWithAllocations>> {
    let plan = plan_service(&state).start(plan_id).await?;
    Ok(Json(plan))
}

/// Complete a started plan with the actual produced quantity
pub async fn complete_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<Uuid>,
    Json(input): Json<CompletePlanInput>,
) -> AppResult<Json<PlanWithAllocations>> {
    let plan = plan_service(&state).complete(plan_id, input).await?;
    Ok(Json(plan))
}

/// Cancel a draft or confirmed plan, releasing any reservations
pub async fn cancel_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<Uuid>,
    Json(input): Json<CancelPlanInput>,
) -> AppResult<Json<PlanWithAllocations>> {
    let plan = plan_service(&state).cancel(plan_id, input).await?;
    Ok(Json(plan))
}
