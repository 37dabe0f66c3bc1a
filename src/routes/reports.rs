// src/routes/reports.rs

// Each report pulls the joined fact rows once and aggregates in
// process; see crate::reports for the math.

use axum::{extract::State, Json};
use chrono::Utc;

use super::store_error;
use crate::reports::{
    self, CategoryStats, DashboardKpis, EngineerPerformance, MonthlyStats, OrganizationStats,
    StatusSlice,
};
use crate::AppState;

pub async fn dashboard(
    State(state): State<AppState>,
) -> Result<Json<DashboardKpis>, (axum::http::StatusCode, String)> {
    let facts = state.store.task_facts().await.map_err(store_error)?;
    Ok(Json(reports::dashboard_kpis(&facts, Utc::now())))
}

pub async fn monthly(
    State(state): State<AppState>,
) -> Result<Json<Vec<MonthlyStats>>, (axum::http::StatusCode, String)> {
    let facts = state.store.task_facts().await.map_err(store_error)?;
    Ok(Json(reports::monthly_stats(&facts)))
}

pub async fn engineers(
    State(state): State<AppState>,
) -> Result<Json<Vec<EngineerPerformance>>, (axum::http::StatusCode, String)> {
    let facts = state.store.task_facts().await.map_err(store_error)?;
    Ok(Json(reports::engineer_performance(&facts)))
}

pub async fn system_types(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryStats>>, (axum::http::StatusCode, String)> {
    let facts = state.store.task_facts().await.map_err(store_error)?;
    Ok(Json(reports::system_type_stats(&facts)))
}

pub async fn call_types(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryStats>>, (axum::http::StatusCode, String)> {
    let facts = state.store.task_facts().await.map_err(store_error)?;
    Ok(Json(reports::call_type_stats(&facts)))
}

pub async fn organizations(
    State(state): State<AppState>,
) -> Result<Json<Vec<OrganizationStats>>, (axum::http::StatusCode, String)> {
    let facts = state.store.task_facts().await.map_err(store_error)?;
    Ok(Json(reports::organization_stats(&facts)))
}

pub async fn status_distribution(
    State(state): State<AppState>,
) -> Result<Json<Vec<StatusSlice>>, (axum::http::StatusCode, String)> {
    let facts = state.store.task_facts().await.map_err(store_error)?;
    Ok(Json(reports::status_distribution(&facts)))
}
