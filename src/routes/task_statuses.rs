// src/routes/task_statuses.rs

// Statuses are a canonical set the dashboard keys its buckets on, so
// there is no delete here.

use axum::{extract::{Path, State}, Json};
use serde::Deserialize;
use uuid::Uuid;

use super::store_error;
use crate::models::{TaskStatus, TaskStatusPatch};
use crate::AppState;

#[derive(Deserialize)]
pub struct CreateStatusBody {
    pub name: String,
    pub color: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

pub async fn list_statuses(
    State(state): State<AppState>,
) -> Result<Json<Vec<TaskStatus>>, (axum::http::StatusCode, String)> {
    let rows = state.store.list_task_statuses().await.map_err(store_error)?;
    Ok(Json(rows))
}

pub async fn create_status(
    State(state): State<AppState>,
    Json(body): Json<CreateStatusBody>,
) -> Result<Json<TaskStatus>, (axum::http::StatusCode, String)> {
    let (row, created) = state
        .store
        .upsert_task_status(body.name.trim(), body.color.as_deref(), body.sort_order)
        .await
        .map_err(store_error)?;
    if !created {
        return Err((
            axum::http::StatusCode::CONFLICT,
            format!("status '{}' already exists", row.name),
        ));
    }
    Ok(Json(row))
}

pub async fn patch_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<TaskStatusPatch>,
) -> Result<Json<TaskStatus>, (axum::http::StatusCode, String)> {
    let row = state.store.update_task_status(id, body).await.map_err(store_error)?;
    Ok(Json(row))
}
