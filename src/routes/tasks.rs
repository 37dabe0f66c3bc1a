// src/routes/tasks.rs

use axum::{extract::{Path, Query, State}, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::store_error;
use crate::models::{NewServiceTask, ServiceTask, TaskDetail, TaskFilter, TaskPage, TaskPatch};
use crate::AppState;

#[derive(Deserialize)]
pub struct ListQ {
    /// Status by display name, e.g. "Completed".
    pub status: Option<String>,
    pub organization_id: Option<Uuid>,
    pub assigned_engineer_id: Option<Uuid>,
    pub system_type_id: Option<Uuid>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Serialize)]
pub struct Deleted { pub deleted: bool }

pub async fn list_tasks(
    State(state): State<AppState>,
    Query(q): Query<ListQ>,
) -> Result<Json<TaskPage>, (axum::http::StatusCode, String)> {
    let mut filter = TaskFilter {
        organization_id: q.organization_id,
        assigned_engineer_id: q.assigned_engineer_id,
        system_type_id: q.system_type_id,
        search: q.search,
        limit: q.limit.unwrap_or(50).clamp(1, 500),
        offset: q.offset.unwrap_or(0).max(0),
        ..TaskFilter::default()
    };
    if let Some(name) = q.status {
        let statuses = state.store.list_task_statuses().await.map_err(store_error)?;
        match statuses.into_iter().find(|s| s.name == name) {
            Some(status) => filter.status_id = Some(status.id),
            // Unknown status matches nothing.
            None => return Ok(Json(TaskPage { items: vec![], total: 0 })),
        }
    }
    let page = state.store.list_tasks(&filter).await.map_err(store_error)?;
    Ok(Json(page))
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskDetail>, (axum::http::StatusCode, String)> {
    let row = state.store.get_task(id).await.map_err(store_error)?;
    Ok(Json(row))
}

pub async fn create_task(
    State(state): State<AppState>,
    Json(body): Json<NewServiceTask>,
) -> Result<Json<ServiceTask>, (axum::http::StatusCode, String)> {
    let row = state.store.insert_task(body).await.map_err(store_error)?;
    Ok(Json(row))
}

pub async fn patch_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<TaskPatch>,
) -> Result<Json<ServiceTask>, (axum::http::StatusCode, String)> {
    let row = state.store.update_task(id, body).await.map_err(store_error)?;
    Ok(Json(row))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Deleted>, (axum::http::StatusCode, String)> {
    state.store.delete_task(id).await.map_err(store_error)?;
    Ok(Json(Deleted { deleted: true }))
}
