// src/routes/engineers.rs

use axum::{extract::{Path, Query, State}, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::store_error;
use crate::models::{Engineer, EngineerPatch};
use crate::AppState;

#[derive(Deserialize)]
pub struct ListQ {
    pub active: Option<bool>,
}

#[derive(Deserialize)]
pub struct CreateEngineerBody {
    pub full_name: String,
    pub employee_code: Option<String>,
}

#[derive(Deserialize)]
pub struct MergeBody {
    pub keeper_id: Uuid,
}

#[derive(Serialize)]
pub struct Merged { pub repointed_tasks: u64 }

#[derive(Serialize)]
pub struct Deleted { pub deleted: bool }

pub async fn list_engineers(
    State(state): State<AppState>,
    Query(q): Query<ListQ>,
) -> Result<Json<Vec<Engineer>>, (axum::http::StatusCode, String)> {
    let mut rows = state.store.list_engineers().await.map_err(store_error)?;
    if let Some(active) = q.active {
        rows.retain(|e| e.is_active == active);
    }
    Ok(Json(rows))
}

pub async fn create_engineer(
    State(state): State<AppState>,
    Json(body): Json<CreateEngineerBody>,
) -> Result<Json<Engineer>, (axum::http::StatusCode, String)> {
    let (row, created) = state
        .store
        .upsert_engineer(body.full_name.trim(), body.employee_code.as_deref())
        .await
        .map_err(store_error)?;
    if !created {
        return Err((
            axum::http::StatusCode::CONFLICT,
            format!("engineer '{}' already exists", row.full_name),
        ));
    }
    Ok(Json(row))
}

pub async fn patch_engineer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<EngineerPatch>,
) -> Result<Json<Engineer>, (axum::http::StatusCode, String)> {
    let row = state.store.update_engineer(id, body).await.map_err(store_error)?;
    Ok(Json(row))
}

pub async fn delete_engineer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Deleted>, (axum::http::StatusCode, String)> {
    state.store.delete_engineer(id).await.map_err(store_error)?;
    Ok(Json(Deleted { deleted: true }))
}

pub async fn merge_engineer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<MergeBody>,
) -> Result<Json<Merged>, (axum::http::StatusCode, String)> {
    if id == body.keeper_id {
        return Err((
            axum::http::StatusCode::UNPROCESSABLE_ENTITY,
            "cannot merge an engineer into itself".into(),
        ));
    }
    let repointed = state
        .store
        .merge_engineer(id, body.keeper_id)
        .await
        .map_err(store_error)?;
    Ok(Json(Merged { repointed_tasks: repointed }))
}
