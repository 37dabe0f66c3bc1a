// src/routes/system_types.rs

use axum::{extract::{Path, State}, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::store_error;
use crate::models::{SystemType, SystemTypePatch};
use crate::AppState;

#[derive(Deserialize)]
pub struct CreateSystemTypeBody {
    pub name: String,
}

#[derive(Serialize)]
pub struct Deleted { pub deleted: bool }

pub async fn list_system_types(
    State(state): State<AppState>,
) -> Result<Json<Vec<SystemType>>, (axum::http::StatusCode, String)> {
    let rows = state.store.list_system_types().await.map_err(store_error)?;
    Ok(Json(rows))
}

pub async fn create_system_type(
    State(state): State<AppState>,
    Json(body): Json<CreateSystemTypeBody>,
) -> Result<Json<SystemType>, (axum::http::StatusCode, String)> {
    let (row, created) = state
        .store
        .upsert_system_type(body.name.trim())
        .await
        .map_err(store_error)?;
    if !created {
        return Err((
            axum::http::StatusCode::CONFLICT,
            format!("system type '{}' already exists", row.name),
        ));
    }
    Ok(Json(row))
}

pub async fn patch_system_type(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SystemTypePatch>,
) -> Result<Json<SystemType>, (axum::http::StatusCode, String)> {
    let row = state.store.update_system_type(id, body).await.map_err(store_error)?;
    Ok(Json(row))
}

pub async fn delete_system_type(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Deleted>, (axum::http::StatusCode, String)> {
    state.store.delete_system_type(id).await.map_err(store_error)?;
    Ok(Json(Deleted { deleted: true }))
}
