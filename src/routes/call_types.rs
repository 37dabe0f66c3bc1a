// src/routes/call_types.rs

use axum::{extract::{Path, State}, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::store_error;
use crate::models::{CallType, CallTypePatch};
use crate::AppState;

#[derive(Deserialize)]
pub struct CreateCallTypeBody {
    pub name: String,
}

#[derive(Serialize)]
pub struct Deleted { pub deleted: bool }

pub async fn list_call_types(
    State(state): State<AppState>,
) -> Result<Json<Vec<CallType>>, (axum::http::StatusCode, String)> {
    let rows = state.store.list_call_types().await.map_err(store_error)?;
    Ok(Json(rows))
}

pub async fn create_call_type(
    State(state): State<AppState>,
    Json(body): Json<CreateCallTypeBody>,
) -> Result<Json<CallType>, (axum::http::StatusCode, String)> {
    let (row, created) = state
        .store
        .upsert_call_type(body.name.trim())
        .await
        .map_err(store_error)?;
    if !created {
        return Err((
            axum::http::StatusCode::CONFLICT,
            format!("call type '{}' already exists", row.name),
        ));
    }
    Ok(Json(row))
}

pub async fn patch_call_type(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CallTypePatch>,
) -> Result<Json<CallType>, (axum::http::StatusCode, String)> {
    let row = state.store.update_call_type(id, body).await.map_err(store_error)?;
    Ok(Json(row))
}

pub async fn delete_call_type(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Deleted>, (axum::http::StatusCode, String)> {
    state.store.delete_call_type(id).await.map_err(store_error)?;
    Ok(Json(Deleted { deleted: true }))
}
