// src/routes/buildings.rs

use axum::{extract::{Path, Query, State}, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::store_error;
use crate::models::{Building, BuildingPatch};
use crate::AppState;

#[derive(Deserialize)]
pub struct ListQ {
    pub organization_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct CreateBuildingBody {
    pub name: String,
}

#[derive(Deserialize)]
pub struct MergeBody {
    pub keeper_id: Uuid,
}

#[derive(Serialize)]
pub struct Merged { pub repointed_tasks: u64 }

#[derive(Serialize)]
pub struct Deleted { pub deleted: bool }

pub async fn list_buildings(
    State(state): State<AppState>,
    Query(q): Query<ListQ>,
) -> Result<Json<Vec<Building>>, (axum::http::StatusCode, String)> {
    let rows = state
        .store
        .list_buildings(q.organization_id)
        .await
        .map_err(store_error)?;
    Ok(Json(rows))
}

pub async fn list_buildings_for_org(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<Json<Vec<Building>>, (axum::http::StatusCode, String)> {
    let rows = state
        .store
        .list_buildings(Some(org_id))
        .await
        .map_err(store_error)?;
    Ok(Json(rows))
}

pub async fn create_building(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Json(body): Json<CreateBuildingBody>,
) -> Result<Json<Building>, (axum::http::StatusCode, String)> {
    let (row, created) = state
        .store
        .upsert_building(org_id, body.name.trim())
        .await
        .map_err(store_error)?;
    if !created {
        return Err((
            axum::http::StatusCode::CONFLICT,
            format!("building '{}' already exists for this organization", row.name),
        ));
    }
    Ok(Json(row))
}

pub async fn patch_building(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<BuildingPatch>,
) -> Result<Json<Building>, (axum::http::StatusCode, String)> {
    let row = state.store.update_building(id, body).await.map_err(store_error)?;
    Ok(Json(row))
}

pub async fn delete_building(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Deleted>, (axum::http::StatusCode, String)> {
    state.store.delete_building(id).await.map_err(store_error)?;
    Ok(Json(Deleted { deleted: true }))
}

/// Folds this building into `keeper_id`: tasks are repointed, the
/// duplicate row is removed.
pub async fn merge_building(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<MergeBody>,
) -> Result<Json<Merged>, (axum::http::StatusCode, String)> {
    if id == body.keeper_id {
        return Err((
            axum::http::StatusCode::UNPROCESSABLE_ENTITY,
            "cannot merge a building into itself".into(),
        ));
    }
    let repointed = state
        .store
        .merge_building(id, body.keeper_id)
        .await
        .map_err(store_error)?;
    Ok(Json(Merged { repointed_tasks: repointed }))
}
