// src/routes/organizations.rs

use axum::{extract::{Path, State}, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::store_error;
use crate::models::{Organization, OrganizationPatch};
use crate::AppState;

#[derive(Deserialize)]
pub struct CreateOrgBody {
    pub name: String,
    pub name_en: Option<String>,
}

#[derive(Serialize)]
pub struct Deleted { pub deleted: bool }

pub async fn list_orgs(
    State(state): State<AppState>,
) -> Result<Json<Vec<Organization>>, (axum::http::StatusCode, String)> {
    let rows = state.store.list_organizations().await.map_err(store_error)?;
    Ok(Json(rows))
}

pub async fn get_org(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Organization>, (axum::http::StatusCode, String)> {
    let row = state.store.get_organization(id).await.map_err(store_error)?;
    Ok(Json(row))
}

pub async fn create_org(
    State(state): State<AppState>,
    Json(body): Json<CreateOrgBody>,
) -> Result<Json<Organization>, (axum::http::StatusCode, String)> {
    let (row, created) = state
        .store
        .upsert_organization(body.name.trim(), body.name_en.as_deref())
        .await
        .map_err(store_error)?;
    if !created {
        return Err((
            axum::http::StatusCode::CONFLICT,
            format!("organization '{}' already exists", row.name),
        ));
    }
    Ok(Json(row))
}

pub async fn patch_org(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<OrganizationPatch>,
) -> Result<Json<Organization>, (axum::http::StatusCode, String)> {
    let row = state
        .store
        .update_organization(id, body)
        .await
        .map_err(store_error)?;
    Ok(Json(row))
}

pub async fn delete_org(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Deleted>, (axum::http::StatusCode, String)> {
    state.store.delete_organization(id).await.map_err(store_error)?;
    Ok(Json(Deleted { deleted: true }))
}
