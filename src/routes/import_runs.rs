// src/routes/import_runs.rs

use axum::{extract::State, Json};

use super::store_error;
use crate::models::ImportRun;
use crate::AppState;

pub async fn list_import_runs(
    State(state): State<AppState>,
) -> Result<Json<Vec<ImportRun>>, (axum::http::StatusCode, String)> {
    let rows = state.store.list_import_runs().await.map_err(store_error)?;
    Ok(Json(rows))
}
