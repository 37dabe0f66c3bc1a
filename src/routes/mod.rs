// src/routes/mod.rs

use axum::http::StatusCode;

use crate::error::StoreError;

pub mod buildings;
pub mod call_types;
pub mod engineers;
pub mod health;
pub mod import_runs;
pub mod organizations;
pub mod reports;
pub mod system_types;
pub mod task_statuses;
pub mod tasks;

// Common error mapper
pub fn store_error(e: StoreError) -> (StatusCode, String) {
    let status = match &e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Conflict(_) | StoreError::ReferentialIntegrity { .. } => StatusCode::CONFLICT,
        StoreError::InvalidReference(_) => StatusCode::UNPROCESSABLE_ENTITY,
        StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}
