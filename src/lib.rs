// src/lib.rs

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod db;
pub mod error;
pub mod ingest;
pub mod models;
pub mod recon;
pub mod reports;
pub mod routes;
pub mod store;

use store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
}

/// Builds the full API router over any [`Store`] implementation.
pub fn app(state: AppState) -> Router {
    // Very permissive CORS for local dev (tighten for prod)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // health
        .route("/health", get(routes::health::health))
        // organizations
        .route(
            "/api/v1/organizations",
            post(routes::organizations::create_org).get(routes::organizations::list_orgs),
        )
        .route(
            "/api/v1/organizations/:id",
            get(routes::organizations::get_org)
                .patch(routes::organizations::patch_org)
                .delete(routes::organizations::delete_org),
        )
        // buildings
        .route(
            "/api/v1/organizations/:org_id/buildings",
            post(routes::buildings::create_building)
                .get(routes::buildings::list_buildings_for_org),
        )
        .route("/api/v1/buildings", get(routes::buildings::list_buildings))
        .route(
            "/api/v1/buildings/:id",
            axum::routing::patch(routes::buildings::patch_building)
                .delete(routes::buildings::delete_building),
        )
        .route(
            "/api/v1/buildings/:id/merge",
            post(routes::buildings::merge_building),
        )
        // engineers
        .route(
            "/api/v1/engineers",
            post(routes::engineers::create_engineer).get(routes::engineers::list_engineers),
        )
        .route(
            "/api/v1/engineers/:id",
            axum::routing::patch(routes::engineers::patch_engineer)
                .delete(routes::engineers::delete_engineer),
        )
        .route(
            "/api/v1/engineers/:id/merge",
            post(routes::engineers::merge_engineer),
        )
        // system types
        .route(
            "/api/v1/system-types",
            post(routes::system_types::create_system_type)
                .get(routes::system_types::list_system_types),
        )
        .route(
            "/api/v1/system-types/:id",
            axum::routing::patch(routes::system_types::patch_system_type)
                .delete(routes::system_types::delete_system_type),
        )
        // call types
        .route(
            "/api/v1/call-types",
            post(routes::call_types::create_call_type).get(routes::call_types::list_call_types),
        )
        .route(
            "/api/v1/call-types/:id",
            axum::routing::patch(routes::call_types::patch_call_type)
                .delete(routes::call_types::delete_call_type),
        )
        // task statuses
        .route(
            "/api/v1/task-statuses",
            post(routes::task_statuses::create_status).get(routes::task_statuses::list_statuses),
        )
        .route(
            "/api/v1/task-statuses/:id",
            axum::routing::patch(routes::task_statuses::patch_status),
        )
        // tasks
        .route(
            "/api/v1/tasks",
            post(routes::tasks::create_task).get(routes::tasks::list_tasks),
        )
        .route(
            "/api/v1/tasks/:id",
            get(routes::tasks::get_task)
                .patch(routes::tasks::patch_task)
                .delete(routes::tasks::delete_task),
        )
        // reports
        .route("/api/v1/reports/dashboard", get(routes::reports::dashboard))
        .route("/api/v1/reports/monthly", get(routes::reports::monthly))
        .route("/api/v1/reports/engineers", get(routes::reports::engineers))
        .route(
            "/api/v1/reports/system-types",
            get(routes::reports::system_types),
        )
        .route(
            "/api/v1/reports/call-types",
            get(routes::reports::call_types),
        )
        .route(
            "/api/v1/reports/organizations",
            get(routes::reports::organizations),
        )
        .route(
            "/api/v1/reports/status-distribution",
            get(routes::reports::status_distribution),
        )
        // import provenance
        .route(
            "/api/v1/import-runs",
            get(routes::import_runs::list_import_runs),
        )
        // state & middleware
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
