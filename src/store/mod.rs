// src/store/mod.rs

//! Persistence contract. The API server and the import/repair tooling
//! only ever talk to [`Store`]; `PgStore` backs production and
//! `MemStore` backs the test suite.

use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    Building, BuildingPatch, CallType, CallTypePatch, Engineer, EngineerPatch, ImportRun,
    NewImportRun, NewServiceTask, Organization, OrganizationPatch, ServiceTask, SystemType,
    SystemTypePatch, TaskDetail, TaskFacts, TaskFilter, TaskIdentity, TaskKey, TaskPage,
    TaskPatch, TaskStatus, TaskStatusPatch,
};

pub mod mem;
pub mod pg;

pub use mem::MemStore;
pub use pg::PgStore;

/// Upsert calls return the canonical row plus whether this call created
/// it. First write wins: an existing row is returned untouched.
#[async_trait]
pub trait Store: Send + Sync {
    // ── organizations ──
    async fn upsert_organization(
        &self,
        name: &str,
        name_en: Option<&str>,
    ) -> Result<(Organization, bool), StoreError>;
    async fn list_organizations(&self) -> Result<Vec<Organization>, StoreError>;
    async fn get_organization(&self, id: Uuid) -> Result<Organization, StoreError>;
    async fn update_organization(
        &self,
        id: Uuid,
        patch: OrganizationPatch,
    ) -> Result<Organization, StoreError>;
    async fn delete_organization(&self, id: Uuid) -> Result<(), StoreError>;

    // ── buildings ──
    async fn upsert_building(
        &self,
        organization_id: Uuid,
        name: &str,
    ) -> Result<(Building, bool), StoreError>;
    async fn list_buildings(
        &self,
        organization_id: Option<Uuid>,
    ) -> Result<Vec<Building>, StoreError>;
    async fn update_building(&self, id: Uuid, patch: BuildingPatch)
        -> Result<Building, StoreError>;
    async fn delete_building(&self, id: Uuid) -> Result<(), StoreError>;
    /// Repoints every task referencing `duplicate` at `keeper`, then
    /// deletes `duplicate`. Returns how many tasks were repointed.
    async fn merge_building(&self, duplicate: Uuid, keeper: Uuid) -> Result<u64, StoreError>;

    // ── engineers ──
    async fn upsert_engineer(
        &self,
        full_name: &str,
        employee_code: Option<&str>,
    ) -> Result<(Engineer, bool), StoreError>;
    async fn list_engineers(&self) -> Result<Vec<Engineer>, StoreError>;
    async fn update_engineer(&self, id: Uuid, patch: EngineerPatch)
        -> Result<Engineer, StoreError>;
    async fn delete_engineer(&self, id: Uuid) -> Result<(), StoreError>;
    async fn merge_engineer(&self, duplicate: Uuid, keeper: Uuid) -> Result<u64, StoreError>;

    // ── system types ──
    async fn upsert_system_type(&self, name: &str) -> Result<(SystemType, bool), StoreError>;
    async fn list_system_types(&self) -> Result<Vec<SystemType>, StoreError>;
    async fn update_system_type(
        &self,
        id: Uuid,
        patch: SystemTypePatch,
    ) -> Result<SystemType, StoreError>;
    async fn delete_system_type(&self, id: Uuid) -> Result<(), StoreError>;

    // ── call types ──
    async fn upsert_call_type(&self, name: &str) -> Result<(CallType, bool), StoreError>;
    async fn list_call_types(&self) -> Result<Vec<CallType>, StoreError>;
    async fn update_call_type(&self, id: Uuid, patch: CallTypePatch)
        -> Result<CallType, StoreError>;
    async fn delete_call_type(&self, id: Uuid) -> Result<(), StoreError>;

    // ── task statuses (canonical set; no delete) ──
    async fn upsert_task_status(
        &self,
        name: &str,
        color: Option<&str>,
        sort_order: i32,
    ) -> Result<(TaskStatus, bool), StoreError>;
    async fn list_task_statuses(&self) -> Result<Vec<TaskStatus>, StoreError>;
    async fn update_task_status(
        &self,
        id: Uuid,
        patch: TaskStatusPatch,
    ) -> Result<TaskStatus, StoreError>;

    // ── service tasks ──
    async fn insert_task(&self, task: NewServiceTask) -> Result<ServiceTask, StoreError>;
    /// Inserts a chunk atomically: either every task lands or none do.
    async fn insert_tasks(&self, tasks: &[NewServiceTask]) -> Result<u64, StoreError>;
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<TaskPage, StoreError>;
    async fn get_task(&self, id: Uuid) -> Result<TaskDetail, StoreError>;
    async fn update_task(&self, id: Uuid, patch: TaskPatch) -> Result<ServiceTask, StoreError>;
    async fn delete_task(&self, id: Uuid) -> Result<(), StoreError>;
    async fn delete_tasks(&self, ids: &[Uuid]) -> Result<u64, StoreError>;
    async fn existing_task_keys(&self) -> Result<HashSet<TaskKey>, StoreError>;
    async fn task_identities(&self) -> Result<Vec<TaskIdentity>, StoreError>;
    async fn task_facts(&self) -> Result<Vec<TaskFacts>, StoreError>;

    // ── import provenance ──
    async fn record_import_run(&self, run: NewImportRun) -> Result<ImportRun, StoreError>;
    async fn list_import_runs(&self) -> Result<Vec<ImportRun>, StoreError>;
}
