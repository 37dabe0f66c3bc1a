// src/store/mem.rs

//! In-memory [`Store`] with the same observable behaviour as the
//! PostgreSQL implementation: first-write-wins upserts, identity-tuple
//! uniqueness, referential delete checks, atomic chunk inserts.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    resolution_days, Building, BuildingPatch, CallType, CallTypePatch, Engineer, EngineerPatch,
    ImportRun, NewImportRun, NewServiceTask, Organization, OrganizationPatch, ServiceTask,
    SystemType, SystemTypePatch, TaskDetail, TaskFacts, TaskFilter, TaskIdentity, TaskKey,
    TaskPage, TaskPatch, TaskStatus, TaskStatusPatch, STATUS_SEED,
};

use super::Store;

#[derive(Default)]
struct Inner {
    organizations: Vec<Organization>,
    buildings: Vec<Building>,
    engineers: Vec<Engineer>,
    system_types: Vec<SystemType>,
    call_types: Vec<CallType>,
    task_statuses: Vec<TaskStatus>,
    tasks: Vec<ServiceTask>,
    import_runs: Vec<ImportRun>,
}

#[derive(Clone, Default)]
pub struct MemStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemStore {
    /// Empty store with the canonical statuses already seeded, exactly
    /// as `schema.sql` leaves a fresh database.
    pub fn new() -> Self {
        let mut inner = Inner::default();
        for (name, color, sort_order) in STATUS_SEED {
            inner.task_statuses.push(TaskStatus {
                id: Uuid::new_v4(),
                name: name.to_string(),
                color: Some(color.to_string()),
                sort_order,
                created_at: Utc::now(),
            });
        }
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }
}

fn validate_task_refs(inner: &Inner, task: &NewServiceTask) -> Result<(), StoreError> {
    if !inner.task_statuses.iter().any(|s| s.id == task.status_id) {
        return Err(StoreError::InvalidReference(format!(
            "status_id {}",
            task.status_id
        )));
    }
    let checks: [(&str, Option<Uuid>, bool); 5] = [
        (
            "organization_id",
            task.organization_id,
            task.organization_id
                .is_some_and(|id| inner.organizations.iter().any(|o| o.id == id)),
        ),
        (
            "building_id",
            task.building_id,
            task.building_id
                .is_some_and(|id| inner.buildings.iter().any(|b| b.id == id)),
        ),
        (
            "assigned_engineer_id",
            task.assigned_engineer_id,
            task.assigned_engineer_id
                .is_some_and(|id| inner.engineers.iter().any(|e| e.id == id)),
        ),
        (
            "system_type_id",
            task.system_type_id,
            task.system_type_id
                .is_some_and(|id| inner.system_types.iter().any(|s| s.id == id)),
        ),
        (
            "call_type_id",
            task.call_type_id,
            task.call_type_id
                .is_some_and(|id| inner.call_types.iter().any(|c| c.id == id)),
        ),
    ];
    for (field, value, ok) in checks {
        if let Some(id) = value {
            if !ok {
                return Err(StoreError::InvalidReference(format!("{field} {id}")));
            }
        }
    }
    Ok(())
}

fn stored_task(task: NewServiceTask) -> ServiceTask {
    let now = Utc::now();
    ServiceTask {
        id: Uuid::new_v4(),
        organization_id: task.organization_id,
        building_id: task.building_id,
        assigned_engineer_id: task.assigned_engineer_id,
        status_id: task.status_id,
        system_type_id: task.system_type_id,
        call_type_id: task.call_type_id,
        description: task.description,
        engineering_comment: task.engineering_comment,
        akt_number: task.akt_number,
        received_at: task.received_at,
        completed_at: task.completed_at,
        original_path: task.original_path,
        created_at: now,
        updated_at: now,
    }
}

fn task_detail(inner: &Inner, task: &ServiceTask) -> TaskDetail {
    let name_of_org = |id: Option<Uuid>| {
        id.and_then(|id| inner.organizations.iter().find(|o| o.id == id))
            .map(|o| o.name.clone())
    };
    TaskDetail {
        id: task.id,
        organization_id: task.organization_id,
        building_id: task.building_id,
        assigned_engineer_id: task.assigned_engineer_id,
        status_id: task.status_id,
        system_type_id: task.system_type_id,
        call_type_id: task.call_type_id,
        description: task.description.clone(),
        engineering_comment: task.engineering_comment.clone(),
        akt_number: task.akt_number,
        received_at: task.received_at,
        completed_at: task.completed_at,
        original_path: task.original_path.clone(),
        created_at: task.created_at,
        updated_at: task.updated_at,
        resolution_days: task.resolution_days(),
        organization_name: name_of_org(task.organization_id),
        building_name: task
            .building_id
            .and_then(|id| inner.buildings.iter().find(|b| b.id == id))
            .map(|b| b.name.clone()),
        engineer_name: task
            .assigned_engineer_id
            .and_then(|id| inner.engineers.iter().find(|e| e.id == id))
            .map(|e| e.full_name.clone()),
        status_name: inner
            .task_statuses
            .iter()
            .find(|s| s.id == task.status_id)
            .map(|s| s.name.clone()),
        system_type_name: task
            .system_type_id
            .and_then(|id| inner.system_types.iter().find(|s| s.id == id))
            .map(|s| s.name.clone()),
        call_type_name: task
            .call_type_id
            .and_then(|id| inner.call_types.iter().find(|c| c.id == id))
            .map(|c| c.name.clone()),
    }
}

fn matches(task: &ServiceTask, filter: &TaskFilter) -> bool {
    if filter.status_id.is_some_and(|id| id != task.status_id) {
        return false;
    }
    if let Some(org) = filter.organization_id {
        if task.organization_id != Some(org) {
            return false;
        }
    }
    if let Some(engineer) = filter.assigned_engineer_id {
        if task.assigned_engineer_id != Some(engineer) {
            return false;
        }
    }
    if let Some(system) = filter.system_type_id {
        if task.system_type_id != Some(system) {
            return false;
        }
    }
    if let Some(needle) = &filter.search {
        let needle = needle.to_lowercase();
        let hit = [&task.description, &task.engineering_comment]
            .into_iter()
            .flatten()
            .any(|text| text.to_lowercase().contains(&needle));
        if !hit {
            return false;
        }
    }
    true
}

#[async_trait]
impl Store for MemStore {
    // ── organizations ──
    async fn upsert_organization(
        &self,
        name: &str,
        name_en: Option<&str>,
    ) -> Result<(Organization, bool), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.organizations.iter().find(|o| o.name == name) {
            return Ok((existing.clone(), false));
        }
        let org = Organization {
            id: Uuid::new_v4(),
            name: name.to_string(),
            name_en: name_en.map(str::to_string),
            created_at: Utc::now(),
        };
        inner.organizations.push(org.clone());
        Ok((org, true))
    }

    async fn list_organizations(&self) -> Result<Vec<Organization>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rows = inner.organizations.clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn get_organization(&self, id: Uuid) -> Result<Organization, StoreError> {
        let inner = self.inner.lock().await;
        inner
            .organizations
            .iter()
            .find(|o| o.id == id)
            .cloned()
            .ok_or(StoreError::NotFound("organization"))
    }

    async fn update_organization(
        &self,
        id: Uuid,
        patch: OrganizationPatch,
    ) -> Result<Organization, StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(name) = &patch.name {
            if inner
                .organizations
                .iter()
                .any(|o| o.id != id && &o.name == name)
            {
                return Err(StoreError::Conflict(format!("organization \"{name}\"")));
            }
        }
        let org = inner
            .organizations
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(StoreError::NotFound("organization"))?;
        if let Some(name) = patch.name {
            org.name = name;
        }
        if let Some(name_en) = patch.name_en {
            org.name_en = Some(name_en);
        }
        Ok(org.clone())
    }

    async fn delete_organization(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.organizations.iter().any(|o| o.id == id) {
            return Err(StoreError::NotFound("organization"));
        }
        let references = inner
            .buildings
            .iter()
            .filter(|b| b.organization_id == id)
            .count()
            + inner
                .tasks
                .iter()
                .filter(|t| t.organization_id == Some(id))
                .count();
        if references > 0 {
            return Err(StoreError::ReferentialIntegrity {
                entity: "organization",
                id,
                references: references as i64,
            });
        }
        inner.organizations.retain(|o| o.id != id);
        Ok(())
    }

    // ── buildings ──
    async fn upsert_building(
        &self,
        organization_id: Uuid,
        name: &str,
    ) -> Result<(Building, bool), StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.organizations.iter().any(|o| o.id == organization_id) {
            return Err(StoreError::InvalidReference(format!(
                "organization_id {organization_id}"
            )));
        }
        if let Some(existing) = inner
            .buildings
            .iter()
            .find(|b| b.organization_id == organization_id && b.name == name)
        {
            return Ok((existing.clone(), false));
        }
        let building = Building {
            id: Uuid::new_v4(),
            organization_id,
            name: name.to_string(),
            created_at: Utc::now(),
        };
        inner.buildings.push(building.clone());
        Ok((building, true))
    }

    async fn list_buildings(
        &self,
        organization_id: Option<Uuid>,
    ) -> Result<Vec<Building>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<Building> = inner
            .buildings
            .iter()
            .filter(|b| organization_id.map_or(true, |org| b.organization_id == org))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn update_building(
        &self,
        id: Uuid,
        patch: BuildingPatch,
    ) -> Result<Building, StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(org) = patch.organization_id {
            if !inner.organizations.iter().any(|o| o.id == org) {
                return Err(StoreError::InvalidReference(format!("organization_id {org}")));
            }
        }
        let current = inner
            .buildings
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or(StoreError::NotFound("building"))?;
        let name = patch.name.unwrap_or(current.name);
        let organization_id = patch.organization_id.unwrap_or(current.organization_id);
        if inner
            .buildings
            .iter()
            .any(|b| b.id != id && b.organization_id == organization_id && b.name == name)
        {
            return Err(StoreError::Conflict(format!("building \"{name}\"")));
        }
        let building = inner
            .buildings
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(StoreError::NotFound("building"))?;
        building.name = name;
        building.organization_id = organization_id;
        Ok(building.clone())
    }

    async fn delete_building(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.buildings.iter().any(|b| b.id == id) {
            return Err(StoreError::NotFound("building"));
        }
        let references = inner
            .tasks
            .iter()
            .filter(|t| t.building_id == Some(id))
            .count() as i64;
        if references > 0 {
            return Err(StoreError::ReferentialIntegrity {
                entity: "building",
                id,
                references,
            });
        }
        inner.buildings.retain(|b| b.id != id);
        Ok(())
    }

    async fn merge_building(&self, duplicate: Uuid, keeper: Uuid) -> Result<u64, StoreError> {
        if duplicate == keeper {
            return Ok(0);
        }
        let mut inner = self.inner.lock().await;
        if !inner.buildings.iter().any(|b| b.id == keeper) {
            return Err(StoreError::NotFound("building"));
        }
        if !inner.buildings.iter().any(|b| b.id == duplicate) {
            return Err(StoreError::NotFound("building"));
        }
        let mut remapped = 0;
        for task in &mut inner.tasks {
            if task.building_id == Some(duplicate) {
                task.building_id = Some(keeper);
                task.updated_at = Utc::now();
                remapped += 1;
            }
        }
        inner.buildings.retain(|b| b.id != duplicate);
        Ok(remapped)
    }

    // ── engineers ──
    async fn upsert_engineer(
        &self,
        full_name: &str,
        employee_code: Option<&str>,
    ) -> Result<(Engineer, bool), StoreError> {
        let mut inner = self.inner.lock().await;
        let existing = match employee_code {
            Some(code) => inner
                .engineers
                .iter()
                .find(|e| e.employee_code.as_deref() == Some(code)),
            None => inner
                .engineers
                .iter()
                .find(|e| e.employee_code.is_none() && e.full_name == full_name),
        };
        if let Some(existing) = existing {
            return Ok((existing.clone(), false));
        }
        let engineer = Engineer {
            id: Uuid::new_v4(),
            full_name: full_name.to_string(),
            employee_code: employee_code.map(str::to_string),
            is_active: true,
            created_at: Utc::now(),
        };
        inner.engineers.push(engineer.clone());
        Ok((engineer, true))
    }

    async fn list_engineers(&self) -> Result<Vec<Engineer>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rows = inner.engineers.clone();
        rows.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(rows)
    }

    async fn update_engineer(
        &self,
        id: Uuid,
        patch: EngineerPatch,
    ) -> Result<Engineer, StoreError> {
        let mut inner = self.inner.lock().await;
        let current = inner
            .engineers
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or(StoreError::NotFound("engineer"))?;
        let full_name = patch.full_name.unwrap_or(current.full_name);
        let employee_code = patch.employee_code.or(current.employee_code);
        let taken = match &employee_code {
            Some(code) => inner
                .engineers
                .iter()
                .any(|e| e.id != id && e.employee_code.as_deref() == Some(code)),
            None => inner
                .engineers
                .iter()
                .any(|e| e.id != id && e.employee_code.is_none() && e.full_name == full_name),
        };
        if taken {
            return Err(StoreError::Conflict(format!("engineer \"{full_name}\"")));
        }
        let engineer = inner
            .engineers
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(StoreError::NotFound("engineer"))?;
        engineer.full_name = full_name;
        engineer.employee_code = employee_code;
        if let Some(active) = patch.is_active {
            engineer.is_active = active;
        }
        Ok(engineer.clone())
    }

    async fn delete_engineer(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.engineers.iter().any(|e| e.id == id) {
            return Err(StoreError::NotFound("engineer"));
        }
        let references = inner
            .tasks
            .iter()
            .filter(|t| t.assigned_engineer_id == Some(id))
            .count() as i64;
        if references > 0 {
            return Err(StoreError::ReferentialIntegrity {
                entity: "engineer",
                id,
                references,
            });
        }
        inner.engineers.retain(|e| e.id != id);
        Ok(())
    }

    async fn merge_engineer(&self, duplicate: Uuid, keeper: Uuid) -> Result<u64, StoreError> {
        if duplicate == keeper {
            return Ok(0);
        }
        let mut inner = self.inner.lock().await;
        if !inner.engineers.iter().any(|e| e.id == keeper) {
            return Err(StoreError::NotFound("engineer"));
        }
        if !inner.engineers.iter().any(|e| e.id == duplicate) {
            return Err(StoreError::NotFound("engineer"));
        }
        let mut remapped = 0;
        for task in &mut inner.tasks {
            if task.assigned_engineer_id == Some(duplicate) {
                task.assigned_engineer_id = Some(keeper);
                task.updated_at = Utc::now();
                remapped += 1;
            }
        }
        inner.engineers.retain(|e| e.id != duplicate);
        Ok(remapped)
    }

    // ── system types ──
    async fn upsert_system_type(&self, name: &str) -> Result<(SystemType, bool), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.system_types.iter().find(|s| s.name == name) {
            return Ok((existing.clone(), false));
        }
        let system = SystemType {
            id: Uuid::new_v4(),
            name: name.to_string(),
            color: None,
            created_at: Utc::now(),
        };
        inner.system_types.push(system.clone());
        Ok((system, true))
    }

    async fn list_system_types(&self) -> Result<Vec<SystemType>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rows = inner.system_types.clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn update_system_type(
        &self,
        id: Uuid,
        patch: SystemTypePatch,
    ) -> Result<SystemType, StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(name) = &patch.name {
            if inner.system_types.iter().any(|s| s.id != id && &s.name == name) {
                return Err(StoreError::Conflict(format!("system type \"{name}\"")));
            }
        }
        let system = inner
            .system_types
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::NotFound("system type"))?;
        if let Some(name) = patch.name {
            system.name = name;
        }
        if let Some(color) = patch.color {
            system.color = Some(color);
        }
        Ok(system.clone())
    }

    async fn delete_system_type(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.system_types.iter().any(|s| s.id == id) {
            return Err(StoreError::NotFound("system type"));
        }
        let references = inner
            .tasks
            .iter()
            .filter(|t| t.system_type_id == Some(id))
            .count() as i64;
        if references > 0 {
            return Err(StoreError::ReferentialIntegrity {
                entity: "system type",
                id,
                references,
            });
        }
        inner.system_types.retain(|s| s.id != id);
        Ok(())
    }

    // ── call types ──
    async fn upsert_call_type(&self, name: &str) -> Result<(CallType, bool), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.call_types.iter().find(|c| c.name == name) {
            return Ok((existing.clone(), false));
        }
        let call = CallType {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        inner.call_types.push(call.clone());
        Ok((call, true))
    }

    async fn list_call_types(&self) -> Result<Vec<CallType>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rows = inner.call_types.clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn update_call_type(
        &self,
        id: Uuid,
        patch: CallTypePatch,
    ) -> Result<CallType, StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(name) = &patch.name {
            if inner.call_types.iter().any(|c| c.id != id && &c.name == name) {
                return Err(StoreError::Conflict(format!("call type \"{name}\"")));
            }
        }
        let call = inner
            .call_types
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::NotFound("call type"))?;
        if let Some(name) = patch.name {
            call.name = name;
        }
        Ok(call.clone())
    }

    async fn delete_call_type(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.call_types.iter().any(|c| c.id == id) {
            return Err(StoreError::NotFound("call type"));
        }
        let references = inner
            .tasks
            .iter()
            .filter(|t| t.call_type_id == Some(id))
            .count() as i64;
        if references > 0 {
            return Err(StoreError::ReferentialIntegrity {
                entity: "call type",
                id,
                references,
            });
        }
        inner.call_types.retain(|c| c.id != id);
        Ok(())
    }

    // ── task statuses ──
    async fn upsert_task_status(
        &self,
        name: &str,
        color: Option<&str>,
        sort_order: i32,
    ) -> Result<(TaskStatus, bool), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.task_statuses.iter().find(|s| s.name == name) {
            return Ok((existing.clone(), false));
        }
        let status = TaskStatus {
            id: Uuid::new_v4(),
            name: name.to_string(),
            color: color.map(str::to_string),
            sort_order,
            created_at: Utc::now(),
        };
        inner.task_statuses.push(status.clone());
        Ok((status, true))
    }

    async fn list_task_statuses(&self) -> Result<Vec<TaskStatus>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rows = inner.task_statuses.clone();
        rows.sort_by_key(|s| s.sort_order);
        Ok(rows)
    }

    async fn update_task_status(
        &self,
        id: Uuid,
        patch: TaskStatusPatch,
    ) -> Result<TaskStatus, StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(name) = &patch.name {
            if inner.task_statuses.iter().any(|s| s.id != id && &s.name == name) {
                return Err(StoreError::Conflict(format!("task status \"{name}\"")));
            }
        }
        let status = inner
            .task_statuses
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::NotFound("task status"))?;
        if let Some(name) = patch.name {
            status.name = name;
        }
        if let Some(color) = patch.color {
            status.color = Some(color);
        }
        if let Some(sort_order) = patch.sort_order {
            status.sort_order = sort_order;
        }
        Ok(status.clone())
    }

    // ── service tasks ──
    async fn insert_task(&self, task: NewServiceTask) -> Result<ServiceTask, StoreError> {
        let mut inner = self.inner.lock().await;
        validate_task_refs(&inner, &task)?;
        let key = task.identity_key();
        if inner.tasks.iter().any(|t| t.identity_key() == key) {
            return Err(StoreError::Conflict("service task identity".into()));
        }
        let stored = stored_task(task);
        inner.tasks.push(stored.clone());
        Ok(stored)
    }

    async fn insert_tasks(&self, tasks: &[NewServiceTask]) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let mut keys: HashSet<TaskKey> =
            inner.tasks.iter().map(|t| t.identity_key()).collect();
        for task in tasks {
            validate_task_refs(&inner, task)?;
            if !keys.insert(task.identity_key()) {
                return Err(StoreError::Conflict("service task identity".into()));
            }
        }
        for task in tasks {
            let stored = stored_task(task.clone());
            inner.tasks.push(stored);
        }
        Ok(tasks.len() as u64)
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<TaskPage, StoreError> {
        let inner = self.inner.lock().await;
        let mut hits: Vec<&ServiceTask> = inner
            .tasks
            .iter()
            .filter(|t| matches(t, filter))
            .collect();
        let total = hits.len() as i64;
        hits.sort_by(|a, b| {
            b.received_at
                .cmp(&a.received_at)
                .then(b.created_at.cmp(&a.created_at))
        });
        let items = hits
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .map(|t| task_detail(&inner, t))
            .collect();
        Ok(TaskPage { items, total })
    }

    async fn get_task(&self, id: Uuid) -> Result<TaskDetail, StoreError> {
        let inner = self.inner.lock().await;
        inner
            .tasks
            .iter()
            .find(|t| t.id == id)
            .map(|t| task_detail(&inner, t))
            .ok_or(StoreError::NotFound("service task"))
    }

    async fn update_task(&self, id: Uuid, patch: TaskPatch) -> Result<ServiceTask, StoreError> {
        let mut inner = self.inner.lock().await;
        let current = inner
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(StoreError::NotFound("service task"))?;
        let merged = NewServiceTask {
            organization_id: patch.organization_id.or(current.organization_id),
            building_id: patch.building_id.or(current.building_id),
            assigned_engineer_id: patch.assigned_engineer_id.or(current.assigned_engineer_id),
            status_id: patch.status_id.unwrap_or(current.status_id),
            system_type_id: patch.system_type_id.or(current.system_type_id),
            call_type_id: patch.call_type_id.or(current.call_type_id),
            description: patch.description.or(current.description),
            engineering_comment: patch.engineering_comment.or(current.engineering_comment),
            akt_number: patch.akt_number.or(current.akt_number),
            received_at: patch.received_at.unwrap_or(current.received_at),
            completed_at: patch.completed_at.or(current.completed_at),
            original_path: patch.original_path.or(current.original_path),
        };
        validate_task_refs(&inner, &merged)?;
        let key = merged.identity_key();
        if inner.tasks.iter().any(|t| t.id != id && t.identity_key() == key) {
            return Err(StoreError::Conflict("service task identity".into()));
        }
        let task = inner
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound("service task"))?;
        task.organization_id = merged.organization_id;
        task.building_id = merged.building_id;
        task.assigned_engineer_id = merged.assigned_engineer_id;
        task.status_id = merged.status_id;
        task.system_type_id = merged.system_type_id;
        task.call_type_id = merged.call_type_id;
        task.description = merged.description;
        task.engineering_comment = merged.engineering_comment;
        task.akt_number = merged.akt_number;
        task.received_at = merged.received_at;
        task.completed_at = merged.completed_at;
        task.original_path = merged.original_path;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn delete_task(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let before = inner.tasks.len();
        inner.tasks.retain(|t| t.id != id);
        if inner.tasks.len() == before {
            return Err(StoreError::NotFound("service task"));
        }
        Ok(())
    }

    async fn delete_tasks(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let doomed: HashSet<Uuid> = ids.iter().copied().collect();
        let before = inner.tasks.len();
        inner.tasks.retain(|t| !doomed.contains(&t.id));
        Ok((before - inner.tasks.len()) as u64)
    }

    async fn existing_task_keys(&self) -> Result<HashSet<TaskKey>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.tasks.iter().map(|t| t.identity_key()).collect())
    }

    async fn task_identities(&self) -> Result<Vec<TaskIdentity>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .tasks
            .iter()
            .map(|t| TaskIdentity {
                id: t.id,
                key: t.identity_key(),
                created_at: t.created_at,
            })
            .collect())
    }

    async fn task_facts(&self) -> Result<Vec<TaskFacts>, StoreError> {
        let inner = self.inner.lock().await;
        let mut tasks: Vec<&ServiceTask> = inner.tasks.iter().collect();
        tasks.sort_by_key(|t| t.received_at);
        Ok(tasks
            .into_iter()
            .map(|t| {
                let engineer = t
                    .assigned_engineer_id
                    .and_then(|id| inner.engineers.iter().find(|e| e.id == id));
                let system = t
                    .system_type_id
                    .and_then(|id| inner.system_types.iter().find(|s| s.id == id));
                let status = inner.task_statuses.iter().find(|s| s.id == t.status_id);
                TaskFacts {
                    organization_id: t.organization_id,
                    organization_name: t
                        .organization_id
                        .and_then(|id| inner.organizations.iter().find(|o| o.id == id))
                        .map(|o| o.name.clone()),
                    engineer_id: t.assigned_engineer_id,
                    engineer_name: engineer.map(|e| e.full_name.clone()),
                    employee_code: engineer.and_then(|e| e.employee_code.clone()),
                    system_type: system.map(|s| s.name.clone()),
                    system_type_color: system.and_then(|s| s.color.clone()),
                    call_type: t
                        .call_type_id
                        .and_then(|id| inner.call_types.iter().find(|c| c.id == id))
                        .map(|c| c.name.clone()),
                    status_name: status.map(|s| s.name.clone()).unwrap_or_default(),
                    status_color: status.and_then(|s| s.color.clone()),
                    received_at: t.received_at,
                    completed_at: t.completed_at,
                    resolution_days: resolution_days(t.received_at, t.completed_at),
                }
            })
            .collect())
    }

    // ── import provenance ──
    async fn record_import_run(&self, run: NewImportRun) -> Result<ImportRun, StoreError> {
        let mut inner = self.inner.lock().await;
        let row = ImportRun {
            id: Uuid::new_v4(),
            source_file: run.source_file,
            source_sha256: run.source_sha256,
            total_rows: run.total_rows,
            invalid_rows: run.invalid_rows,
            inserted: run.inserted,
            skipped: run.skipped,
            errors: run.errors,
            started_at: run.started_at,
            finished_at: run.finished_at,
        };
        inner.import_runs.push(row.clone());
        Ok(row)
    }

    async fn list_import_runs(&self) -> Result<Vec<ImportRun>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rows = inner.import_runs.clone();
        rows.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(rows)
    }
}
