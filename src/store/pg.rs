// src/store/pg.rs

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{query, query_as, query_scalar, Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    Building, BuildingPatch, CallType, CallTypePatch, Engineer, EngineerPatch, ImportRun,
    NewImportRun, NewServiceTask, Organization, OrganizationPatch, ServiceTask, SystemType,
    SystemTypePatch, TaskDetail, TaskFacts, TaskFilter, TaskIdentity, TaskKey, TaskPage,
    TaskPatch, TaskStatus, TaskStatusPatch,
};

use super::Store;

/// PostgreSQL-backed [`Store`]. Uniqueness and foreign keys are
/// enforced by the constraints in `schema.sql`; constraint violations
/// surface as [`StoreError::Conflict`] / [`StoreError::InvalidReference`].
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn db_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        match db.code().as_deref() {
            Some("23505") => return StoreError::Conflict(db.message().to_string()),
            Some("23503") => return StoreError::InvalidReference(db.message().to_string()),
            _ => {}
        }
    }
    StoreError::Database(e)
}

const TASK_COLUMNS: &str = "id, organization_id, building_id, assigned_engineer_id, status_id, \
     system_type_id, call_type_id, description, engineering_comment, akt_number, received_at, \
     completed_at, original_path, created_at, updated_at";

/// Joined select used by the task list and single-task reads. Keep the
/// aliases in sync with the `TaskDetail` field names.
const TASK_DETAIL_SELECT: &str = r#"
SELECT t.id, t.organization_id, t.building_id, t.assigned_engineer_id, t.status_id,
       t.system_type_id, t.call_type_id, t.description, t.engineering_comment, t.akt_number,
       t.received_at, t.completed_at, t.original_path, t.created_at, t.updated_at,
       CASE WHEN t.completed_at IS NULL THEN NULL
            ELSE GREATEST((t.completed_at::date - t.received_at::date)::bigint, 0) END
         AS resolution_days,
       o.name AS organization_name,
       b.name AS building_name,
       e.full_name AS engineer_name,
       s.name AS status_name,
       st.name AS system_type_name,
       ct.name AS call_type_name
FROM public.service_tasks t
JOIN public.task_statuses s ON s.id = t.status_id
LEFT JOIN public.organizations o ON o.id = t.organization_id
LEFT JOIN public.buildings b ON b.id = t.building_id
LEFT JOIN public.engineers e ON e.id = t.assigned_engineer_id
LEFT JOIN public.system_types st ON st.id = t.system_type_id
LEFT JOIN public.call_types ct ON ct.id = t.call_type_id
WHERE 1=1
"#;

fn push_task_filters<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q TaskFilter) {
    if let Some(id) = filter.status_id {
        qb.push(" AND t.status_id = ").push_bind(id);
    }
    if let Some(id) = filter.organization_id {
        qb.push(" AND t.organization_id = ").push_bind(id);
    }
    if let Some(id) = filter.assigned_engineer_id {
        qb.push(" AND t.assigned_engineer_id = ").push_bind(id);
    }
    if let Some(id) = filter.system_type_id {
        qb.push(" AND t.system_type_id = ").push_bind(id);
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{search}%");
        qb.push(" AND (t.description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR t.engineering_comment ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[async_trait]
impl Store for PgStore {
    // ── organizations ──
    async fn upsert_organization(
        &self,
        name: &str,
        name_en: Option<&str>,
    ) -> Result<(Organization, bool), StoreError> {
        let inserted = query_as::<_, Organization>(
            r#"
            INSERT INTO public.organizations (id, name, name_en)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO NOTHING
            RETURNING id, name, name_en, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(name_en)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        if let Some(org) = inserted {
            return Ok((org, true));
        }
        let existing = query_as::<_, Organization>(
            r#"SELECT id, name, name_en, created_at FROM public.organizations WHERE name = $1"#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(StoreError::NotFound("organization"))?;
        Ok((existing, false))
    }

    async fn list_organizations(&self) -> Result<Vec<Organization>, StoreError> {
        query_as::<_, Organization>(
            r#"SELECT id, name, name_en, created_at FROM public.organizations ORDER BY name"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn get_organization(&self, id: Uuid) -> Result<Organization, StoreError> {
        query_as::<_, Organization>(
            r#"SELECT id, name, name_en, created_at FROM public.organizations WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(StoreError::NotFound("organization"))
    }

    async fn update_organization(
        &self,
        id: Uuid,
        patch: OrganizationPatch,
    ) -> Result<Organization, StoreError> {
        query_as::<_, Organization>(
            r#"
            UPDATE public.organizations SET
                name = COALESCE($2, name),
                name_en = COALESCE($3, name_en)
            WHERE id = $1
            RETURNING id, name, name_en, created_at
            "#,
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.name_en)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(StoreError::NotFound("organization"))
    }

    async fn delete_organization(&self, id: Uuid) -> Result<(), StoreError> {
        let references: i64 = query_scalar(
            r#"
            SELECT (SELECT count(*) FROM public.buildings WHERE organization_id = $1)
                 + (SELECT count(*) FROM public.service_tasks WHERE organization_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        if references > 0 {
            return Err(StoreError::ReferentialIntegrity {
                entity: "organization",
                id,
                references,
            });
        }
        let res = query(r#"DELETE FROM public.organizations WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound("organization"));
        }
        Ok(())
    }

    // ── buildings ──
    async fn upsert_building(
        &self,
        organization_id: Uuid,
        name: &str,
    ) -> Result<(Building, bool), StoreError> {
        let inserted = query_as::<_, Building>(
            r#"
            INSERT INTO public.buildings (id, organization_id, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (organization_id, name) DO NOTHING
            RETURNING id, organization_id, name, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(organization_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        if let Some(building) = inserted {
            return Ok((building, true));
        }
        let existing = query_as::<_, Building>(
            r#"
            SELECT id, organization_id, name, created_at
            FROM public.buildings WHERE organization_id = $1 AND name = $2
            "#,
        )
        .bind(organization_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(StoreError::NotFound("building"))?;
        Ok((existing, false))
    }

    async fn list_buildings(
        &self,
        organization_id: Option<Uuid>,
    ) -> Result<Vec<Building>, StoreError> {
        let rows = if let Some(org) = organization_id {
            query_as::<_, Building>(
                r#"
                SELECT id, organization_id, name, created_at
                FROM public.buildings WHERE organization_id = $1 ORDER BY name
                "#,
            )
            .bind(org)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
        } else {
            query_as::<_, Building>(
                r#"SELECT id, organization_id, name, created_at FROM public.buildings ORDER BY name"#,
            )
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
        };
        Ok(rows)
    }

    async fn update_building(
        &self,
        id: Uuid,
        patch: BuildingPatch,
    ) -> Result<Building, StoreError> {
        query_as::<_, Building>(
            r#"
            UPDATE public.buildings SET
                name = COALESCE($2, name),
                organization_id = COALESCE($3, organization_id)
            WHERE id = $1
            RETURNING id, organization_id, name, created_at
            "#,
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(StoreError::NotFound("building"))
    }

    async fn delete_building(&self, id: Uuid) -> Result<(), StoreError> {
        let references: i64 =
            query_scalar(r#"SELECT count(*) FROM public.service_tasks WHERE building_id = $1"#)
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;
        if references > 0 {
            return Err(StoreError::ReferentialIntegrity {
                entity: "building",
                id,
                references,
            });
        }
        let res = query(r#"DELETE FROM public.buildings WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound("building"));
        }
        Ok(())
    }

    async fn merge_building(&self, duplicate: Uuid, keeper: Uuid) -> Result<u64, StoreError> {
        if duplicate == keeper {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let keeper_exists: bool =
            query_scalar(r#"SELECT EXISTS(SELECT 1 FROM public.buildings WHERE id = $1)"#)
                .bind(keeper)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_err)?;
        if !keeper_exists {
            return Err(StoreError::NotFound("building"));
        }
        let remapped = query(
            r#"
            UPDATE public.service_tasks SET building_id = $2, updated_at = now()
            WHERE building_id = $1
            "#,
        )
        .bind(duplicate)
        .bind(keeper)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();
        let deleted = query(r#"DELETE FROM public.buildings WHERE id = $1"#)
            .bind(duplicate)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();
        if deleted == 0 {
            return Err(StoreError::NotFound("building"));
        }
        tx.commit().await.map_err(db_err)?;
        Ok(remapped)
    }

    // ── engineers ──
    async fn upsert_engineer(
        &self,
        full_name: &str,
        employee_code: Option<&str>,
    ) -> Result<(Engineer, bool), StoreError> {
        let inserted = match employee_code {
            Some(code) => query_as::<_, Engineer>(
                r#"
                INSERT INTO public.engineers (id, full_name, employee_code)
                VALUES ($1, $2, $3)
                ON CONFLICT (employee_code) WHERE employee_code IS NOT NULL DO NOTHING
                RETURNING id, full_name, employee_code, is_active, created_at
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(full_name)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?,
            None => query_as::<_, Engineer>(
                r#"
                INSERT INTO public.engineers (id, full_name, employee_code)
                VALUES ($1, $2, NULL)
                ON CONFLICT (full_name) WHERE employee_code IS NULL DO NOTHING
                RETURNING id, full_name, employee_code, is_active, created_at
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(full_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?,
        };
        if let Some(engineer) = inserted {
            return Ok((engineer, true));
        }
        let existing = match employee_code {
            Some(code) => query_as::<_, Engineer>(
                r#"
                SELECT id, full_name, employee_code, is_active, created_at
                FROM public.engineers WHERE employee_code = $1
                "#,
            )
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?,
            None => query_as::<_, Engineer>(
                r#"
                SELECT id, full_name, employee_code, is_active, created_at
                FROM public.engineers WHERE full_name = $1 AND employee_code IS NULL
                "#,
            )
            .bind(full_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?,
        };
        existing
            .map(|e| (e, false))
            .ok_or(StoreError::NotFound("engineer"))
    }

    async fn list_engineers(&self) -> Result<Vec<Engineer>, StoreError> {
        query_as::<_, Engineer>(
            r#"
            SELECT id, full_name, employee_code, is_active, created_at
            FROM public.engineers ORDER BY full_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn update_engineer(
        &self,
        id: Uuid,
        patch: EngineerPatch,
    ) -> Result<Engineer, StoreError> {
        query_as::<_, Engineer>(
            r#"
            UPDATE public.engineers SET
                full_name = COALESCE($2, full_name),
                employee_code = COALESCE($3, employee_code),
                is_active = COALESCE($4, is_active)
            WHERE id = $1
            RETURNING id, full_name, employee_code, is_active, created_at
            "#,
        )
        .bind(id)
        .bind(patch.full_name)
        .bind(patch.employee_code)
        .bind(patch.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(StoreError::NotFound("engineer"))
    }

    async fn delete_engineer(&self, id: Uuid) -> Result<(), StoreError> {
        let references: i64 = query_scalar(
            r#"SELECT count(*) FROM public.service_tasks WHERE assigned_engineer_id = $1"#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        if references > 0 {
            return Err(StoreError::ReferentialIntegrity {
                entity: "engineer",
                id,
                references,
            });
        }
        let res = query(r#"DELETE FROM public.engineers WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound("engineer"));
        }
        Ok(())
    }

    async fn merge_engineer(&self, duplicate: Uuid, keeper: Uuid) -> Result<u64, StoreError> {
        if duplicate == keeper {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let keeper_exists: bool =
            query_scalar(r#"SELECT EXISTS(SELECT 1 FROM public.engineers WHERE id = $1)"#)
                .bind(keeper)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_err)?;
        if !keeper_exists {
            return Err(StoreError::NotFound("engineer"));
        }
        let remapped = query(
            r#"
            UPDATE public.service_tasks SET assigned_engineer_id = $2, updated_at = now()
            WHERE assigned_engineer_id = $1
            "#,
        )
        .bind(duplicate)
        .bind(keeper)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();
        let deleted = query(r#"DELETE FROM public.engineers WHERE id = $1"#)
            .bind(duplicate)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();
        if deleted == 0 {
            return Err(StoreError::NotFound("engineer"));
        }
        tx.commit().await.map_err(db_err)?;
        Ok(remapped)
    }

    // ── system types ──
    async fn upsert_system_type(&self, name: &str) -> Result<(SystemType, bool), StoreError> {
        let inserted = query_as::<_, SystemType>(
            r#"
            INSERT INTO public.system_types (id, name)
            VALUES ($1, $2)
            ON CONFLICT (name) DO NOTHING
            RETURNING id, name, color, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        if let Some(system) = inserted {
            return Ok((system, true));
        }
        let existing = query_as::<_, SystemType>(
            r#"SELECT id, name, color, created_at FROM public.system_types WHERE name = $1"#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(StoreError::NotFound("system type"))?;
        Ok((existing, false))
    }

    async fn list_system_types(&self) -> Result<Vec<SystemType>, StoreError> {
        query_as::<_, SystemType>(
            r#"SELECT id, name, color, created_at FROM public.system_types ORDER BY name"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn update_system_type(
        &self,
        id: Uuid,
        patch: SystemTypePatch,
    ) -> Result<SystemType, StoreError> {
        query_as::<_, SystemType>(
            r#"
            UPDATE public.system_types SET
                name = COALESCE($2, name),
                color = COALESCE($3, color)
            WHERE id = $1
            RETURNING id, name, color, created_at
            "#,
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.color)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(StoreError::NotFound("system type"))
    }

    async fn delete_system_type(&self, id: Uuid) -> Result<(), StoreError> {
        let references: i64 =
            query_scalar(r#"SELECT count(*) FROM public.service_tasks WHERE system_type_id = $1"#)
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;
        if references > 0 {
            return Err(StoreError::ReferentialIntegrity {
                entity: "system type",
                id,
                references,
            });
        }
        let res = query(r#"DELETE FROM public.system_types WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound("system type"));
        }
        Ok(())
    }

    // ── call types ──
    async fn upsert_call_type(&self, name: &str) -> Result<(CallType, bool), StoreError> {
        let inserted = query_as::<_, CallType>(
            r#"
            INSERT INTO public.call_types (id, name)
            VALUES ($1, $2)
            ON CONFLICT (name) DO NOTHING
            RETURNING id, name, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        if let Some(call) = inserted {
            return Ok((call, true));
        }
        let existing = query_as::<_, CallType>(
            r#"SELECT id, name, created_at FROM public.call_types WHERE name = $1"#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(StoreError::NotFound("call type"))?;
        Ok((existing, false))
    }

    async fn list_call_types(&self) -> Result<Vec<CallType>, StoreError> {
        query_as::<_, CallType>(
            r#"SELECT id, name, created_at FROM public.call_types ORDER BY name"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn update_call_type(
        &self,
        id: Uuid,
        patch: CallTypePatch,
    ) -> Result<CallType, StoreError> {
        query_as::<_, CallType>(
            r#"
            UPDATE public.call_types SET name = COALESCE($2, name)
            WHERE id = $1
            RETURNING id, name, created_at
            "#,
        )
        .bind(id)
        .bind(patch.name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(StoreError::NotFound("call type"))
    }

    async fn delete_call_type(&self, id: Uuid) -> Result<(), StoreError> {
        let references: i64 =
            query_scalar(r#"SELECT count(*) FROM public.service_tasks WHERE call_type_id = $1"#)
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;
        if references > 0 {
            return Err(StoreError::ReferentialIntegrity {
                entity: "call type",
                id,
                references,
            });
        }
        let res = query(r#"DELETE FROM public.call_types WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound("call type"));
        }
        Ok(())
    }

    // ── task statuses ──
    async fn upsert_task_status(
        &self,
        name: &str,
        color: Option<&str>,
        sort_order: i32,
    ) -> Result<(TaskStatus, bool), StoreError> {
        let inserted = query_as::<_, TaskStatus>(
            r#"
            INSERT INTO public.task_statuses (id, name, color, sort_order)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO NOTHING
            RETURNING id, name, color, sort_order, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(color)
        .bind(sort_order)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        if let Some(status) = inserted {
            return Ok((status, true));
        }
        let existing = query_as::<_, TaskStatus>(
            r#"SELECT id, name, color, sort_order, created_at FROM public.task_statuses WHERE name = $1"#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(StoreError::NotFound("task status"))?;
        Ok((existing, false))
    }

    async fn list_task_statuses(&self) -> Result<Vec<TaskStatus>, StoreError> {
        query_as::<_, TaskStatus>(
            r#"
            SELECT id, name, color, sort_order, created_at
            FROM public.task_statuses ORDER BY sort_order
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn update_task_status(
        &self,
        id: Uuid,
        patch: TaskStatusPatch,
    ) -> Result<TaskStatus, StoreError> {
        query_as::<_, TaskStatus>(
            r#"
            UPDATE public.task_statuses SET
                name = COALESCE($2, name),
                color = COALESCE($3, color),
                sort_order = COALESCE($4, sort_order)
            WHERE id = $1
            RETURNING id, name, color, sort_order, created_at
            "#,
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.color)
        .bind(patch.sort_order)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(StoreError::NotFound("task status"))
    }

    // ── service tasks ──
    async fn insert_task(&self, task: NewServiceTask) -> Result<ServiceTask, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO public.service_tasks
                (id, organization_id, building_id, assigned_engineer_id, status_id,
                 system_type_id, call_type_id, description, engineering_comment, akt_number,
                 received_at, completed_at, original_path)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
            RETURNING {TASK_COLUMNS}
            "#
        );
        query_as::<_, ServiceTask>(&sql)
            .bind(Uuid::new_v4())
            .bind(task.organization_id)
            .bind(task.building_id)
            .bind(task.assigned_engineer_id)
            .bind(task.status_id)
            .bind(task.system_type_id)
            .bind(task.call_type_id)
            .bind(&task.description)
            .bind(&task.engineering_comment)
            .bind(task.akt_number)
            .bind(task.received_at)
            .bind(task.completed_at)
            .bind(&task.original_path)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn insert_tasks(&self, tasks: &[NewServiceTask]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut inserted = 0u64;
        for task in tasks {
            let res = query(
                r#"
                INSERT INTO public.service_tasks
                    (id, organization_id, building_id, assigned_engineer_id, status_id,
                     system_type_id, call_type_id, description, engineering_comment, akt_number,
                     received_at, completed_at, original_path)
                VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(task.organization_id)
            .bind(task.building_id)
            .bind(task.assigned_engineer_id)
            .bind(task.status_id)
            .bind(task.system_type_id)
            .bind(task.call_type_id)
            .bind(&task.description)
            .bind(&task.engineering_comment)
            .bind(task.akt_number)
            .bind(task.received_at)
            .bind(task.completed_at)
            .bind(&task.original_path)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
            inserted += res.rows_affected();
        }
        tx.commit().await.map_err(db_err)?;
        Ok(inserted)
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<TaskPage, StoreError> {
        let mut count_qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT count(*) FROM public.service_tasks t WHERE 1=1");
        push_task_filters(&mut count_qb, filter);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(TASK_DETAIL_SELECT);
        push_task_filters(&mut qb, filter);
        qb.push(" ORDER BY t.received_at DESC, t.created_at DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);
        let items = qb
            .build_query_as::<TaskDetail>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(TaskPage { items, total })
    }

    async fn get_task(&self, id: Uuid) -> Result<TaskDetail, StoreError> {
        let sql = format!("{TASK_DETAIL_SELECT} AND t.id = $1");
        query_as::<_, TaskDetail>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or(StoreError::NotFound("service task"))
    }

    async fn update_task(&self, id: Uuid, patch: TaskPatch) -> Result<ServiceTask, StoreError> {
        let sql = format!(
            r#"
            UPDATE public.service_tasks SET
                organization_id = COALESCE($2, organization_id),
                building_id = COALESCE($3, building_id),
                assigned_engineer_id = COALESCE($4, assigned_engineer_id),
                status_id = COALESCE($5, status_id),
                system_type_id = COALESCE($6, system_type_id),
                call_type_id = COALESCE($7, call_type_id),
                description = COALESCE($8, description),
                engineering_comment = COALESCE($9, engineering_comment),
                akt_number = COALESCE($10, akt_number),
                received_at = COALESCE($11, received_at),
                completed_at = COALESCE($12, completed_at),
                original_path = COALESCE($13, original_path),
                updated_at = now()
            WHERE id = $1
            RETURNING {TASK_COLUMNS}
            "#
        );
        query_as::<_, ServiceTask>(&sql)
            .bind(id)
            .bind(patch.organization_id)
            .bind(patch.building_id)
            .bind(patch.assigned_engineer_id)
            .bind(patch.status_id)
            .bind(patch.system_type_id)
            .bind(patch.call_type_id)
            .bind(patch.description)
            .bind(patch.engineering_comment)
            .bind(patch.akt_number)
            .bind(patch.received_at)
            .bind(patch.completed_at)
            .bind(patch.original_path)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or(StoreError::NotFound("service task"))
    }

    async fn delete_task(&self, id: Uuid) -> Result<(), StoreError> {
        let res = query(r#"DELETE FROM public.service_tasks WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound("service task"));
        }
        Ok(())
    }

    async fn delete_tasks(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        let res = query(r#"DELETE FROM public.service_tasks WHERE id = ANY($1)"#)
            .bind(ids.to_vec())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected())
    }

    async fn existing_task_keys(&self) -> Result<HashSet<TaskKey>, StoreError> {
        let rows = query_as::<_, (Option<Uuid>, DateTime<Utc>, Option<String>, Option<i64>)>(
            r#"
            SELECT organization_id, received_at, original_path, akt_number
            FROM public.service_tasks
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(
                |(organization_id, received_at, original_path, akt_number)| TaskKey {
                    organization_id,
                    received_at,
                    original_path,
                    akt_number,
                },
            )
            .collect())
    }

    async fn task_identities(&self) -> Result<Vec<TaskIdentity>, StoreError> {
        type Row = (
            Uuid,
            Option<Uuid>,
            DateTime<Utc>,
            Option<String>,
            Option<i64>,
            DateTime<Utc>,
        );
        let rows = query_as::<_, Row>(
            r#"
            SELECT id, organization_id, received_at, original_path, akt_number, created_at
            FROM public.service_tasks
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(
                |(id, organization_id, received_at, original_path, akt_number, created_at)| {
                    TaskIdentity {
                        id,
                        key: TaskKey {
                            organization_id,
                            received_at,
                            original_path,
                            akt_number,
                        },
                        created_at,
                    }
                },
            )
            .collect())
    }

    async fn task_facts(&self) -> Result<Vec<TaskFacts>, StoreError> {
        query_as::<_, TaskFacts>(
            r#"
            SELECT t.organization_id,
                   o.name AS organization_name,
                   t.assigned_engineer_id AS engineer_id,
                   e.full_name AS engineer_name,
                   e.employee_code,
                   st.name AS system_type,
                   st.color AS system_type_color,
                   ct.name AS call_type,
                   s.name AS status_name,
                   s.color AS status_color,
                   t.received_at,
                   t.completed_at,
                   CASE WHEN t.completed_at IS NULL THEN NULL
                        ELSE GREATEST((t.completed_at::date - t.received_at::date)::bigint, 0) END
                     AS resolution_days
            FROM public.service_tasks t
            JOIN public.task_statuses s ON s.id = t.status_id
            LEFT JOIN public.organizations o ON o.id = t.organization_id
            LEFT JOIN public.engineers e ON e.id = t.assigned_engineer_id
            LEFT JOIN public.system_types st ON st.id = t.system_type_id
            LEFT JOIN public.call_types ct ON ct.id = t.call_type_id
            ORDER BY t.received_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    // ── import provenance ──
    async fn record_import_run(&self, run: NewImportRun) -> Result<ImportRun, StoreError> {
        query_as::<_, ImportRun>(
            r#"
            INSERT INTO public.import_runs
                (id, source_file, source_sha256, total_rows, invalid_rows, inserted, skipped,
                 errors, started_at, finished_at)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
            RETURNING id, source_file, source_sha256, total_rows, invalid_rows, inserted,
                      skipped, errors, started_at, finished_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&run.source_file)
        .bind(&run.source_sha256)
        .bind(run.total_rows)
        .bind(run.invalid_rows)
        .bind(run.inserted)
        .bind(run.skipped)
        .bind(run.errors)
        .bind(run.started_at)
        .bind(run.finished_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn list_import_runs(&self) -> Result<Vec<ImportRun>, StoreError> {
        query_as::<_, ImportRun>(
            r#"
            SELECT id, source_file, source_sha256, total_rows, invalid_rows, inserted,
                   skipped, errors, started_at, finished_at
            FROM public.import_runs ORDER BY started_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }
}
