// src/models/mod.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ───────────────────────────────────────
// Canonical status names (seeded rows)
// ───────────────────────────────────────
pub const STATUS_NOT_STARTED: &str = "Not started";
pub const STATUS_IN_PROGRESS: &str = "In progress";
pub const STATUS_COMPLETED: &str = "Completed";

/// Status applied when an imported row carries no recognisable status.
pub const DEFAULT_STATUS: &str = STATUS_NOT_STARTED;

/// (name, color, sort_order) for the seeded status rows.
pub const STATUS_SEED: [(&str, &str, i32); 3] = [
    (STATUS_NOT_STARTED, "#f59e0b", 1),
    (STATUS_IN_PROGRESS, "#8b5cf6", 2),
    (STATUS_COMPLETED, "#22c55e", 3),
];

// ───────────────────────────────────────
// Canonical entities
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub name_en: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Building {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Engineer {
    pub id: Uuid,
    pub full_name: String,
    pub employee_code: Option<String>, // identity key when present
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Engineer {
    /// Identity key for reconciliation: employee code when present,
    /// otherwise the full name.
    pub fn identity_key(&self) -> &str {
        self.employee_code.as_deref().unwrap_or(&self.full_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SystemType {
    pub id: Uuid,
    pub name: String,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CallType {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskStatus {
    pub id: Uuid,
    pub name: String,
    pub color: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ServiceTask {
    pub id: Uuid,
    pub organization_id: Option<Uuid>,
    pub building_id: Option<Uuid>,
    pub assigned_engineer_id: Option<Uuid>,
    pub status_id: Uuid,
    pub system_type_id: Option<Uuid>,
    pub call_type_id: Option<Uuid>,
    pub description: Option<String>,
    pub engineering_comment: Option<String>,
    pub akt_number: Option<i64>,
    pub received_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub original_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceTask {
    pub fn identity_key(&self) -> TaskKey {
        TaskKey {
            organization_id: self.organization_id,
            received_at: self.received_at,
            original_path: self.original_path.clone(),
            akt_number: self.akt_number,
        }
    }

    pub fn resolution_days(&self) -> Option<i64> {
        resolution_days(self.received_at, self.completed_at)
    }
}

/// Whole calendar days between receipt and completion, clamped at zero
/// so completion timestamps recorded before receipt cannot go negative.
/// `None` while the task is open.
pub fn resolution_days(
    received_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
) -> Option<i64> {
    completed_at.map(|done| {
        done.date_naive()
            .signed_duration_since(received_at.date_naive())
            .num_days()
            .max(0)
    })
}

// ───────────────────────────────────────
// Task identity & insert/update payloads
// ───────────────────────────────────────

/// The identity tuple of a service task. Two rows with equal keys are
/// the same physical service call regardless of how they were spelled
/// in the source extract.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub organization_id: Option<Uuid>,
    pub received_at: DateTime<Utc>,
    pub original_path: Option<String>,
    pub akt_number: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewServiceTask {
    pub organization_id: Option<Uuid>,
    pub building_id: Option<Uuid>,
    pub assigned_engineer_id: Option<Uuid>,
    pub status_id: Uuid,
    pub system_type_id: Option<Uuid>,
    pub call_type_id: Option<Uuid>,
    pub description: Option<String>,
    pub engineering_comment: Option<String>,
    pub akt_number: Option<i64>,
    pub received_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub original_path: Option<String>,
}

impl NewServiceTask {
    pub fn identity_key(&self) -> TaskKey {
        TaskKey {
            organization_id: self.organization_id,
            received_at: self.received_at,
            original_path: self.original_path.clone(),
            akt_number: self.akt_number,
        }
    }
}

/// Identity tuple of a stored row, used when hunting duplicate tasks.
#[derive(Debug, Clone)]
pub struct TaskIdentity {
    pub id: Uuid,
    pub key: TaskKey,
    pub created_at: DateTime<Utc>,
}

// ───────────────────────────────────────
// Patch payloads (COALESCE semantics:
// absent fields keep their stored value)
// ───────────────────────────────────────
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrganizationPatch {
    pub name: Option<String>,
    pub name_en: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildingPatch {
    pub name: Option<String>,
    pub organization_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineerPatch {
    pub full_name: Option<String>,
    pub employee_code: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemTypePatch {
    pub name: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallTypePatch {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskStatusPatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    pub organization_id: Option<Uuid>,
    pub building_id: Option<Uuid>,
    pub assigned_engineer_id: Option<Uuid>,
    pub status_id: Option<Uuid>,
    pub system_type_id: Option<Uuid>,
    pub call_type_id: Option<Uuid>,
    pub description: Option<String>,
    pub engineering_comment: Option<String>,
    pub akt_number: Option<i64>,
    pub received_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub original_path: Option<String>,
}

// ───────────────────────────────────────
// Read models
// ───────────────────────────────────────

/// Task row joined with the display names the dashboard needs.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TaskDetail {
    pub id: Uuid,
    pub organization_id: Option<Uuid>,
    pub building_id: Option<Uuid>,
    pub assigned_engineer_id: Option<Uuid>,
    pub status_id: Uuid,
    pub system_type_id: Option<Uuid>,
    pub call_type_id: Option<Uuid>,
    pub description: Option<String>,
    pub engineering_comment: Option<String>,
    pub akt_number: Option<i64>,
    pub received_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub original_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolution_days: Option<i64>,
    pub organization_name: Option<String>,
    pub building_name: Option<String>,
    pub engineer_name: Option<String>,
    pub status_name: Option<String>,
    pub system_type_name: Option<String>,
    pub call_type_name: Option<String>,
}

/// One denormalised row per task, the sole input of the aggregation
/// reporter. Reference names are resolved so report math never touches
/// the store again.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TaskFacts {
    pub organization_id: Option<Uuid>,
    pub organization_name: Option<String>,
    pub engineer_id: Option<Uuid>,
    pub engineer_name: Option<String>,
    pub employee_code: Option<String>,
    pub system_type: Option<String>,
    pub system_type_color: Option<String>,
    pub call_type: Option<String>,
    pub status_name: String,
    pub status_color: Option<String>,
    pub received_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub resolution_days: Option<i64>,
}

/// One page of the task list plus the unpaged match count.
#[derive(Debug, Clone, Serialize)]
pub struct TaskPage {
    pub items: Vec<TaskDetail>,
    pub total: i64,
}

/// Filters accepted by the task list. Status is already resolved to an
/// id; handlers translate status names before calling the store.
#[derive(Debug, Clone)]
pub struct TaskFilter {
    pub status_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub assigned_engineer_id: Option<Uuid>,
    pub system_type_id: Option<Uuid>,
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            status_id: None,
            organization_id: None,
            assigned_engineer_id: None,
            system_type_id: None,
            search: None,
            limit: 50,
            offset: 0,
        }
    }
}

// ───────────────────────────────────────
// Import provenance
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ImportRun {
    pub id: Uuid,
    pub source_file: String,
    pub source_sha256: String,
    pub total_rows: i64,
    pub invalid_rows: i64,
    pub inserted: i64,
    pub skipped: i64,
    pub errors: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewImportRun {
    pub source_file: String,
    pub source_sha256: String,
    pub total_rows: i64,
    pub invalid_rows: i64,
    pub inserted: i64,
    pub skipped: i64,
    pub errors: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
