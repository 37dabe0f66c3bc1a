// tests/pipeline.rs

//! End-to-end import pipeline tests over the in-memory store: one CSV
//! extract in, reconciled entities and deduplicated tasks out.

use std::collections::HashSet;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use calldesk_api::error::StoreError;
use calldesk_api::ingest::{self, ImportRow};
use calldesk_api::models::{
    NewServiceTask, TaskFilter, STATUS_COMPLETED, STATUS_IN_PROGRESS, STATUS_NOT_STARTED,
};
use calldesk_api::recon::{self, IMPORT_CHUNK_SIZE};
use calldesk_api::reports;
use calldesk_api::store::{MemStore, Store};

const EXTRACT: &str = "\
Байгууллагын нэр,Байр,Томилогдсон инженер,Системийн төрөл,Дуудлагын төрөл,Төлөв,Шалтгаан,Engineering Comment,АКТ,Дуудлага хүлээн авсан огноо,Дууссан огноо,Path
Номин Холдинг,Төв байр,Бат [Staff];#1001,CCTV,Засвар;#Яаралтай,Completed,Камер ажиллахгүй,Шинэ камер тавьсан,2024001,45292,45293,/2024/01/call-001
Номин Холдинг,Төв байр,Бат [Staff];#1001,Дохиолол,Засвар,In progress,Мэдрэгч эвдэрсэн,,,45293,,/2024/01/call-002
Апекс ХХК,nan,Unknown,CCTV,Суурилуулалт,,Шинэ салбарт камер хэрэгтэй,,2024002,45294,,/2024/01/call-003
Номин Холдинг,Төв байр,Бат [Staff];#1001,CCTV,Засвар;#Яаралтай,Completed,Камер ажиллахгүй,Шинэ камер тавьсан,2024001,45292,45293,/2024/01/call-001
,,,,,,,,,,,
";

#[tokio::test]
async fn import_reconciles_entities_and_inserts_tasks() {
    let store = MemStore::new();
    let rows = ingest::read_rows(EXTRACT.as_bytes()).unwrap();

    let summary = recon::run_import(&store, &rows, IMPORT_CHUNK_SIZE)
        .await
        .unwrap();

    assert_eq!(summary.total_rows, 5);
    assert_eq!(summary.invalid_rows, 1); // the empty trailer row
    assert_eq!(summary.inserted, 3);
    assert_eq!(summary.skipped, 1); // in-file repeat of call-001
    assert_eq!(summary.errors, 0);
    assert!(summary.chunk_errors.is_empty());
    assert_eq!(summary.entities.organizations, 2);
    assert_eq!(summary.entities.buildings, 1); // "nan" cell is not a building
    assert_eq!(summary.entities.engineers, 1);
    assert_eq!(summary.entities.system_types, 2);
    assert_eq!(summary.entities.call_types, 3); // Засвар, Яаралтай, Суурилуулалт

    let engineers = store.list_engineers().await.unwrap();
    assert_eq!(engineers.len(), 1);
    assert_eq!(engineers[0].full_name, "Бат");
    assert_eq!(engineers[0].employee_code.as_deref(), Some("1001"));

    let page = store.list_tasks(&TaskFilter::default()).await.unwrap();
    assert_eq!(page.total, 3);

    // Newest received first: call-003 tops the list.
    let top = &page.items[0];
    assert_eq!(top.organization_name.as_deref(), Some("Апекс ХХК"));
    assert_eq!(top.building_name, None);
    assert_eq!(top.engineer_name, None);
    assert_eq!(top.status_name.as_deref(), Some(STATUS_NOT_STARTED));
    assert_eq!(top.call_type_name.as_deref(), Some("Суурилуулалт"));
    assert_eq!(top.resolution_days, None);

    let detail = store.get_task(page.items[2].id).await.unwrap();
    assert_eq!(detail.original_path.as_deref(), Some("/2024/01/call-001"));
    assert_eq!(detail.status_name.as_deref(), Some(STATUS_COMPLETED));
    assert_eq!(detail.system_type_name.as_deref(), Some("CCTV"));
    // First tag of "Засвар;#Яаралтай" is the effective call type.
    assert_eq!(detail.call_type_name.as_deref(), Some("Засвар"));
    assert_eq!(detail.akt_number, Some(2024001));
    assert_eq!(detail.resolution_days, Some(1));
}

#[tokio::test]
async fn reimport_of_the_same_extract_changes_nothing() {
    let store = MemStore::new();
    let rows = ingest::read_rows(EXTRACT.as_bytes()).unwrap();

    recon::run_import(&store, &rows, IMPORT_CHUNK_SIZE)
        .await
        .unwrap();
    let again = recon::run_import(&store, &rows, IMPORT_CHUNK_SIZE)
        .await
        .unwrap();

    assert_eq!(again.inserted, 0);
    assert_eq!(again.skipped, 4); // every valid row is already persisted
    assert_eq!(again.invalid_rows, 1);
    assert_eq!(again.errors, 0);
    assert_eq!(again.entities.organizations, 0);
    assert_eq!(again.entities.buildings, 0);
    assert_eq!(again.entities.engineers, 0);
    assert_eq!(again.entities.system_types, 0);
    assert_eq!(again.entities.call_types, 0);

    let page = store.list_tasks(&TaskFilter::default()).await.unwrap();
    assert_eq!(page.total, 3);
}

#[tokio::test]
async fn read_file_hashes_the_extract_bytes() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(EXTRACT.as_bytes()).unwrap();

    let (rows, digest) = ingest::read_file(file.path()).unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(digest, ingest::source_digest(EXTRACT.as_bytes()));
    assert_eq!(digest.len(), 64);
}

// ───────────────────────────────────────
// Partial failure
// ───────────────────────────────────────

/// Delegates everything to a [`MemStore`] but fails chosen
/// `insert_tasks` calls, standing in for a database connection that
/// dies mid-import.
struct FlakyStore {
    mem: MemStore,
    fail_calls: HashSet<u64>,
    calls: AtomicU64,
}

impl FlakyStore {
    fn failing_calls(mem: MemStore, fail_calls: impl IntoIterator<Item = u64>) -> Self {
        Self {
            mem,
            fail_calls: fail_calls.into_iter().collect(),
            calls: AtomicU64::new(0),
        }
    }
}

#[async_trait::async_trait]
impl Store for FlakyStore {
    async fn upsert_organization(
        &self,
        name: &str,
        name_en: Option<&str>,
    ) -> Result<(calldesk_api::models::Organization, bool), StoreError> {
        self.mem.upsert_organization(name, name_en).await
    }
    async fn list_organizations(
        &self,
    ) -> Result<Vec<calldesk_api::models::Organization>, StoreError> {
        self.mem.list_organizations().await
    }
    async fn get_organization(
        &self,
        id: Uuid,
    ) -> Result<calldesk_api::models::Organization, StoreError> {
        self.mem.get_organization(id).await
    }
    async fn update_organization(
        &self,
        id: Uuid,
        patch: calldesk_api::models::OrganizationPatch,
    ) -> Result<calldesk_api::models::Organization, StoreError> {
        self.mem.update_organization(id, patch).await
    }
    async fn delete_organization(&self, id: Uuid) -> Result<(), StoreError> {
        self.mem.delete_organization(id).await
    }

    async fn upsert_building(
        &self,
        organization_id: Uuid,
        name: &str,
    ) -> Result<(calldesk_api::models::Building, bool), StoreError> {
        self.mem.upsert_building(organization_id, name).await
    }
    async fn list_buildings(
        &self,
        organization_id: Option<Uuid>,
    ) -> Result<Vec<calldesk_api::models::Building>, StoreError> {
        self.mem.list_buildings(organization_id).await
    }
    async fn update_building(
        &self,
        id: Uuid,
        patch: calldesk_api::models::BuildingPatch,
    ) -> Result<calldesk_api::models::Building, StoreError> {
        self.mem.update_building(id, patch).await
    }
    async fn delete_building(&self, id: Uuid) -> Result<(), StoreError> {
        self.mem.delete_building(id).await
    }
    async fn merge_building(&self, duplicate: Uuid, keeper: Uuid) -> Result<u64, StoreError> {
        self.mem.merge_building(duplicate, keeper).await
    }

    async fn upsert_engineer(
        &self,
        full_name: &str,
        employee_code: Option<&str>,
    ) -> Result<(calldesk_api::models::Engineer, bool), StoreError> {
        self.mem.upsert_engineer(full_name, employee_code).await
    }
    async fn list_engineers(&self) -> Result<Vec<calldesk_api::models::Engineer>, StoreError> {
        self.mem.list_engineers().await
    }
    async fn update_engineer(
        &self,
        id: Uuid,
        patch: calldesk_api::models::EngineerPatch,
    ) -> Result<calldesk_api::models::Engineer, StoreError> {
        self.mem.update_engineer(id, patch).await
    }
    async fn delete_engineer(&self, id: Uuid) -> Result<(), StoreError> {
        self.mem.delete_engineer(id).await
    }
    async fn merge_engineer(&self, duplicate: Uuid, keeper: Uuid) -> Result<u64, StoreError> {
        self.mem.merge_engineer(duplicate, keeper).await
    }

    async fn upsert_system_type(
        &self,
        name: &str,
    ) -> Result<(calldesk_api::models::SystemType, bool), StoreError> {
        self.mem.upsert_system_type(name).await
    }
    async fn list_system_types(
        &self,
    ) -> Result<Vec<calldesk_api::models::SystemType>, StoreError> {
        self.mem.list_system_types().await
    }
    async fn update_system_type(
        &self,
        id: Uuid,
        patch: calldesk_api::models::SystemTypePatch,
    ) -> Result<calldesk_api::models::SystemType, StoreError> {
        self.mem.update_system_type(id, patch).await
    }
    async fn delete_system_type(&self, id: Uuid) -> Result<(), StoreError> {
        self.mem.delete_system_type(id).await
    }

    async fn upsert_call_type(
        &self,
        name: &str,
    ) -> Result<(calldesk_api::models::CallType, bool), StoreError> {
        self.mem.upsert_call_type(name).await
    }
    async fn list_call_types(&self) -> Result<Vec<calldesk_api::models::CallType>, StoreError> {
        self.mem.list_call_types().await
    }
    async fn update_call_type(
        &self,
        id: Uuid,
        patch: calldesk_api::models::CallTypePatch,
    ) -> Result<calldesk_api::models::CallType, StoreError> {
        self.mem.update_call_type(id, patch).await
    }
    async fn delete_call_type(&self, id: Uuid) -> Result<(), StoreError> {
        self.mem.delete_call_type(id).await
    }

    async fn upsert_task_status(
        &self,
        name: &str,
        color: Option<&str>,
        sort_order: i32,
    ) -> Result<(calldesk_api::models::TaskStatus, bool), StoreError> {
        self.mem.upsert_task_status(name, color, sort_order).await
    }
    async fn list_task_statuses(
        &self,
    ) -> Result<Vec<calldesk_api::models::TaskStatus>, StoreError> {
        self.mem.list_task_statuses().await
    }
    async fn update_task_status(
        &self,
        id: Uuid,
        patch: calldesk_api::models::TaskStatusPatch,
    ) -> Result<calldesk_api::models::TaskStatus, StoreError> {
        self.mem.update_task_status(id, patch).await
    }

    async fn insert_task(
        &self,
        task: NewServiceTask,
    ) -> Result<calldesk_api::models::ServiceTask, StoreError> {
        self.mem.insert_task(task).await
    }
    async fn insert_tasks(&self, tasks: &[NewServiceTask]) -> Result<u64, StoreError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_calls.contains(&call) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.mem.insert_tasks(tasks).await
    }
    async fn list_tasks(
        &self,
        filter: &TaskFilter,
    ) -> Result<calldesk_api::models::TaskPage, StoreError> {
        self.mem.list_tasks(filter).await
    }
    async fn get_task(&self, id: Uuid) -> Result<calldesk_api::models::TaskDetail, StoreError> {
        self.mem.get_task(id).await
    }
    async fn update_task(
        &self,
        id: Uuid,
        patch: calldesk_api::models::TaskPatch,
    ) -> Result<calldesk_api::models::ServiceTask, StoreError> {
        self.mem.update_task(id, patch).await
    }
    async fn delete_task(&self, id: Uuid) -> Result<(), StoreError> {
        self.mem.delete_task(id).await
    }
    async fn delete_tasks(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        self.mem.delete_tasks(ids).await
    }
    async fn existing_task_keys(
        &self,
    ) -> Result<HashSet<calldesk_api::models::TaskKey>, StoreError> {
        self.mem.existing_task_keys().await
    }
    async fn task_identities(
        &self,
    ) -> Result<Vec<calldesk_api::models::TaskIdentity>, StoreError> {
        self.mem.task_identities().await
    }
    async fn task_facts(&self) -> Result<Vec<calldesk_api::models::TaskFacts>, StoreError> {
        self.mem.task_facts().await
    }

    async fn record_import_run(
        &self,
        run: calldesk_api::models::NewImportRun,
    ) -> Result<calldesk_api::models::ImportRun, StoreError> {
        self.mem.record_import_run(run).await
    }
    async fn list_import_runs(&self) -> Result<Vec<calldesk_api::models::ImportRun>, StoreError> {
        self.mem.list_import_runs().await
    }
}

fn extract_row(day: u32, path: &str) -> ImportRow {
    ImportRow {
        organization: Some("Тэнгэр Систем".to_string()),
        received_at: Some(Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap()),
        original_path: Some(path.to_string()),
        ..ImportRow::default()
    }
}

#[tokio::test]
async fn failed_chunk_rows_count_as_errors_and_stay_importable() {
    let mem = MemStore::new();
    let flaky = FlakyStore::failing_calls(mem.clone(), [0]);
    let rows = vec![extract_row(1, "/a"), extract_row(2, "/b")];

    // Chunk size 1: the first chunk dies, the second lands, the run
    // keeps going.
    let summary = recon::run_import(&flaky, &rows, 1).await.unwrap();
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.chunk_errors.len(), 1);

    let page = mem.list_tasks(&TaskFilter::default()).await.unwrap();
    assert_eq!(page.total, 1);

    // The failed row never joined the persisted identity set, so a
    // retry picks it up and skips only the row that landed.
    let retry = recon::run_import(&mem, &rows, 1).await.unwrap();
    assert_eq!(retry.inserted, 1);
    assert_eq!(retry.skipped, 1);
    assert_eq!(retry.errors, 0);

    let page = mem.list_tasks(&TaskFilter::default()).await.unwrap();
    assert_eq!(page.total, 2);
}

// ───────────────────────────────────────
// Duplicate repair
// ───────────────────────────────────────

fn task_for(
    org: Uuid,
    building: Option<Uuid>,
    engineer: Option<Uuid>,
    status: Uuid,
    day: u32,
) -> NewServiceTask {
    NewServiceTask {
        organization_id: Some(org),
        building_id: building,
        assigned_engineer_id: engineer,
        status_id: status,
        system_type_id: None,
        call_type_id: None,
        description: None,
        engineering_comment: None,
        akt_number: None,
        received_at: Utc.with_ymd_and_hms(2024, 6, day, 8, 0, 0).unwrap(),
        completed_at: None,
        original_path: None,
    }
}

#[tokio::test]
async fn merge_repairs_whitespace_duplicates_and_repoints_tasks() {
    let store = MemStore::new();
    let (org, _) = store.upsert_organization("Номин Холдинг", None).await.unwrap();
    let statuses = store.list_task_statuses().await.unwrap();
    let status = statuses
        .iter()
        .find(|s| s.name == STATUS_NOT_STARTED)
        .unwrap()
        .id;

    // Same building and engineer twice, once with a stray trailing
    // space, as older extracts produced them.
    let (keeper_b, _) = store.upsert_building(org.id, "Баянгол").await.unwrap();
    let (dup_b, created) = store.upsert_building(org.id, "Баянгол ").await.unwrap();
    assert!(created, "whitespace variant lands as its own row");
    let (keeper_e, _) = store.upsert_engineer("Дорж", None).await.unwrap();
    let (dup_e, _) = store.upsert_engineer("Дорж ", None).await.unwrap();

    store
        .insert_task(task_for(org.id, Some(dup_b.id), Some(dup_e.id), status, 1))
        .await
        .unwrap();
    store
        .insert_task(task_for(org.id, Some(dup_b.id), None, status, 2))
        .await
        .unwrap();
    store
        .insert_task(task_for(org.id, Some(keeper_b.id), Some(keeper_e.id), status, 3))
        .await
        .unwrap();

    let report = recon::duplicate_report(&store).await.unwrap();
    assert_eq!(report.buildings, vec![("Баянгол".to_string(), 2)]);
    assert_eq!(report.engineers, vec![("Дорж".to_string(), 2)]);
    assert_eq!(report.total_tasks, 3);
    assert_eq!(report.duplicate_tasks, 0);

    // Dry run reports without touching anything.
    let dry = recon::merge_duplicate_buildings(&store, false).await.unwrap();
    assert_eq!(dry.groups, 1);
    assert_eq!(dry.duplicates, 1);
    assert_eq!(dry.remapped_tasks, 0);
    assert_eq!(dry.deleted, 0);
    assert_eq!(store.list_buildings(None).await.unwrap().len(), 2);

    let merged = recon::merge_duplicate_buildings(&store, true).await.unwrap();
    assert_eq!(merged.remapped_tasks, 2);
    assert_eq!(merged.deleted, 1);
    let buildings = store.list_buildings(None).await.unwrap();
    assert_eq!(buildings.len(), 1);
    // Oldest spelling survives.
    assert_eq!(buildings[0].id, keeper_b.id);
    assert_eq!(buildings[0].name, "Баянгол");

    let merged = recon::merge_duplicate_engineers(&store, true).await.unwrap();
    assert_eq!(merged.remapped_tasks, 1);
    assert_eq!(merged.deleted, 1);
    let engineers = store.list_engineers().await.unwrap();
    assert_eq!(engineers.len(), 1);
    assert_eq!(engineers[0].id, keeper_e.id);

    // Every task now points at the keepers.
    let page = store.list_tasks(&TaskFilter::default()).await.unwrap();
    assert_eq!(page.total, 3);
    for item in &page.items {
        assert_eq!(item.building_id, Some(keeper_b.id));
        assert!(item.assigned_engineer_id.map_or(true, |id| id == keeper_e.id));
    }

    // Identity uniqueness held throughout, so the purge finds nothing.
    let purge = recon::purge_duplicate_tasks(&store, true).await.unwrap();
    assert_eq!(purge.duplicates, 0);
    assert_eq!(purge.deleted, 0);
    assert_eq!(
        store.list_tasks(&TaskFilter::default()).await.unwrap().total,
        3
    );
}

#[tokio::test]
async fn referenced_rows_cannot_be_deleted() {
    let store = MemStore::new();
    let rows = ingest::read_rows(EXTRACT.as_bytes()).unwrap();
    recon::run_import(&store, &rows, IMPORT_CHUNK_SIZE)
        .await
        .unwrap();

    let engineer = store.list_engineers().await.unwrap().remove(0);
    let err = store.delete_engineer(engineer.id).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::ReferentialIntegrity { references: 2, .. }
    ));

    // Still listed, still assigned.
    assert_eq!(store.list_engineers().await.unwrap().len(), 1);
}

// ───────────────────────────────────────
// Reports over an imported store
// ───────────────────────────────────────

#[tokio::test]
async fn reports_add_up_over_an_imported_extract() {
    let store = MemStore::new();
    let rows = ingest::read_rows(EXTRACT.as_bytes()).unwrap();
    recon::run_import(&store, &rows, IMPORT_CHUNK_SIZE)
        .await
        .unwrap();

    let facts = store.task_facts().await.unwrap();
    assert_eq!(facts.len(), 3);

    let now = Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap();
    let kpis = reports::dashboard_kpis(&facts, now);
    assert_eq!(kpis.total_tasks, 3);
    assert_eq!(kpis.completed_tasks, 1);
    assert_eq!(kpis.in_progress_tasks, 1);
    assert_eq!(kpis.not_started_tasks, 1);
    assert_eq!(kpis.completion_rate, 33.3);
    assert_eq!(kpis.avg_resolution_days, 1.0);
    assert_eq!(kpis.todays_tasks, 1); // call-003, received 2024-01-03
    assert_eq!(kpis.this_month_tasks, 3);

    let months = reports::monthly_stats(&facts);
    assert_eq!(months.len(), 1);
    assert_eq!(months[0].month, "2024-01");
    assert_eq!(months[0].total, 3);
    assert_eq!(months[0].completed, 1);

    let engineers = reports::engineer_performance(&facts);
    assert_eq!(engineers.len(), 1);
    assert_eq!(engineers[0].full_name, "Бат");
    assert_eq!(engineers[0].total_tasks, 2);
    assert_eq!(engineers[0].completed_tasks, 1);
    assert_eq!(engineers[0].completion_rate, 50.0);

    let systems = reports::system_type_stats(&facts);
    assert_eq!(systems.len(), 2);
    assert_eq!(systems[0].name, "CCTV");
    assert_eq!(systems[0].total, 2);
    assert_eq!(systems[0].percentage, 66.7);
    let share: f64 = systems.iter().map(|s| s.percentage).sum();
    assert!((share - 100.0).abs() < 0.2);

    let orgs = reports::organization_stats(&facts);
    assert_eq!(orgs.len(), 2);
    assert_eq!(orgs[0].name, "Номин Холдинг");
    assert_eq!(orgs[0].total_tasks, 2);

    let slices = reports::status_distribution(&facts);
    assert_eq!(slices.len(), 3);
    let counted: u64 = slices.iter().map(|s| s.count).sum();
    assert_eq!(counted, 3);
    // Seeded statuses carry their configured colors into the chart.
    let done = slices.iter().find(|s| s.name == STATUS_COMPLETED).unwrap();
    assert_eq!(done.color, "#22c55e");
    let open = slices.iter().find(|s| s.name == STATUS_IN_PROGRESS).unwrap();
    assert_eq!(open.count, 1);
}

#[tokio::test]
async fn import_run_provenance_is_recorded() {
    let store = MemStore::new();
    let rows = ingest::read_rows(EXTRACT.as_bytes()).unwrap();
    let started_at = Utc::now();
    let summary = recon::run_import(&store, &rows, IMPORT_CHUNK_SIZE)
        .await
        .unwrap();

    store
        .record_import_run(calldesk_api::models::NewImportRun {
            source_file: "extract.csv".to_string(),
            source_sha256: ingest::source_digest(EXTRACT.as_bytes()),
            total_rows: summary.total_rows as i64,
            invalid_rows: summary.invalid_rows as i64,
            inserted: summary.inserted as i64,
            skipped: summary.skipped as i64,
            errors: summary.errors as i64,
            started_at,
            finished_at: Utc::now(),
        })
        .await
        .unwrap();

    let runs = store.list_import_runs().await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].total_rows, 5);
    assert_eq!(runs[0].inserted, 3);
    assert_eq!(runs[0].source_file, "extract.csv");
}

// Arc<dyn Store> is how the HTTP layer holds the store; make sure the
// trait stays object safe.
#[tokio::test]
async fn store_remains_object_safe() {
    let store: Arc<dyn Store> = Arc::new(MemStore::new());
    let (org, created) = store.upsert_organization("Юнивишн", None).await.unwrap();
    assert!(created);
    assert_eq!(store.get_organization(org.id).await.unwrap().name, "Юнивишн");
}
