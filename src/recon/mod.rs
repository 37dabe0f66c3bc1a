// src/recon/mod.rs

//! Entity reconciliation and the chunked import runner.
//!
//! Importing an extract happens in two passes: first every distinct
//! organization, building, engineer, system type and call type is
//! upserted so the batch maps names onto canonical ids; then the task
//! rows are deduplicated against the persisted identity tuples and
//! inserted chunk by chunk. A failed chunk is recorded and skipped,
//! the run keeps going.
//!
//! The same module carries the duplicate-repair planners used by the
//! `check-duplicates` and `fix-duplicates` commands.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::error::StoreError;
use crate::ingest::{EngineerRef, ImportRow};
use crate::models::{
    Building, Engineer, NewServiceTask, TaskIdentity, TaskKey, DEFAULT_STATUS, STATUS_SEED,
};
use crate::store::Store;

/// Tasks are written (and purged) in chunks of this many rows.
pub const IMPORT_CHUNK_SIZE: usize = 100;

// ───────────────────────────────────────
// Pass 1: entities
// ───────────────────────────────────────

/// Distinct entities referenced by a batch of rows, in first-seen
/// order. Buildings are only collected for rows that also name an
/// organization, since a building cannot exist without one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityBatch {
    pub organizations: Vec<String>,
    pub buildings: Vec<(String, String)>, // (organization, building)
    pub engineers: Vec<EngineerRef>,
    pub system_types: Vec<String>,
    pub call_types: Vec<String>,
}

pub fn reconcile_entities(rows: &[ImportRow]) -> EntityBatch {
    let mut batch = EntityBatch::default();
    let mut orgs = HashSet::new();
    let mut buildings = HashSet::new();
    let mut engineers = HashSet::new();
    let mut systems = HashSet::new();
    let mut calls = HashSet::new();

    for row in rows {
        if let Some(org) = &row.organization {
            if orgs.insert(org.clone()) {
                batch.organizations.push(org.clone());
            }
            if let Some(building) = &row.building {
                if buildings.insert((org.clone(), building.clone())) {
                    batch.buildings.push((org.clone(), building.clone()));
                }
            }
        }
        if let Some(engineer) = &row.engineer {
            if engineers.insert(engineer.identity_key().to_string()) {
                batch.engineers.push(engineer.clone());
            }
        }
        if let Some(system) = &row.system_type {
            if systems.insert(system.clone()) {
                batch.system_types.push(system.clone());
            }
        }
        for tag in &row.call_tags {
            if calls.insert(tag.clone()) {
                batch.call_types.push(tag.clone());
            }
        }
    }
    batch
}

/// Name → canonical id lookups for one import run.
#[derive(Debug, Default)]
pub struct EntityMaps {
    pub organizations: HashMap<String, Uuid>,
    pub buildings: HashMap<String, Uuid>, // keyed "org|building"
    pub engineers: HashMap<String, Uuid>, // keyed by identity key
    pub system_types: HashMap<String, Uuid>,
    pub call_types: HashMap<String, Uuid>,
    pub statuses: HashMap<String, Uuid>,
    pub default_status: Uuid,
}

fn building_key(org: &str, building: &str) -> String {
    format!("{org}|{building}")
}

/// Entities actually created by this run (pre-existing rows are not
/// counted).
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityCounts {
    pub organizations: u64,
    pub buildings: u64,
    pub engineers: u64,
    pub system_types: u64,
    pub call_types: u64,
}

/// Upserts every entity of the batch and returns the name → id maps
/// the task pass needs. Entity-level store failures abort the run;
/// name collisions are not failures, the existing row wins.
pub async fn apply_entities<S: Store + ?Sized>(
    store: &S,
    batch: &EntityBatch,
) -> Result<(EntityMaps, EntityCounts), StoreError> {
    let mut maps = EntityMaps::default();
    let mut counts = EntityCounts::default();

    for name in &batch.organizations {
        let (org, created) = store.upsert_organization(name, None).await?;
        counts.organizations += u64::from(created);
        maps.organizations.insert(name.clone(), org.id);
    }
    for (org_name, name) in &batch.buildings {
        let Some(&org_id) = maps.organizations.get(org_name) else {
            continue;
        };
        let (building, created) = store.upsert_building(org_id, name).await?;
        counts.buildings += u64::from(created);
        maps.buildings.insert(building_key(org_name, name), building.id);
    }
    for engineer in &batch.engineers {
        let (row, created) = store
            .upsert_engineer(&engineer.full_name, engineer.employee_code.as_deref())
            .await?;
        counts.engineers += u64::from(created);
        maps.engineers
            .insert(engineer.identity_key().to_string(), row.id);
    }
    for name in &batch.system_types {
        let (row, created) = store.upsert_system_type(name).await?;
        counts.system_types += u64::from(created);
        maps.system_types.insert(name.clone(), row.id);
    }
    for name in &batch.call_types {
        let (row, created) = store.upsert_call_type(name).await?;
        counts.call_types += u64::from(created);
        maps.call_types.insert(name.clone(), row.id);
    }

    for status in store.list_task_statuses().await? {
        maps.statuses.insert(status.name.clone(), status.id);
    }
    maps.default_status = match maps.statuses.get(DEFAULT_STATUS) {
        Some(&id) => id,
        None => {
            let (name, color, sort_order) = STATUS_SEED[0];
            let (row, _) = store.upsert_task_status(name, Some(color), sort_order).await?;
            maps.statuses.insert(row.name.clone(), row.id);
            row.id
        }
    };

    Ok((maps, counts))
}

// ───────────────────────────────────────
// Pass 2: tasks
// ───────────────────────────────────────

/// Maps rows onto insertable tasks. Rows without a receipt timestamp
/// identify nothing and are counted as invalid. Unmapped names fall
/// back to NULL references; an unknown status falls back to the
/// default status.
pub fn map_tasks(rows: &[ImportRow], maps: &EntityMaps) -> (Vec<NewServiceTask>, u64) {
    let mut tasks = Vec::new();
    let mut invalid = 0u64;
    for row in rows {
        let Some(received_at) = row.received_at else {
            invalid += 1;
            continue;
        };
        let organization_id = row
            .organization
            .as_ref()
            .and_then(|org| maps.organizations.get(org))
            .copied();
        let building_id = match (&row.organization, &row.building) {
            (Some(org), Some(building)) => {
                maps.buildings.get(&building_key(org, building)).copied()
            }
            _ => None,
        };
        let assigned_engineer_id = row
            .engineer
            .as_ref()
            .and_then(|e| maps.engineers.get(e.identity_key()))
            .copied();
        let status_id = row
            .status
            .as_ref()
            .and_then(|s| maps.statuses.get(s))
            .copied()
            .unwrap_or(maps.default_status);
        let system_type_id = row
            .system_type
            .as_ref()
            .and_then(|s| maps.system_types.get(s))
            .copied();
        let call_type_id = row
            .call_tags
            .first()
            .and_then(|tag| maps.call_types.get(tag))
            .copied();
        tasks.push(NewServiceTask {
            organization_id,
            building_id,
            assigned_engineer_id,
            status_id,
            system_type_id,
            call_type_id,
            description: row.description.clone(),
            engineering_comment: row.engineering_comment.clone(),
            akt_number: row.akt_number,
            received_at,
            completed_at: row.completed_at,
            original_path: row.original_path.clone(),
        });
    }
    (tasks, invalid)
}

#[derive(Debug)]
pub struct DedupOutcome {
    pub to_insert: Vec<NewServiceTask>,
    pub skipped: u64,
}

/// Drops candidates whose identity tuple is already persisted or was
/// already emitted earlier in this call, so duplicate detection is
/// cumulative across one run. `existing` is left untouched: keys only
/// join the persisted set once their chunk actually lands.
pub fn dedup_tasks(candidates: Vec<NewServiceTask>, existing: &HashSet<TaskKey>) -> DedupOutcome {
    let mut seen: HashSet<TaskKey> = HashSet::new();
    let mut outcome = DedupOutcome {
        to_insert: Vec::new(),
        skipped: 0,
    };
    for task in candidates {
        let key = task.identity_key();
        if existing.contains(&key) || !seen.insert(key) {
            outcome.skipped += 1;
        } else {
            outcome.to_insert.push(task);
        }
    }
    outcome
}

/// What one import run did.
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub total_rows: u64,
    pub invalid_rows: u64,
    pub inserted: u64,
    pub skipped: u64,
    pub errors: u64,
    pub entities: EntityCounts,
    pub chunk_errors: Vec<String>,
}

/// Runs a full import: entity pass, then task chunks. A failing chunk
/// counts all of its would-be inserts as errors and the run continues;
/// only entity-pass store failures abort.
pub async fn run_import<S: Store + ?Sized>(
    store: &S,
    rows: &[ImportRow],
    chunk_size: usize,
) -> Result<ImportSummary, StoreError> {
    let batch = reconcile_entities(rows);
    let (maps, entities) = apply_entities(store, &batch).await?;
    let mut existing = store.existing_task_keys().await?;

    let mut summary = ImportSummary {
        total_rows: rows.len() as u64,
        entities,
        ..ImportSummary::default()
    };

    for chunk in rows.chunks(chunk_size.max(1)) {
        let (candidates, invalid) = map_tasks(chunk, &maps);
        summary.invalid_rows += invalid;

        let outcome = dedup_tasks(candidates, &existing);
        summary.skipped += outcome.skipped;
        if outcome.to_insert.is_empty() {
            continue;
        }

        let keys: Vec<TaskKey> = outcome.to_insert.iter().map(|t| t.identity_key()).collect();
        match store.insert_tasks(&outcome.to_insert).await {
            Ok(inserted) => {
                summary.inserted += inserted;
                existing.extend(keys);
                tracing::info!(inserted, total = summary.inserted, "task chunk written");
            }
            Err(e) => {
                summary.errors += outcome.to_insert.len() as u64;
                summary.chunk_errors.push(e.to_string());
                tracing::warn!(error = %e, rows = outcome.to_insert.len(), "task chunk failed");
            }
        }
    }

    Ok(summary)
}

// ───────────────────────────────────────
// Duplicate repair
// ───────────────────────────────────────

/// One set of rows that are the same real-world entity. The keeper is
/// the oldest row (ties broken by input order).
#[derive(Debug, Clone)]
pub struct MergeGroup {
    pub label: String,
    pub keeper: Uuid,
    pub duplicates: Vec<Uuid>,
}

/// Groups buildings of the same organization whose trimmed names
/// match. Only groups with at least one duplicate are returned.
pub fn building_merge_groups(buildings: &[Building]) -> Vec<MergeGroup> {
    let mut by_age: Vec<&Building> = buildings.iter().collect();
    by_age.sort_by_key(|b| b.created_at);

    let mut index: HashMap<(Uuid, String), usize> = HashMap::new();
    let mut groups: Vec<MergeGroup> = Vec::new();
    for building in by_age {
        let key = (building.organization_id, building.name.trim().to_string());
        match index.get(&key) {
            None => {
                index.insert(key, groups.len());
                groups.push(MergeGroup {
                    label: building.name.trim().to_string(),
                    keeper: building.id,
                    duplicates: Vec::new(),
                });
            }
            Some(&slot) => groups[slot].duplicates.push(building.id),
        }
    }
    groups.retain(|g| !g.duplicates.is_empty());
    groups
}

/// Groups engineers by identity key (employee code when present, else
/// trimmed full name).
pub fn engineer_merge_groups(engineers: &[Engineer]) -> Vec<MergeGroup> {
    let mut by_age: Vec<&Engineer> = engineers.iter().collect();
    by_age.sort_by_key(|e| e.created_at);

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<MergeGroup> = Vec::new();
    for engineer in by_age {
        let key = engineer.identity_key().trim().to_string();
        match index.get(&key) {
            None => {
                index.insert(key, groups.len());
                groups.push(MergeGroup {
                    label: engineer.full_name.clone(),
                    keeper: engineer.id,
                    duplicates: Vec::new(),
                });
            }
            Some(&slot) => groups[slot].duplicates.push(engineer.id),
        }
    }
    groups.retain(|g| !g.duplicates.is_empty());
    groups
}

#[derive(Debug, Default)]
pub struct MergeSummary {
    pub groups: u64,
    pub duplicates: u64,
    pub remapped_tasks: u64,
    pub deleted: u64,
}

/// Merges duplicate buildings into their keeper: tasks are repointed,
/// then the duplicate row is deleted. With `apply` false this only
/// reports what would happen.
pub async fn merge_duplicate_buildings<S: Store + ?Sized>(
    store: &S,
    apply: bool,
) -> Result<MergeSummary, StoreError> {
    let buildings = store.list_buildings(None).await?;
    let groups = building_merge_groups(&buildings);
    let mut summary = MergeSummary::default();
    for group in groups {
        summary.groups += 1;
        summary.duplicates += group.duplicates.len() as u64;
        if !apply {
            continue;
        }
        for duplicate in group.duplicates {
            summary.remapped_tasks += store.merge_building(duplicate, group.keeper).await?;
            summary.deleted += 1;
        }
    }
    Ok(summary)
}

pub async fn merge_duplicate_engineers<S: Store + ?Sized>(
    store: &S,
    apply: bool,
) -> Result<MergeSummary, StoreError> {
    let engineers = store.list_engineers().await?;
    let groups = engineer_merge_groups(&engineers);
    let mut summary = MergeSummary::default();
    for group in groups {
        summary.groups += 1;
        summary.duplicates += group.duplicates.len() as u64;
        if !apply {
            continue;
        }
        for duplicate in group.duplicates {
            summary.remapped_tasks += store.merge_engineer(duplicate, group.keeper).await?;
            summary.deleted += 1;
        }
    }
    Ok(summary)
}

/// Ids of every task that shares its identity tuple with an older row.
pub fn duplicate_task_ids(identities: &[TaskIdentity]) -> Vec<Uuid> {
    let mut by_age: Vec<&TaskIdentity> = identities.iter().collect();
    by_age.sort_by_key(|t| t.created_at);

    let mut seen: HashSet<&TaskKey> = HashSet::new();
    let mut doomed = Vec::new();
    for identity in by_age {
        if !seen.insert(&identity.key) {
            doomed.push(identity.id);
        }
    }
    doomed
}

#[derive(Debug, Default)]
pub struct PurgeSummary {
    pub duplicates: u64,
    pub deleted: u64,
}

/// Deletes every task row whose identity tuple duplicates an older
/// row, in chunks. Dry-run by default.
pub async fn purge_duplicate_tasks<S: Store + ?Sized>(
    store: &S,
    apply: bool,
) -> Result<PurgeSummary, StoreError> {
    let identities = store.task_identities().await?;
    let doomed = duplicate_task_ids(&identities);
    let mut summary = PurgeSummary {
        duplicates: doomed.len() as u64,
        deleted: 0,
    };
    if !apply {
        return Ok(summary);
    }
    for chunk in doomed.chunks(IMPORT_CHUNK_SIZE) {
        summary.deleted += store.delete_tasks(chunk).await?;
    }
    Ok(summary)
}

// ───────────────────────────────────────
// Duplicate inspection
// ───────────────────────────────────────

#[derive(Debug, Default)]
pub struct DuplicateReport {
    pub organizations: Vec<(String, u64)>,
    pub buildings: Vec<(String, u64)>,
    pub engineers: Vec<(String, u64)>,
    pub total_tasks: u64,
    pub unique_tasks: u64,
    pub duplicate_tasks: u64,
}

fn over_represented(counts: HashMap<String, u64>) -> Vec<(String, u64)> {
    let mut rows: Vec<(String, u64)> = counts.into_iter().filter(|(_, n)| *n > 1).collect();
    rows.sort();
    rows
}

/// Read-only sweep for anything the unique constraints should have
/// prevented, plus near-duplicates that only differ by whitespace.
pub async fn duplicate_report<S: Store + ?Sized>(
    store: &S,
) -> Result<DuplicateReport, StoreError> {
    let mut report = DuplicateReport::default();

    let mut counts: HashMap<String, u64> = HashMap::new();
    for org in store.list_organizations().await? {
        *counts.entry(org.name.trim().to_string()).or_default() += 1;
    }
    report.organizations = over_represented(counts);

    let mut counts: HashMap<(Uuid, String), u64> = HashMap::new();
    for building in store.list_buildings(None).await? {
        *counts
            .entry((building.organization_id, building.name.trim().to_string()))
            .or_default() += 1;
    }
    let mut rows: Vec<(String, u64)> = counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|((_, name), n)| (name, n))
        .collect();
    rows.sort();
    report.buildings = rows;

    let mut counts: HashMap<String, u64> = HashMap::new();
    for engineer in store.list_engineers().await? {
        *counts
            .entry(engineer.identity_key().trim().to_string())
            .or_default() += 1;
    }
    report.engineers = over_represented(counts);

    let identities = store.task_identities().await?;
    report.total_tasks = identities.len() as u64;
    let unique: HashSet<&TaskKey> = identities.iter().map(|t| &t.key).collect();
    report.unique_tasks = unique.len() as u64;
    report.duplicate_tasks = report.total_tasks - report.unique_tasks;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn row(org: &str, building: &str, day: u32) -> ImportRow {
        ImportRow {
            organization: Some(org.to_string()),
            building: Some(building.to_string()),
            received_at: Some(Utc.with_ymd_and_hms(2024, 4, day, 10, 0, 0).unwrap()),
            ..ImportRow::default()
        }
    }

    #[test]
    fn reconcile_keeps_first_seen_order_and_dedups() {
        let mut a = row("Орг Б", "Байр 1", 1);
        a.system_type = Some("CCTV".into());
        a.call_tags = vec!["Засвар".into(), "Угсралт".into()];
        let mut b = row("Орг А", "Байр 1", 2);
        b.system_type = Some("CCTV".into());
        b.call_tags = vec!["Засвар".into()];
        let c = row("Орг Б", "Байр 1", 3);

        let batch = reconcile_entities(&[a, b, c]);
        assert_eq!(batch.organizations, vec!["Орг Б", "Орг А"]);
        assert_eq!(
            batch.buildings,
            vec![
                ("Орг Б".to_string(), "Байр 1".to_string()),
                ("Орг А".to_string(), "Байр 1".to_string()),
            ]
        );
        assert_eq!(batch.system_types, vec!["CCTV"]);
        assert_eq!(batch.call_types, vec!["Засвар", "Угсралт"]);
    }

    #[test]
    fn reconcile_dedups_engineers_by_code_first_spelling_wins() {
        let mut a = row("Орг", "Байр", 1);
        a.engineer = Some(EngineerRef {
            full_name: "Бат".into(),
            employee_code: Some("9".into()),
        });
        let mut b = row("Орг", "Байр", 2);
        b.engineer = Some(EngineerRef {
            full_name: "Бат-Эрдэнэ".into(),
            employee_code: Some("9".into()),
        });
        let batch = reconcile_entities(&[a, b]);
        assert_eq!(batch.engineers.len(), 1);
        assert_eq!(batch.engineers[0].full_name, "Бат");
    }

    #[test]
    fn reconcile_skips_buildings_without_an_organization() {
        let mut orphan = row("Орг", "Байр 9", 1);
        orphan.organization = None;
        let batch = reconcile_entities(&[orphan]);
        assert!(batch.organizations.is_empty());
        assert!(batch.buildings.is_empty());
    }

    #[test]
    fn map_tasks_counts_rows_without_receipt_as_invalid() {
        let maps = EntityMaps {
            default_status: Uuid::new_v4(),
            ..EntityMaps::default()
        };
        let mut bad = row("Орг", "Байр", 1);
        bad.received_at = None;
        let good = row("Орг", "Байр", 2);

        let (tasks, invalid) = map_tasks(&[bad, good], &maps);
        assert_eq!(invalid, 1);
        assert_eq!(tasks.len(), 1);
        // names the maps do not know fall back to NULL references
        assert_eq!(tasks[0].organization_id, None);
        assert_eq!(tasks[0].building_id, None);
        assert_eq!(tasks[0].status_id, maps.default_status);
    }

    #[test]
    fn map_tasks_resolves_known_names() {
        let mut maps = EntityMaps::default();
        let org = Uuid::new_v4();
        let building = Uuid::new_v4();
        let completed = Uuid::new_v4();
        maps.organizations.insert("Орг".into(), org);
        maps.buildings.insert(building_key("Орг", "Байр"), building);
        maps.statuses.insert("Completed".into(), completed);
        maps.default_status = Uuid::new_v4();

        let mut r = row("Орг", "Байр", 5);
        r.status = Some("Completed".into());
        let (tasks, invalid) = map_tasks(&[r], &maps);
        assert_eq!(invalid, 0);
        assert_eq!(tasks[0].organization_id, Some(org));
        assert_eq!(tasks[0].building_id, Some(building));
        assert_eq!(tasks[0].status_id, completed);
    }

    #[test]
    fn dedup_is_cumulative_within_one_call() {
        let status = Uuid::new_v4();
        let task = |day: u32| NewServiceTask {
            organization_id: None,
            building_id: None,
            assigned_engineer_id: None,
            status_id: status,
            system_type_id: None,
            call_type_id: None,
            description: None,
            engineering_comment: None,
            akt_number: None,
            received_at: Utc.with_ymd_and_hms(2024, 4, day, 10, 0, 0).unwrap(),
            completed_at: None,
            original_path: None,
        };
        let existing: HashSet<TaskKey> = [task(1).identity_key()].into_iter().collect();
        let outcome = dedup_tasks(vec![task(1), task(2), task(2), task(3)], &existing);
        assert_eq!(outcome.skipped, 2); // one persisted, one in-batch
        assert_eq!(outcome.to_insert.len(), 2);
    }

    #[test]
    fn dedup_ignores_payload_differences() {
        let status = Uuid::new_v4();
        let mk = |description: &str| NewServiceTask {
            organization_id: None,
            building_id: None,
            assigned_engineer_id: None,
            status_id: status,
            system_type_id: None,
            call_type_id: None,
            description: Some(description.to_string()),
            engineering_comment: None,
            akt_number: Some(12),
            received_at: Utc.with_ymd_and_hms(2024, 4, 1, 10, 0, 0).unwrap(),
            completed_at: None,
            original_path: None,
        };
        let outcome = dedup_tasks(vec![mk("Камер унтарсан"), mk("Камер")], &HashSet::new());
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.to_insert.len(), 1);
        assert_eq!(
            outcome.to_insert[0].description.as_deref(),
            Some("Камер унтарсан")
        );
    }

    #[test]
    fn building_groups_keep_the_oldest_row() {
        let org = Uuid::new_v4();
        let mk = |name: &str, minute: u32| Building {
            id: Uuid::new_v4(),
            organization_id: org,
            name: name.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 8, minute, 0).unwrap(),
        };
        let oldest = mk("Байр 1", 0);
        let newer = mk(" Байр 1", 5);
        let newest = mk("Байр 1 ", 9);
        let other = mk("Байр 2", 1);

        let groups =
            building_merge_groups(&[newer.clone(), newest.clone(), oldest.clone(), other]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].keeper, oldest.id);
        assert_eq!(groups[0].duplicates, vec![newer.id, newest.id]);
    }

    #[test]
    fn engineer_groups_key_on_code_else_name() {
        let mk = |name: &str, code: Option<&str>, minute: u32| Engineer {
            id: Uuid::new_v4(),
            full_name: name.to_string(),
            employee_code: code.map(str::to_string),
            is_active: true,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 8, minute, 0).unwrap(),
        };
        let a = mk("Бат", Some("7"), 0);
        let b = mk("Бат-Эрдэнэ", Some("7"), 1);
        let c = mk("Дорж", None, 2);
        let d = mk("Дорж", None, 3);
        let e = mk("Сүх", Some("8"), 4);

        let groups = engineer_merge_groups(&[a.clone(), b.clone(), c.clone(), d.clone(), e]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].keeper, a.id);
        assert_eq!(groups[0].duplicates, vec![b.id]);
        assert_eq!(groups[1].keeper, c.id);
        assert_eq!(groups[1].duplicates, vec![d.id]);
    }

    #[test]
    fn duplicate_task_ids_spare_the_oldest() {
        let key = TaskKey {
            organization_id: None,
            received_at: Utc.with_ymd_and_hms(2024, 4, 1, 10, 0, 0).unwrap(),
            original_path: None,
            akt_number: Some(3),
        };
        let mk = |minute: u32| TaskIdentity {
            id: Uuid::new_v4(),
            key: key.clone(),
            created_at: Utc.with_ymd_and_hms(2024, 4, 2, 8, minute, 0).unwrap(),
        };
        let oldest = mk(0);
        let dup_a = mk(1);
        let dup_b = mk(2);
        let doomed = duplicate_task_ids(&[dup_b.clone(), oldest.clone(), dup_a.clone()]);
        assert_eq!(doomed, vec![dup_a.id, dup_b.id]);
        assert!(!doomed.contains(&oldest.id));
    }
}
