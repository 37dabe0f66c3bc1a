// src/reports/mod.rs

//! Aggregation reporter. Every report is a pure function over the
//! denormalised [`TaskFacts`] rows, so the math is testable without a
//! database and a report over an empty store is just the zero value.
//!
//! Ratios are percentages rounded to one decimal place.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{TaskFacts, STATUS_COMPLETED, STATUS_IN_PROGRESS};

/// Monthly reports cover at most this many trailing months.
pub const MONTHLY_WINDOW: usize = 12;

/// Chart colors assigned to categories without a stored color, cycled
/// in ranking order.
pub const CATEGORY_PALETTE: [&str; 7] = [
    "#3b82f6", "#10b981", "#f59e0b", "#ef4444", "#8b5cf6", "#06b6d4", "#ec4899",
];

/// Color for status rows that carry none of their own.
pub const STATUS_FALLBACK_COLOR: &str = "#6b7280";

/// Coarse classification of a status name. Anything that is not
/// literally completed or in progress counts as not started, so the
/// three buckets always add up to the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Completed,
    InProgress,
    NotStarted,
}

impl StatusKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            STATUS_COMPLETED => Self::Completed,
            STATUS_IN_PROGRESS => Self::InProgress,
            _ => Self::NotStarted,
        }
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 1000.0).round() / 10.0
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn month_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

/// Shared per-group accumulator.
#[derive(Debug, Clone, Default)]
struct Tally {
    total: u64,
    completed: u64,
    in_progress: u64,
    resolution_sum: i64,
    resolved: u64,
    same_day: u64,
}

impl Tally {
    fn add(&mut self, fact: &TaskFacts) {
        self.total += 1;
        match StatusKind::from_name(&fact.status_name) {
            StatusKind::Completed => self.completed += 1,
            StatusKind::InProgress => self.in_progress += 1,
            StatusKind::NotStarted => {}
        }
        if let Some(days) = fact.resolution_days {
            self.resolution_sum += days;
            self.resolved += 1;
            if days == 0 {
                self.same_day += 1;
            }
        }
    }

    fn not_started(&self) -> u64 {
        self.total - self.completed - self.in_progress
    }

    fn completion_rate(&self) -> f64 {
        percent(self.completed, self.total)
    }

    fn avg_resolution_days(&self) -> f64 {
        if self.resolved == 0 {
            0.0
        } else {
            round1(self.resolution_sum as f64 / self.resolved as f64)
        }
    }
}

// ───────────────────────────────────────
// Dashboard
// ───────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardKpis {
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub in_progress_tasks: u64,
    pub not_started_tasks: u64,
    pub completion_rate: f64,
    pub avg_resolution_days: f64,
    pub todays_tasks: u64,
    pub this_month_tasks: u64,
}

/// Headline numbers. `now` decides what "today" and "this month" mean;
/// both compare calendar dates in UTC.
pub fn dashboard_kpis(facts: &[TaskFacts], now: DateTime<Utc>) -> DashboardKpis {
    let today = now.date_naive();
    let this_month = month_key(now);

    let mut tally = Tally::default();
    let mut todays = 0u64;
    let mut this_month_tasks = 0u64;
    for fact in facts {
        tally.add(fact);
        if fact.received_at.date_naive() == today {
            todays += 1;
        }
        if month_key(fact.received_at) == this_month {
            this_month_tasks += 1;
        }
    }

    DashboardKpis {
        total_tasks: tally.total,
        completed_tasks: tally.completed,
        in_progress_tasks: tally.in_progress,
        not_started_tasks: tally.not_started(),
        completion_rate: tally.completion_rate(),
        avg_resolution_days: tally.avg_resolution_days(),
        todays_tasks: todays,
        this_month_tasks,
    }
}

// ───────────────────────────────────────
// Monthly trend
// ───────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyStats {
    pub month: String, // "YYYY-MM"
    pub total: u64,
    pub completed: u64,
    pub in_progress: u64,
    pub not_started: u64,
    pub completion_rate: f64,
    pub avg_resolution_days: f64,
}

/// Per-month volumes by receipt date, ascending, capped to the most
/// recent [`MONTHLY_WINDOW`] months.
pub fn monthly_stats(facts: &[TaskFacts]) -> Vec<MonthlyStats> {
    let mut months: BTreeMap<String, Tally> = BTreeMap::new();
    for fact in facts {
        months.entry(month_key(fact.received_at)).or_default().add(fact);
    }
    let skip = months.len().saturating_sub(MONTHLY_WINDOW);
    months
        .into_iter()
        .skip(skip)
        .map(|(month, tally)| MonthlyStats {
            month,
            total: tally.total,
            completed: tally.completed,
            in_progress: tally.in_progress,
            not_started: tally.not_started(),
            completion_rate: tally.completion_rate(),
            avg_resolution_days: tally.avg_resolution_days(),
        })
        .collect()
}

// ───────────────────────────────────────
// Engineer performance
// ───────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineerPerformance {
    pub engineer_id: Uuid,
    pub full_name: String,
    pub employee_code: Option<String>,
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub completion_rate: f64,
    pub avg_resolution_days: f64,
    pub same_day_completions: u64,
}

/// Per-engineer workload, busiest first (ties by name). Tasks without
/// an assigned engineer are not attributed to anybody.
pub fn engineer_performance(facts: &[TaskFacts]) -> Vec<EngineerPerformance> {
    let mut tallies: HashMap<Uuid, (String, Option<String>, Tally)> = HashMap::new();
    for fact in facts {
        let Some(id) = fact.engineer_id else {
            continue;
        };
        let entry = tallies.entry(id).or_insert_with(|| {
            (
                fact.engineer_name.clone().unwrap_or_default(),
                fact.employee_code.clone(),
                Tally::default(),
            )
        });
        entry.2.add(fact);
    }
    let mut rows: Vec<EngineerPerformance> = tallies
        .into_iter()
        .map(
            |(engineer_id, (full_name, employee_code, tally))| EngineerPerformance {
                engineer_id,
                full_name,
                employee_code,
                total_tasks: tally.total,
                completed_tasks: tally.completed,
                completion_rate: tally.completion_rate(),
                avg_resolution_days: tally.avg_resolution_days(),
                same_day_completions: tally.same_day,
            },
        )
        .collect();
    rows.sort_by(|a, b| {
        b.total_tasks
            .cmp(&a.total_tasks)
            .then_with(|| a.full_name.cmp(&b.full_name))
    });
    rows
}

// ───────────────────────────────────────
// Categories (system types, call types)
// ───────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub name: String,
    pub color: String,
    pub total: u64,
    pub completed: u64,
    pub percentage: f64,
}

pub fn system_type_stats(facts: &[TaskFacts]) -> Vec<CategoryStats> {
    grouped_categories(
        facts,
        |f| f.system_type.as_deref(),
        |f| f.system_type_color.as_deref(),
    )
}

pub fn call_type_stats(facts: &[TaskFacts]) -> Vec<CategoryStats> {
    grouped_categories(facts, |f| f.call_type.as_deref(), |_| None)
}

/// Shares are relative to the tasks that carry the attribute at all,
/// so the percentages of one report sum to ~100.
fn grouped_categories(
    facts: &[TaskFacts],
    name_of: impl Fn(&TaskFacts) -> Option<&str>,
    color_of: impl Fn(&TaskFacts) -> Option<&str>,
) -> Vec<CategoryStats> {
    let mut tallies: HashMap<String, (Option<String>, Tally)> = HashMap::new();
    for fact in facts {
        let Some(name) = name_of(fact) else {
            continue;
        };
        let entry = tallies.entry(name.to_string()).or_default();
        if entry.0.is_none() {
            entry.0 = color_of(fact).map(str::to_string);
        }
        entry.1.add(fact);
    }
    let grand_total: u64 = tallies.values().map(|(_, tally)| tally.total).sum();

    let mut rows: Vec<(String, Option<String>, Tally)> = tallies
        .into_iter()
        .map(|(name, (color, tally))| (name, color, tally))
        .collect();
    rows.sort_by(|a, b| b.2.total.cmp(&a.2.total).then_with(|| a.0.cmp(&b.0)));
    rows.into_iter()
        .enumerate()
        .map(|(rank, (name, color, tally))| CategoryStats {
            name,
            color: color
                .unwrap_or_else(|| CATEGORY_PALETTE[rank % CATEGORY_PALETTE.len()].to_string()),
            total: tally.total,
            completed: tally.completed,
            percentage: percent(tally.total, grand_total),
        })
        .collect()
}

// ───────────────────────────────────────
// Organizations
// ───────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrganizationStats {
    pub name: String,
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub completion_rate: f64,
    pub percentage: f64,
}

/// Per-organization volumes, busiest first. `percentage` is the share
/// of the tasks attributed to any organization.
pub fn organization_stats(facts: &[TaskFacts]) -> Vec<OrganizationStats> {
    let mut tallies: HashMap<String, Tally> = HashMap::new();
    for fact in facts {
        let Some(name) = fact.organization_name.as_deref() else {
            continue;
        };
        tallies.entry(name.to_string()).or_default().add(fact);
    }
    let grand_total: u64 = tallies.values().map(|tally| tally.total).sum();
    let mut rows: Vec<OrganizationStats> = tallies
        .into_iter()
        .map(|(name, tally)| OrganizationStats {
            name,
            total_tasks: tally.total,
            completed_tasks: tally.completed,
            completion_rate: tally.completion_rate(),
            percentage: percent(tally.total, grand_total),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.total_tasks
            .cmp(&a.total_tasks)
            .then_with(|| a.name.cmp(&b.name))
    });
    rows
}

// ───────────────────────────────────────
// Status distribution
// ───────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSlice {
    pub name: String,
    pub count: u64,
    pub percentage: f64,
    pub color: String,
}

pub fn status_distribution(facts: &[TaskFacts]) -> Vec<StatusSlice> {
    let mut counts: HashMap<String, (Option<String>, u64)> = HashMap::new();
    for fact in facts {
        let entry = counts.entry(fact.status_name.clone()).or_default();
        if entry.0.is_none() {
            entry.0 = fact.status_color.clone();
        }
        entry.1 += 1;
    }
    let total: u64 = counts.values().map(|(_, n)| *n).sum();

    let mut rows: Vec<StatusSlice> = counts
        .into_iter()
        .map(|(name, (color, count))| StatusSlice {
            name,
            count,
            percentage: percent(count, total),
            color: color.unwrap_or_else(|| STATUS_FALLBACK_COLOR.to_string()),
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::STATUS_NOT_STARTED;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
    }

    fn fact(status: &str, received: DateTime<Utc>) -> TaskFacts {
        TaskFacts {
            organization_id: None,
            organization_name: None,
            engineer_id: None,
            engineer_name: None,
            employee_code: None,
            system_type: None,
            system_type_color: None,
            call_type: None,
            status_name: status.to_string(),
            status_color: None,
            received_at: received,
            completed_at: None,
            resolution_days: None,
        }
    }

    fn completed_in(days: i64, received: DateTime<Utc>) -> TaskFacts {
        let mut f = fact(STATUS_COMPLETED, received);
        f.completed_at = Some(received + chrono::Duration::days(days));
        f.resolution_days = Some(days);
        f
    }

    #[test]
    fn empty_store_yields_zeroed_reports() {
        let kpis = dashboard_kpis(&[], at(2024, 3, 10));
        assert_eq!(kpis.total_tasks, 0);
        assert_eq!(kpis.completion_rate, 0.0);
        assert_eq!(kpis.avg_resolution_days, 0.0);
        assert!(monthly_stats(&[]).is_empty());
        assert!(engineer_performance(&[]).is_empty());
        assert!(system_type_stats(&[]).is_empty());
        assert!(organization_stats(&[]).is_empty());
        assert!(status_distribution(&[]).is_empty());
    }

    #[test]
    fn unknown_statuses_count_as_not_started_and_totals_conserve() {
        let now = at(2024, 3, 10);
        let facts = vec![
            fact(STATUS_COMPLETED, at(2024, 3, 1)),
            fact(STATUS_IN_PROGRESS, at(2024, 3, 2)),
            fact(STATUS_NOT_STARTED, at(2024, 3, 3)),
            fact("Awaiting parts", at(2024, 3, 4)),
            fact("", at(2024, 3, 5)),
        ];
        let kpis = dashboard_kpis(&facts, now);
        assert_eq!(kpis.total_tasks, 5);
        assert_eq!(kpis.completed_tasks, 1);
        assert_eq!(kpis.in_progress_tasks, 1);
        assert_eq!(kpis.not_started_tasks, 3);
        assert_eq!(
            kpis.completed_tasks + kpis.in_progress_tasks + kpis.not_started_tasks,
            kpis.total_tasks
        );
        assert_eq!(kpis.completion_rate, 20.0);
    }

    #[test]
    fn rates_round_to_one_decimal() {
        let facts = vec![
            fact(STATUS_COMPLETED, at(2024, 3, 1)),
            fact(STATUS_NOT_STARTED, at(2024, 3, 2)),
            fact(STATUS_NOT_STARTED, at(2024, 3, 3)),
        ];
        let kpis = dashboard_kpis(&facts, at(2024, 3, 10));
        assert_eq!(kpis.completion_rate, 33.3);

        let facts = vec![
            fact(STATUS_COMPLETED, at(2024, 3, 1)),
            fact(STATUS_COMPLETED, at(2024, 3, 2)),
            fact(STATUS_NOT_STARTED, at(2024, 3, 3)),
        ];
        let kpis = dashboard_kpis(&facts, at(2024, 3, 10));
        assert_eq!(kpis.completion_rate, 66.7);
    }

    #[test]
    fn avg_resolution_is_mean_of_resolved_tasks() {
        let facts = vec![
            completed_in(1, at(2024, 3, 1)),
            completed_in(2, at(2024, 3, 2)),
            completed_in(2, at(2024, 3, 3)),
            fact(STATUS_NOT_STARTED, at(2024, 3, 4)), // open, excluded
        ];
        let kpis = dashboard_kpis(&facts, at(2024, 3, 10));
        assert_eq!(kpis.avg_resolution_days, 1.7);
    }

    #[test]
    fn todays_and_this_months_tasks_compare_utc_dates() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 23, 30, 0).unwrap();
        let facts = vec![
            fact(STATUS_NOT_STARTED, Utc.with_ymd_and_hms(2024, 3, 10, 0, 5, 0).unwrap()),
            fact(STATUS_NOT_STARTED, at(2024, 3, 22)),
            fact(STATUS_NOT_STARTED, at(2024, 2, 10)),
        ];
        let kpis = dashboard_kpis(&facts, now);
        assert_eq!(kpis.todays_tasks, 1);
        assert_eq!(kpis.this_month_tasks, 2);
    }

    #[test]
    fn monthly_stats_cap_at_twelve_newest_months_ascending() {
        let mut facts = Vec::new();
        for month in 1..=12 {
            facts.push(fact(STATUS_NOT_STARTED, at(2023, month, 5)));
        }
        facts.push(completed_in(0, at(2024, 1, 5)));
        facts.push(fact(STATUS_NOT_STARTED, at(2024, 2, 5)));

        let months = monthly_stats(&facts);
        assert_eq!(months.len(), MONTHLY_WINDOW);
        assert_eq!(months.first().unwrap().month, "2023-03");
        assert_eq!(months.last().unwrap().month, "2024-02");
        let jan = months.iter().find(|m| m.month == "2024-01").unwrap();
        assert_eq!(jan.completed, 1);
        assert_eq!(jan.in_progress, 0);
        assert_eq!(jan.not_started, 0);
        assert_eq!(jan.completion_rate, 100.0);
        assert_eq!(jan.avg_resolution_days, 0.0);
        for month in &months {
            assert_eq!(month.completed + month.in_progress + month.not_started, month.total);
        }
    }

    #[test]
    fn engineers_rank_by_volume_then_name() {
        let bat = Uuid::new_v4();
        let dorj = Uuid::new_v4();
        let mut facts = Vec::new();
        for day in 1..=3 {
            let mut f = if day == 1 {
                completed_in(0, at(2024, 3, day))
            } else {
                fact(STATUS_NOT_STARTED, at(2024, 3, day))
            };
            f.engineer_id = Some(bat);
            f.engineer_name = Some("Бат".into());
            f.employee_code = Some("7".into());
            facts.push(f);
        }
        let mut f = completed_in(2, at(2024, 3, 9));
        f.engineer_id = Some(dorj);
        f.engineer_name = Some("Дорж".into());
        facts.push(f);
        facts.push(fact(STATUS_NOT_STARTED, at(2024, 3, 12))); // unassigned

        let rows = engineer_performance(&facts);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].engineer_id, bat);
        assert_eq!(rows[0].total_tasks, 3);
        assert_eq!(rows[0].completed_tasks, 1);
        assert_eq!(rows[0].same_day_completions, 1);
        assert_eq!(rows[1].engineer_id, dorj);
        assert_eq!(rows[1].avg_resolution_days, 2.0);
    }

    #[test]
    fn category_shares_are_relative_to_categorised_tasks() {
        let mut a = fact(STATUS_COMPLETED, at(2024, 3, 1));
        a.system_type = Some("CCTV".into());
        a.system_type_color = Some("#123456".into());
        let mut b = fact(STATUS_NOT_STARTED, at(2024, 3, 2));
        b.system_type = Some("CCTV".into());
        let mut c = fact(STATUS_NOT_STARTED, at(2024, 3, 3));
        c.system_type = Some("Access".into());
        let d = fact(STATUS_NOT_STARTED, at(2024, 3, 4)); // no system type

        let rows = system_type_stats(&[a, b, c, d]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "CCTV");
        assert_eq!(rows[0].color, "#123456"); // stored color wins
        assert_eq!(rows[0].percentage, 66.7);
        assert_eq!(rows[1].name, "Access");
        assert_eq!(rows[1].color, CATEGORY_PALETTE[1]); // palette by rank
        assert_eq!(rows[1].percentage, 33.3);
    }

    #[test]
    fn organization_stats_skip_unattributed_tasks() {
        let mut a = completed_in(1, at(2024, 3, 1));
        a.organization_name = Some("Номин".into());
        let mut b = fact(STATUS_NOT_STARTED, at(2024, 3, 2));
        b.organization_name = Some("Номин".into());
        let mut c = fact(STATUS_NOT_STARTED, at(2024, 3, 3));
        c.organization_name = Some("Апекс".into());
        let orphan = fact(STATUS_NOT_STARTED, at(2024, 3, 4));

        let rows = organization_stats(&[a, b, c, orphan]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Номин");
        assert_eq!(rows[0].total_tasks, 2);
        assert_eq!(rows[0].completion_rate, 50.0);
        assert_eq!(rows[0].percentage, 66.7);
        assert_eq!(rows[1].name, "Апекс");
        assert_eq!(rows[1].percentage, 33.3);
    }

    #[test]
    fn status_distribution_counts_color_and_share() {
        let mut a = fact(STATUS_COMPLETED, at(2024, 3, 1));
        a.status_color = Some("#22c55e".into());
        let mut b = fact(STATUS_COMPLETED, at(2024, 3, 2));
        b.status_color = Some("#22c55e".into());
        let c = fact("Awaiting parts", at(2024, 3, 3)); // no stored color

        let rows = status_distribution(&[a, b, c]);
        assert_eq!(rows[0].name, STATUS_COMPLETED);
        assert_eq!(rows[0].count, 2);
        assert_eq!(rows[0].percentage, 66.7);
        assert_eq!(rows[0].color, "#22c55e");
        assert_eq!(rows[1].name, "Awaiting parts");
        assert_eq!(rows[1].color, STATUS_FALLBACK_COLOR);
    }
}
