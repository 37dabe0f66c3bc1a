// src/ingest/mod.rs

//! CSV boundary for dashboard extracts.
//!
//! Extracts arrive with the Mongolian column headers of the source
//! spreadsheet. Everything is translated into typed [`ImportRow`]s here
//! so the reconciler never sees a raw cell.

use std::fs;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::ImportError;

/// Placeholder the source system writes for values it does not know.
const UNKNOWN: &str = "Unknown";

/// Days between the Excel serial epoch (1900 system) and 1970-01-01.
const EXCEL_EPOCH_OFFSET_DAYS: f64 = 25_569.0;

/// One extract row after header translation and field parsing. A row
/// with no `received_at` identifies nothing and is counted as invalid
/// by the import runner.
#[derive(Debug, Clone, Default)]
pub struct ImportRow {
    pub organization: Option<String>,
    pub building: Option<String>,
    pub engineer: Option<EngineerRef>,
    pub system_type: Option<String>,
    pub call_tags: Vec<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub engineering_comment: Option<String>,
    pub akt_number: Option<i64>,
    pub received_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub original_path: Option<String>,
}

/// Engineer as named by an extract cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineerRef {
    pub full_name: String,
    pub employee_code: Option<String>,
}

impl EngineerRef {
    /// Reconciliation key: employee code when present, else the name.
    pub fn identity_key(&self) -> &str {
        self.employee_code.as_deref().unwrap_or(&self.full_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Organization,
    Building,
    Engineer,
    SystemType,
    CallType,
    Status,
    Description,
    EngineeringComment,
    Akt,
    ReceivedAt,
    CompletedAt,
    Path,
}

fn column_for(header: &str) -> Option<Column> {
    // Excel exports prefix the first header with a BOM.
    match header.trim_start_matches('\u{feff}').trim() {
        "Байгууллагын нэр" => Some(Column::Organization),
        "Байр" => Some(Column::Building),
        "Томилогдсон инженер" => Some(Column::Engineer),
        "Системийн төрөл" => Some(Column::SystemType),
        "Дуудлагын төрөл" => Some(Column::CallType),
        "Төлөв" => Some(Column::Status),
        "Шалтгаан" => Some(Column::Description),
        "Engineering Comment" => Some(Column::EngineeringComment),
        "АКТ" => Some(Column::Akt),
        "Дуудлага хүлээн авсан огноо" => Some(Column::ReceivedAt),
        "Дууссан огноо" => Some(Column::CompletedAt),
        "Path" => Some(Column::Path),
        _ => None,
    }
}

/// Reads every record of a headed CSV extract into [`ImportRow`]s.
/// Unrecognised columns are ignored; short records leave fields empty.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<ImportRow>, ImportError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let columns: Vec<Option<Column>> = rdr.headers()?.iter().map(column_for).collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let mut row = ImportRow::default();
        for (idx, column) in columns.iter().enumerate() {
            let (Some(column), Some(cell)) = (column, record.get(idx)) else {
                continue;
            };
            match column {
                Column::Organization => row.organization = known(cell),
                Column::Building => row.building = normalize_building(cell),
                Column::Engineer => row.engineer = parse_engineer(cell),
                Column::SystemType => row.system_type = known(cell),
                Column::CallType => row.call_tags = split_call_tags(cell),
                Column::Status => row.status = non_empty(cell),
                Column::Description => row.description = non_empty(cell),
                Column::EngineeringComment => row.engineering_comment = non_empty(cell),
                Column::Akt => row.akt_number = parse_akt(cell),
                Column::ReceivedAt => row.received_at = parse_timestamp(cell),
                Column::CompletedAt => row.completed_at = parse_timestamp(cell),
                Column::Path => row.original_path = non_empty(cell),
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Reads an extract from disk, returning the rows plus a SHA-256 hex
/// digest of the raw bytes for the import-run record.
pub fn read_file(path: &Path) -> Result<(Vec<ImportRow>, String), ImportError> {
    let bytes = fs::read(path)?;
    let digest = source_digest(&bytes);
    let rows = read_rows(bytes.as_slice())?;
    Ok((rows, digest))
}

pub fn source_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn non_empty(raw: &str) -> Option<String> {
    let raw = raw.trim();
    (!raw.is_empty()).then(|| raw.to_string())
}

/// Trimmed value unless empty or the "Unknown" placeholder.
fn known(raw: &str) -> Option<String> {
    non_empty(raw).filter(|v| v != UNKNOWN)
}

/// Building cells are kept verbatim except for the literal "nan" that
/// the upstream spreadsheet tooling writes into blank cells.
pub fn normalize_building(raw: &str) -> Option<String> {
    non_empty(raw).filter(|v| v != "nan")
}

/// Parses the assigned-engineer cell.
///
/// Cells look like `"Бат-Эрдэнэ [Staff];#1042"` (directory entry with
/// an employee code), `"Бат-Эрдэнэ [Staff]"` (entry without a code) or
/// a bare name. Blank and "Unknown" cells name nobody.
pub fn parse_engineer(raw: &str) -> Option<EngineerRef> {
    let raw = raw.trim();
    if raw.is_empty() || raw == UNKNOWN {
        return None;
    }
    if let Some(open) = raw.find('[') {
        if let Some(close) = raw[open..].find(']') {
            let name = raw[..open].trim_end();
            if !name.is_empty() {
                let tail = &raw[open + close + 1..];
                let code = tail
                    .strip_prefix(";#")
                    .map(|t| t.chars().take_while(|c| c.is_ascii_digit()).collect::<String>())
                    .filter(|digits| !digits.is_empty());
                return Some(EngineerRef {
                    full_name: name.to_string(),
                    employee_code: code,
                });
            }
        }
    }
    Some(EngineerRef {
        full_name: raw.to_string(),
        employee_code: None,
    })
}

/// Splits a multi-value call-type cell on the `;#` list separator used
/// by the source system. The first tag is the task's effective type.
pub fn split_call_tags(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw == UNKNOWN {
        return Vec::new();
    }
    raw.split(";#")
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// АКТ numbers must parse as a whole decimal integer; a prefix of
/// digits is not enough.
pub fn parse_akt(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

/// Parses a date cell. Numeric cells are Excel 1900-system serials
/// (time-of-day fraction discarded); strings are tried against the
/// formats the extracts have been seen to contain.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(serial) = raw.parse::<f64>() {
        return excel_serial_to_utc(serial);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    None
}

fn excel_serial_to_utc(serial: f64) -> Option<DateTime<Utc>> {
    if !serial.is_finite() || serial <= 0.0 {
        return None;
    }
    let days = (serial - EXCEL_EPOCH_OFFSET_DAYS).floor() as i64;
    DateTime::from_timestamp(days * 86_400, 0)
}
