use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{expect_object, RejectedRecord};
use crate::error::{ContractError, ContractResult, ErrorBody};
use crate::history::{HistoryKind, HistoryRecord, HistoryStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestedHistory {
    pub records: Vec<HistoryRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedRecord>,
}

/// Validate a history listing. Cross-check listings carry
/// `excel_filename`/`pptx_filename` and a summary; batch listings carry a
/// single `filename` and `total_projects`. Bad entries are rejected
/// individually.
pub fn history_records(value: &Value, kind: HistoryKind) -> ContractResult<IngestedHistory> {
    let items = value
        .as_array()
        .ok_or_else(|| ContractError::validation("history", "expected a JSON list"))?;

    let mut records = Vec::with_capacity(items.len());
    let mut rejected = Vec::new();
    for (index, item) in items.iter().enumerate() {
        match history_record(item, kind) {
            Ok(record) => records.push(record),
            Err(e) => {
                let e = e.within(&format!("history[{}]", index));
                tracing::warn!(error = %e, "rejected history record");
                rejected.push(RejectedRecord {
                    index,
                    error: ErrorBody::from(&e),
                });
            }
        }
    }

    Ok(IngestedHistory { records, rejected })
}

pub fn history_record(value: &Value, kind: HistoryKind) -> ContractResult<HistoryRecord> {
    let obj = expect_object(value, "record")?;

    let id = obj
        .get("id")
        .and_then(Value::as_u64)
        .ok_or_else(|| ContractError::validation("id", "must be a non-negative integer"))?;

    let status_label = required_str(obj, "status")?;
    let status = HistoryStatus::parse(status_label).ok_or_else(|| {
        ContractError::validation("status", format!("unknown status '{}'", status_label))
    })?;

    let analysis_date = parse_timestamp(required_str(obj, "analysis_date")?)?;

    let filename_fields: &[&str] = match kind {
        HistoryKind::CrossCheck => &["excel_filename", "pptx_filename"],
        HistoryKind::Batch => &["filename"],
    };
    let filenames = filename_fields
        .iter()
        .filter_map(|field| obj.get(*field).and_then(Value::as_str))
        .map(str::to_string)
        .collect();

    let summary = obj
        .get("summary")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let total_projects = match obj.get("total_projects") {
        None | Some(Value::Null) => None,
        Some(raw) => Some(
            raw.as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| {
                    ContractError::validation("total_projects", "must be a non-negative integer")
                })?,
        ),
    };

    Ok(HistoryRecord {
        id,
        kind,
        filenames,
        analysis_date,
        status,
        summary,
        total_projects,
    })
}

fn required_str<'a>(obj: &'a Map<String, Value>, field: &str) -> ContractResult<&'a str> {
    obj.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ContractError::validation(field, "missing required field"))
}

/// RFC 3339 timestamps keep their offset; naive ISO timestamps, which is
/// what the service writes, are taken as UTC.
pub fn parse_timestamp(raw: &str) -> ContractResult<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| {
            ContractError::validation("analysis_date", format!("invalid timestamp '{}'", trimmed))
        })
}
