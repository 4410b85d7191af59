use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::severity::{classify_severity, Severity};
use super::types::{Discrepancy, DiscrepancyKind};
use crate::error::{ContractError, ContractResult};

const SOURCE_A_FIELDS: &[&str] = &["source_value_a", "sourceValueA", "excel_value"];
const SOURCE_B_FIELDS: &[&str] = &["source_value_b", "sourceValueB", "pptx_value"];

/// How strictly untyped discrepancy records are checked on ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidatorOptions {
    /// Reject unrecognized severity labels instead of downgrading them to low
    #[serde(default)]
    pub strict_severity: bool,

    /// Drop discrepancies whose paired values are equal after formatting is
    /// stripped ("$1,000" vs "1000")
    #[serde(default)]
    pub drop_identical_pairs: bool,
}

/// Turn an untyped record into a normalized `Discrepancy`, or name the
/// first field that is missing or invalid.
pub fn validate_discrepancy(
    raw: &Value,
    options: &ValidatorOptions,
) -> ContractResult<Discrepancy> {
    let obj = raw
        .as_object()
        .ok_or_else(|| ContractError::validation("discrepancy", "expected a JSON object"))?;

    let severity_label = required_string(obj, "severity")?;
    let severity = if options.strict_severity {
        Severity::recognize(severity_label).ok_or_else(|| {
            ContractError::validation(
                "severity",
                format!("unrecognized severity '{}'", severity_label),
            )
        })?
    } else {
        if Severity::recognize(severity_label).is_none() {
            debug!(label = severity_label, "unrecognized severity, treating as low");
        }
        classify_severity(severity_label)
    };

    let kind = non_empty(required_string(obj, "type")?, "type")?;
    let description = non_empty(required_string(obj, "description")?, "description")?;
    let source_value_a = paired_value(obj, SOURCE_A_FIELDS)?;
    let source_value_b = paired_value(obj, SOURCE_B_FIELDS)?;
    let recommendation = optional_string(obj, "recommendation")?;

    if DiscrepancyKind::classify(&kind).is_value_mismatch()
        && source_value_a.is_none()
        && source_value_b.is_none()
    {
        return Err(ContractError::validation(
            "source_value_a",
            format!("a '{}' discrepancy needs at least one compared value", kind),
        ));
    }

    Ok(Discrepancy {
        severity,
        kind,
        description,
        source_value_a,
        source_value_b,
        recommendation,
    })
}

fn required_string<'a>(obj: &'a Map<String, Value>, field: &str) -> ContractResult<&'a str> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(ContractError::validation(field, "missing required field")),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ContractError::validation(field, "must be a string")),
    }
}

fn non_empty(value: &str, field: &str) -> ContractResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ContractError::validation(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// First present alias wins. `null` counts as absent.
fn paired_value(obj: &Map<String, Value>, aliases: &[&str]) -> ContractResult<Option<String>> {
    for field in aliases {
        match obj.get(*field) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(ContractError::validation(
                        *field,
                        "must be a non-empty string when present",
                    ));
                }
                return Ok(Some(trimmed.to_string()));
            }
            Some(_) => return Err(ContractError::validation(*field, "must be a string")),
        }
    }
    Ok(None)
}

fn optional_string(obj: &Map<String, Value>, field: &str) -> ContractResult<Option<String>> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Some(_) => Err(ContractError::validation(field, "must be a string")),
    }
}
