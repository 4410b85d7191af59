use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{expect_object, RejectedRecord};
use crate::discrepancy::{validate_discrepancy, AnalysisResult, SourceInfo, ValidatorOptions};
use crate::error::{ContractError, ContractResult, ErrorBody};

const DEFAULT_SUMMARY: &str = "Analysis completed.";

/// A validated cross-check result plus the discrepancy records that did
/// not pass validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestedAnalysis {
    pub result: AnalysisResult,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedRecord>,
}

/// Validate an analysis payload from the service or a saved file.
///
/// Accepts both the `/analyze` response (`excel_info`, `pptx_info`) and the
/// history detail shape (`excel_filename`, `pptx_filename`). Individual
/// discrepancies that fail validation are collected in `rejected` rather than
/// failing the whole result; a bad `match_score` does fail it.
pub fn analysis_result(
    value: &Value,
    options: &ValidatorOptions,
) -> ContractResult<IngestedAnalysis> {
    let obj = expect_object(value, "analysis")?;

    let raw_discrepancies = match obj.get("discrepancies") {
        None | Some(Value::Null) => &[][..],
        Some(Value::Array(items)) => items.as_slice(),
        Some(_) => {
            return Err(ContractError::validation("discrepancies", "must be a list"));
        }
    };

    let mut discrepancies = Vec::with_capacity(raw_discrepancies.len());
    let mut rejected = Vec::new();
    for (index, raw) in raw_discrepancies.iter().enumerate() {
        match validate_discrepancy(raw, options) {
            Ok(d) if options.drop_identical_pairs && d.values_match() => {
                debug!(index, "dropping discrepancy with identical values");
            }
            Ok(d) => discrepancies.push(d),
            Err(e) => {
                let e = e.within(&format!("discrepancies[{}]", index));
                warn!(error = %e, "rejected discrepancy record");
                rejected.push(RejectedRecord {
                    index,
                    error: ErrorBody::from(&e),
                });
            }
        }
    }

    let match_score = match obj.get("match_score") {
        None | Some(Value::Null) => derived_match_score(discrepancies.len()),
        Some(raw) => parse_match_score(raw)?,
    };

    let summary = match obj.get("summary") {
        None | Some(Value::Null) => DEFAULT_SUMMARY.to_string(),
        Some(Value::String(s)) if s.trim().is_empty() => DEFAULT_SUMMARY.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(_) => return Err(ContractError::validation("summary", "must be a string")),
    };

    let result = AnalysisResult {
        match_score,
        summary,
        discrepancies,
        source_a_info: source_info(obj, &["source_a_info", "excel_info"], "excel_filename")?,
        source_b_info: source_info(obj, &["source_b_info", "pptx_info"], "pptx_filename")?,
    };

    Ok(IngestedAnalysis { result, rejected })
}

/// Ten points off per discrepancy, floored at zero.
pub fn derived_match_score(discrepancy_count: usize) -> u8 {
    let penalty = discrepancy_count.saturating_mul(10);
    100usize.saturating_sub(penalty) as u8
}

fn parse_match_score(raw: &Value) -> ContractResult<u8> {
    let number = raw
        .as_f64()
        .ok_or_else(|| ContractError::validation("match_score", "must be a number"))?;
    if number.fract() != 0.0 || !(0.0..=100.0).contains(&number) {
        return Err(ContractError::range(
            "match_score",
            format!("must be an integer in [0, 100], got {}", raw),
        ));
    }
    Ok(number as u8)
}

fn source_info(
    obj: &Map<String, Value>,
    aliases: &[&str],
    filename_field: &str,
) -> ContractResult<SourceInfo> {
    for field in aliases {
        match obj.get(*field) {
            None | Some(Value::Null) => continue,
            Some(raw @ Value::Object(_)) => {
                return serde_json::from_value(raw.clone())
                    .map_err(|e| ContractError::validation(*field, e.to_string()));
            }
            Some(_) => return Err(ContractError::validation(*field, "must be an object")),
        }
    }

    let filename = obj
        .get(filename_field)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    Ok(SourceInfo {
        filename,
        ..SourceInfo::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discrepancy::Severity;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn analyze_response() -> Value {
        json!({
            "success": true,
            "analysis_id": 12,
            "summary": "Se encontraron 2 discrepancias",
            "match_score": 80,
            "discrepancies": [
                {
                    "type": "presupuesto", "severity": "alta",
                    "description": "Budget differs",
                    "excel_value": "$1,500,000", "pptx_value": "$1,750,000",
                    "recommendation": "Align the budget"
                },
                {
                    "type": "fecha", "severity": "media",
                    "description": "Go-live differs",
                    "excel_value": "2024-06-01", "pptx_value": "2024-07-01"
                }
            ],
            "excel_info": {"filename": "q3.xlsx", "sheets": 2, "total_rows": 40},
            "pptx_info": {"filename": "q3.pptx", "total_slides": 12}
        })
    }

    #[test]
    fn test_analyze_response_shape() {
        let ingested = analysis_result(&analyze_response(), &ValidatorOptions::default()).unwrap();
        let result = &ingested.result;
        assert!(ingested.rejected.is_empty());
        assert_eq!(result.match_score, 80);
        assert_eq!(result.discrepancies.len(), 2);
        assert_eq!(result.discrepancies[0].severity, Severity::High);
        assert_eq!(result.source_a_info.filename.as_deref(), Some("q3.xlsx"));
        assert_eq!(result.source_b_info.details["total_slides"], 12);
    }

    #[test]
    fn test_history_detail_shape_derives_score() {
        let detail = json!({
            "id": 3,
            "excel_filename": "plan.xlsx",
            "pptx_filename": "board.pptx",
            "analysis_date": "2024-05-01T10:00:00",
            "summary": "Three issues",
            "status": "completed",
            "discrepancies": [
                {"type": "texto", "severity": "baja", "description": "a"},
                {"type": "texto", "severity": "baja", "description": "b"},
                {"type": "texto", "severity": "baja", "description": "c"}
            ]
        });
        let ingested = analysis_result(&detail, &ValidatorOptions::default()).unwrap();
        assert_eq!(ingested.result.match_score, 70);
        assert_eq!(ingested.result.source_a_info.filename.as_deref(), Some("plan.xlsx"));
        assert_eq!(ingested.result.source_b_info.filename.as_deref(), Some("board.pptx"));
    }

    #[test]
    fn test_derived_score_floors_at_zero() {
        assert_eq!(derived_match_score(0), 100);
        assert_eq!(derived_match_score(4), 60);
        assert_eq!(derived_match_score(10), 0);
        assert_eq!(derived_match_score(15), 0);
    }

    #[test]
    fn test_out_of_range_match_score() {
        let mut raw = analyze_response();
        raw["match_score"] = json!(140);
        let err = analysis_result(&raw, &ValidatorOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);

        raw["match_score"] = json!(85.5);
        let err = analysis_result(&raw, &ValidatorOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);

        raw["match_score"] = json!("high");
        let err = analysis_result(&raw, &ValidatorOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_invalid_discrepancy_is_rejected_not_fatal() {
        let mut raw = analyze_response();
        raw["discrepancies"][1]["description"] = json!("");
        let ingested = analysis_result(&raw, &ValidatorOptions::default()).unwrap();
        assert_eq!(ingested.result.discrepancies.len(), 1);
        assert_eq!(ingested.rejected.len(), 1);
        assert_eq!(ingested.rejected[0].index, 1);
        assert_eq!(
            ingested.rejected[0].error.message,
            "discrepancies[1].description: must not be empty"
        );
    }

    #[test]
    fn test_identical_pairs_dropped_when_enabled() {
        let raw = json!({
            "discrepancies": [
                {"type": "numerico", "severity": "media", "description": "Same",
                 "excel_value": "1744000", "pptx_value": "$1,744,000"},
                {"type": "numerico", "severity": "media", "description": "Different",
                 "excel_value": "10", "pptx_value": "12"}
            ]
        });
        let keep = analysis_result(&raw, &ValidatorOptions::default()).unwrap();
        assert_eq!(keep.result.discrepancies.len(), 2);

        let options = ValidatorOptions {
            drop_identical_pairs: true,
            ..ValidatorOptions::default()
        };
        let dropped = analysis_result(&raw, &options).unwrap();
        assert_eq!(dropped.result.discrepancies.len(), 1);
        assert_eq!(dropped.result.discrepancies[0].description, "Different");
        assert_eq!(dropped.result.match_score, 90);
        assert_eq!(dropped.result.summary, DEFAULT_SUMMARY);
    }

    #[test]
    fn test_not_an_object() {
        let err = analysis_result(&json!("oops"), &ValidatorOptions::default()).unwrap_err();
        assert_eq!(err, ContractError::validation("analysis", "expected a JSON object"));
    }
}
