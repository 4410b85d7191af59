use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use tracing::debug;

use super::expect_object;
use crate::batch::{rank, BatchResult, RankedProject};
use crate::error::{ContractError, ContractResult};
use crate::scoring::engine::{reconcile_contributions, round_half_up, RAW_SCALE};
use crate::scoring::{FactorKey, PriorityResult, ScoreBreakdownEntry, TierTable};

/// Validate a batch payload from `/prioritize/batch` or a batch history
/// detail.
///
/// The service reports scores and contributions with one decimal. Each score
/// is rounded half-up to an integer, the tier and color are re-derived from
/// `tiers`, contributions are reconciled to sum to the integer score, and
/// the results are put back in stable descending order.
pub fn batch_result(value: &Value, tiers: &TierTable) -> ContractResult<BatchResult> {
    let obj = expect_object(value, "batch")?;

    let raw_results = match obj.get("results") {
        Some(Value::Array(items)) => items,
        None | Some(Value::Null) => {
            return Err(ContractError::validation("results", "missing required field"));
        }
        Some(_) => return Err(ContractError::validation("results", "must be a list")),
    };

    let mut results = raw_results
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            ranked_project(raw, tiers).map_err(|e| e.within(&format!("results[{}]", index)))
        })
        .collect::<ContractResult<Vec<_>>>()?;

    if let Some(total) = obj.get("total_projects").filter(|v| !v.is_null()) {
        let total = total
            .as_u64()
            .ok_or_else(|| {
                ContractError::validation("total_projects", "must be a non-negative integer")
            })?;
        if total != results.len() as u64 {
            return Err(ContractError::validation(
                "total_projects",
                format!("says {} but {} results were returned", total, results.len()),
            ));
        }
    }

    rank(&mut results);
    debug!(count = results.len(), "ingested batch result");

    Ok(BatchResult {
        total_projects: results.len(),
        results,
        skipped: Vec::new(),
    })
}

fn ranked_project(raw: &Value, tiers: &TierTable) -> ContractResult<RankedProject> {
    let obj = expect_object(raw, "project")?;

    let score = integer_score(obj.get("score"))?;
    let tier = tiers.classify(i64::from(score))?;
    let breakdown = breakdown(obj.get("breakdown"), score)?;

    let recommendation = obj
        .get("recommendation")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&tier.recommendation)
        .to_string();

    Ok(RankedProject {
        id: label(obj, "id").unwrap_or_else(|| "Unknown".to_string()),
        name: label(obj, "name").unwrap_or_else(|| "Untitled".to_string()),
        area: label(obj, "area").unwrap_or_else(|| "N/A".to_string()),
        sponsor: label(obj, "sponsor").unwrap_or_else(|| "N/A".to_string()),
        priority: PriorityResult {
            score,
            tier: tier.name.clone(),
            tier_color: tier.color.clone(),
            breakdown,
            recommendation,
        },
    })
}

/// Spreadsheet ids sometimes arrive as numbers.
fn label(obj: &Map<String, Value>, field: &str) -> Option<String> {
    match obj.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Largest drift allowed between a breakdown's summed contributions and
/// the integer score: half a point for rounding the score, plus the
/// one-decimal rounding of each contribution.
const SUM_TOLERANCE: i64 = RAW_SCALE / 2;
const PER_FACTOR_TOLERANCE: i64 = RAW_SCALE / 20;

/// Points in millionths, as used by the fixed-point engine. Callers
/// range-check `points` first, so the product stays far from `i64` limits.
fn to_raw(points: f64) -> i64 {
    (points * RAW_SCALE as f64).round() as i64
}

fn integer_score(raw: Option<&Value>) -> ContractResult<u8> {
    let number = raw
        .and_then(Value::as_f64)
        .ok_or_else(|| ContractError::validation("score", "must be a number"))?;
    // Anything from 100.5 up would round past the top of the scale
    if !(0.0..100.5).contains(&number) {
        return Err(ContractError::range(
            "score",
            format!("must be in [0, 100], got {}", number),
        ));
    }
    Ok(round_half_up(to_raw(number)).clamp(0, 100) as u8)
}

/// Read one numeric breakdown field and check it lies in `bounds`.
fn bounded_number(
    entry: &Value,
    name: &str,
    field: &str,
    bounds: RangeInclusive<f64>,
) -> ContractResult<f64> {
    let path = format!("breakdown.{}.{}", name, field);
    let number = entry
        .get(field)
        .and_then(Value::as_f64)
        .ok_or_else(|| ContractError::validation(path.as_str(), "must be a number"))?;
    if !bounds.contains(&number) {
        return Err(ContractError::range(
            path,
            format!(
                "must be in [{}, {}], got {}",
                bounds.start(),
                bounds.end(),
                number
            ),
        ));
    }
    Ok(number)
}

fn breakdown(
    raw: Option<&Value>,
    score: u8,
) -> ContractResult<BTreeMap<FactorKey, ScoreBreakdownEntry>> {
    let obj = match raw {
        Some(Value::Object(obj)) => obj,
        _ => return Err(ContractError::validation("breakdown", "must be an object")),
    };

    let mut entries: BTreeMap<FactorKey, (f64, f64, i64)> = BTreeMap::new();
    for (name, entry) in obj {
        let key = FactorKey::parse(name).ok_or_else(|| {
            ContractError::validation(format!("breakdown.{}", name), "unknown factor")
        })?;
        let value = bounded_number(entry, name, "value", 0.0..=100.0)?;
        let weight = bounded_number(entry, name, "weight", 0.0..=1.0)?;
        let contribution = bounded_number(entry, name, "contribution", -100.0..=100.0)?;
        entries.insert(key, (value, weight, to_raw(contribution)));
    }

    if let Some(missing) = FactorKey::ALL.iter().find(|k| !entries.contains_key(k)) {
        return Err(ContractError::validation(
            format!("breakdown.{}", missing.as_str()),
            "missing required factor",
        ));
    }

    let total: i64 = entries.values().map(|(_, _, raw)| *raw).sum();
    let tolerance = SUM_TOLERANCE + PER_FACTOR_TOLERANCE * entries.len() as i64;
    if (total - i64::from(score) * RAW_SCALE).abs() > tolerance {
        return Err(ContractError::validation(
            "breakdown",
            format!(
                "contributions add up to {} but the score is {}",
                total as f64 / RAW_SCALE as f64,
                score
            ),
        ));
    }

    let raws: Vec<i64> = entries.values().map(|(_, _, raw)| *raw).collect();
    let contributions = reconcile_contributions(&raws, score);

    Ok(entries
        .into_iter()
        .zip(contributions)
        .map(|((key, (value, weight, _)), contribution)| {
            (
                key,
                ScoreBreakdownEntry {
                    value,
                    weight,
                    contribution,
                },
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn remote_project(id: &str, score: f64, contributions: [f64; 5]) -> Value {
        json!({
            "id": id,
            "name": format!("Project {}", id),
            "sponsor": "CIO",
            "area": "IT",
            "score": score,
            "tier": "whatever the service said",
            "tier_color": "#000000",
            "breakdown": {
                "roi": {"value": 90, "weight": 0.3, "contribution": contributions[0]},
                "urgency": {"value": 80, "weight": 0.25, "contribution": contributions[1]},
                "risk": {"value": 20, "weight": 0.2, "contribution": contributions[2]},
                "strategic_alignment": {
                    "value": 70, "weight": 0.15, "contribution": contributions[3]
                },
                "resource_availability": {
                    "value": 60, "weight": 0.1, "contribution": contributions[4]
                }
            },
            "recommendation": "Prioridad crítica"
        })
    }

    #[test]
    fn test_fractional_scores_rounded_and_reclassified() {
        let payload = json!({
            "total_projects": 2,
            "results": [
                remote_project("A", 79.5, [27.0, 20.0, 16.0, 10.5, 6.0]),
                remote_project("B", 79.4, [27.0, 20.0, 16.0, 10.4, 6.0])
            ]
        });
        let batch = batch_result(&payload, &TierTable::default()).unwrap();
        assert_eq!(batch.total_projects, 2);

        let a = &batch.results[0];
        assert_eq!(a.id, "A");
        assert_eq!(a.score(), 80);
        assert_eq!(a.priority.tier, "Critical");
        assert_eq!(a.priority.tier_color, "#DC2626");
        assert_eq!(a.priority.recommendation, "Prioridad crítica");

        let b = &batch.results[1];
        assert_eq!(b.score(), 79);
        assert_eq!(b.priority.tier, "High");

        for project in &batch.results {
            let sum: u32 = project.priority.breakdown.values().map(|e| e.contribution).sum();
            assert_eq!(sum, u32::from(project.score()));
        }
    }

    #[test]
    fn test_order_restored() {
        let payload = json!({
            "results": [
                remote_project("low", 40.0, [12.0, 10.0, 8.0, 6.0, 4.0]),
                remote_project("high", 80.0, [27.0, 20.0, 16.0, 11.0, 6.0])
            ]
        });
        let batch = batch_result(&payload, &TierTable::default()).unwrap();
        assert_eq!(batch.results[0].id, "high");
        assert_eq!(batch.results[1].id, "low");
    }

    #[test]
    fn test_total_mismatch() {
        let payload = json!({
            "total_projects": 3,
            "results": [remote_project("A", 80.0, [27.0, 20.0, 16.0, 11.0, 6.0])]
        });
        let err = batch_result(&payload, &TierTable::default()).unwrap_err();
        assert_eq!(
            err,
            ContractError::validation("total_projects", "says 3 but 1 results were returned")
        );
    }

    #[test]
    fn test_score_out_of_range() {
        let project = remote_project("A", 100.6, [27.0, 20.0, 16.0, 11.0, 6.0]);
        let payload = json!({"results": [project]});
        let err = batch_result(&payload, &TierTable::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert!(err.to_string().starts_with("results[0].score:"));
    }

    #[test]
    fn test_missing_breakdown_factor() {
        let mut project = remote_project("A", 80.0, [27.0, 20.0, 16.0, 11.0, 6.0]);
        project["breakdown"]
            .as_object_mut()
            .unwrap()
            .remove("urgency");
        let err = batch_result(&json!({"results": [project]}), &TierTable::default()).unwrap_err();
        assert_eq!(
            err,
            ContractError::validation("results[0].breakdown.urgency", "missing required factor")
        );
    }

    #[test]
    fn test_numeric_ids_and_identity_defaults() {
        let mut project = remote_project("x", 50.0, [15.0, 12.5, 10.0, 7.5, 5.0]);
        project["id"] = json!(1042);
        project.as_object_mut().unwrap().remove("sponsor");
        let batch = batch_result(&json!({"results": [project]}), &TierTable::default()).unwrap();
        let p = &batch.results[0];
        assert_eq!(p.id, "1042");
        assert_eq!(p.sponsor, "N/A");
        assert_eq!(p.priority.tier, "Medium");
    }

    #[test]
    fn test_missing_results() {
        let err = batch_result(&json!({"total_projects": 0}), &TierTable::default()).unwrap_err();
        assert_eq!(err, ContractError::validation("results", "missing required field"));
    }

    #[test]
    fn test_huge_score_is_range_error() {
        let project = remote_project("A", 1e300, [27.0, 20.0, 16.0, 11.0, 6.0]);
        let payload = json!({"results": [project]});
        let err = batch_result(&payload, &TierTable::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert!(err.to_string().starts_with("results[0].score:"));

        let project = remote_project("A", -3.0, [0.0, 0.0, 0.0, 0.0, 0.0]);
        let payload = json!({"results": [project]});
        let err = batch_result(&payload, &TierTable::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
    }

    #[test]
    fn test_huge_contribution_is_range_error() {
        let project = remote_project("A", 80.0, [1e13, 20.0, 16.0, 11.0, 6.0]);
        let payload = json!({"results": [project]});
        let err = batch_result(&payload, &TierTable::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert!(err
            .to_string()
            .starts_with("results[0].breakdown.roi.contribution:"));
    }

    #[test]
    fn test_top_of_scale_still_accepted() {
        let project = remote_project("A", 100.4, [30.0, 25.0, 20.0, 15.0, 10.4]);
        let payload = json!({"results": [project]});
        let batch = batch_result(&payload, &TierTable::default()).unwrap();
        assert_eq!(batch.results[0].score(), 100);
    }

    #[test]
    fn test_contributions_contradicting_score_rejected() {
        let project = remote_project("A", 40.0, [27.0, 20.0, 16.0, 10.5, 6.0]);
        let payload = json!({"results": [project]});
        let err = batch_result(&payload, &TierTable::default()).unwrap_err();
        assert_eq!(
            err,
            ContractError::validation(
                "results[0].breakdown",
                "contributions add up to 79.5 but the score is 40"
            )
        );
    }

    #[test]
    fn test_breakdown_value_and_weight_bounds() {
        let mut project = remote_project("A", 80.0, [27.0, 20.0, 16.0, 11.0, 6.0]);
        project["breakdown"]["risk"]["value"] = json!(140);
        let err = batch_result(&json!({"results": [project]}), &TierTable::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert!(err.to_string().starts_with("results[0].breakdown.risk.value:"));

        let mut project = remote_project("A", 80.0, [27.0, 20.0, 16.0, 11.0, 6.0]);
        project["breakdown"]["urgency"]["weight"] = json!(2.5);
        let err = batch_result(&json!({"results": [project]}), &TierTable::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert!(err.to_string().starts_with("results[0].breakdown.urgency.weight:"));
    }
}
