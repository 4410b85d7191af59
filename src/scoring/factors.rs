use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::error::{ContractError, ContractResult};

/// Lowest and highest value a factor may take.
pub const FACTOR_MIN: f64 = 0.0;
pub const FACTOR_MAX: f64 = 100.0;

/// One scored dimension of a project. Variant order is the canonical
/// factor order used for breakdowns and tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKey {
    Roi,
    Urgency,
    Risk,
    StrategicAlignment,
    ResourceAvailability,
}

impl FactorKey {
    pub const ALL: [FactorKey; 5] = [
        FactorKey::Roi,
        FactorKey::Urgency,
        FactorKey::Risk,
        FactorKey::StrategicAlignment,
        FactorKey::ResourceAvailability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FactorKey::Roi => "roi",
            FactorKey::Urgency => "urgency",
            FactorKey::Risk => "risk",
            FactorKey::StrategicAlignment => "strategic_alignment",
            FactorKey::ResourceAvailability => "resource_availability",
        }
    }

    /// Human label for tables, e.g. "Strategic alignment".
    pub fn label(&self) -> &'static str {
        match self {
            FactorKey::Roi => "ROI",
            FactorKey::Urgency => "Urgency",
            FactorKey::Risk => "Risk",
            FactorKey::StrategicAlignment => "Strategic alignment",
            FactorKey::ResourceAvailability => "Resource availability",
        }
    }

    /// Parse a snake_case key. Case and surrounding whitespace are ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        FactorKey::ALL
            .into_iter()
            .find(|key| key.as_str() == normalized)
    }
}

impl fmt::Display for FactorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with a factor value outside [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRangePolicy {
    #[default]
    Reject,
    Clamp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Factor {
    pub key: FactorKey,
    pub value: f64,
}

impl Factor {
    pub fn new(key: FactorKey, value: f64) -> Self {
        Self { key, value }
    }
}

/// Check a single factor value against [0, 100] under the given policy.
pub fn check_value(key: FactorKey, value: f64, policy: OutOfRangePolicy) -> ContractResult<f64> {
    if !value.is_finite() {
        return Err(ContractError::range(key.as_str(), "must be a finite number"));
    }
    if (FACTOR_MIN..=FACTOR_MAX).contains(&value) {
        return Ok(value);
    }
    match policy {
        OutOfRangePolicy::Reject => Err(ContractError::range(
            key.as_str(),
            format!("value {} outside [0, 100]", value),
        )),
        OutOfRangePolicy::Clamp => {
            let clamped = value.clamp(FACTOR_MIN, FACTOR_MAX);
            debug!(factor = key.as_str(), value, clamped, "clamped out-of-range factor");
            Ok(clamped)
        }
    }
}

/// A complete set of factors: every key exactly once, every value in range.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorSet {
    values: BTreeMap<FactorKey, f64>,
}

impl FactorSet {
    pub fn from_factors<I>(factors: I, policy: OutOfRangePolicy) -> ContractResult<Self>
    where
        I: IntoIterator<Item = Factor>,
    {
        let mut values = BTreeMap::new();
        for factor in factors {
            let value = check_value(factor.key, factor.value, policy)?;
            if values.insert(factor.key, value).is_some() {
                return Err(ContractError::validation(
                    factor.key.as_str(),
                    "factor given more than once",
                ));
            }
        }

        if let Some(missing) = FactorKey::ALL.iter().find(|key| !values.contains_key(key)) {
            return Err(ContractError::validation(
                missing.as_str(),
                "missing required factor",
            ));
        }

        Ok(Self { values })
    }

    /// Build from loosely keyed input such as a JSON object or CSV row.
    /// Unknown keys are rejected rather than ignored.
    pub fn from_named(
        named: &BTreeMap<String, f64>,
        policy: OutOfRangePolicy,
    ) -> ContractResult<Self> {
        let mut factors = Vec::with_capacity(named.len());
        for (name, value) in named {
            let key = FactorKey::parse(name)
                .ok_or_else(|| ContractError::validation(name.as_str(), "unknown factor"))?;
            factors.push(Factor::new(key, *value));
        }
        Self::from_factors(factors, policy)
    }

    pub fn get(&self, key: FactorKey) -> f64 {
        self.values.get(&key).copied().unwrap_or(FACTOR_MIN)
    }

    pub fn iter(&self) -> impl Iterator<Item = Factor> + '_ {
        self.values.iter().map(|(key, value)| Factor::new(*key, *value))
    }
}

/// Request body of the single-project scoring operation.
///
/// `strategic_alignment` and `resource_availability` fall back to a neutral
/// 50 when omitted, as the scoring service's request model does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PriorityRequest {
    pub roi: f64,
    pub urgency: f64,
    pub risk: f64,
    #[serde(default = "neutral_value")]
    pub strategic_alignment: f64,
    #[serde(default = "neutral_value")]
    pub resource_availability: f64,
}

fn neutral_value() -> f64 {
    50.0
}

impl PriorityRequest {
    pub fn factors(&self) -> [Factor; 5] {
        [
            Factor::new(FactorKey::Roi, self.roi),
            Factor::new(FactorKey::Urgency, self.urgency),
            Factor::new(FactorKey::Risk, self.risk),
            Factor::new(FactorKey::StrategicAlignment, self.strategic_alignment),
            Factor::new(FactorKey::ResourceAvailability, self.resource_availability),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn full_set(values: [f64; 5]) -> Vec<Factor> {
        FactorKey::ALL
            .into_iter()
            .zip(values)
            .map(|(key, value)| Factor::new(key, value))
            .collect()
    }

    #[test]
    fn test_parse_factor_key() {
        assert_eq!(FactorKey::parse("roi"), Some(FactorKey::Roi));
        assert_eq!(FactorKey::parse(" Strategic_Alignment "), Some(FactorKey::StrategicAlignment));
        assert_eq!(FactorKey::parse("budget"), None);
    }

    #[test]
    fn test_complete_set() {
        let factors = full_set([90.0, 80.0, 20.0, 70.0, 60.0]);
        let set = FactorSet::from_factors(factors, OutOfRangePolicy::Reject).unwrap();
        assert_eq!(set.get(FactorKey::Risk), 20.0);
        assert_eq!(set.iter().count(), 5);
    }

    #[test]
    fn test_missing_factor_is_validation_error() {
        let mut factors = full_set([1.0, 2.0, 3.0, 4.0, 5.0]);
        factors.remove(1);
        let err = FactorSet::from_factors(factors, OutOfRangePolicy::Reject).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().starts_with("urgency:"));
    }

    #[test]
    fn test_duplicate_factor_is_validation_error() {
        let mut factors = full_set([1.0, 2.0, 3.0, 4.0, 5.0]);
        factors.push(Factor::new(FactorKey::Roi, 10.0));
        let err = FactorSet::from_factors(factors, OutOfRangePolicy::Reject).unwrap_err();
        assert_eq!(err, ContractError::validation("roi", "factor given more than once"));
    }

    #[test]
    fn test_out_of_range_rejected_by_default() {
        let factors = full_set([101.0, 2.0, 3.0, 4.0, 5.0]);
        let err = FactorSet::from_factors(factors, OutOfRangePolicy::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
    }

    #[test]
    fn test_out_of_range_clamped_when_configured() {
        let factors = full_set([101.0, -4.0, 3.0, 4.0, 5.0]);
        let set = FactorSet::from_factors(factors, OutOfRangePolicy::Clamp).unwrap();
        assert_eq!(set.get(FactorKey::Roi), 100.0);
        assert_eq!(set.get(FactorKey::Urgency), 0.0);
    }

    #[test]
    fn test_nan_rejected_even_when_clamping() {
        let err = check_value(FactorKey::Risk, f64::NAN, OutOfRangePolicy::Clamp).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
    }

    #[test]
    fn test_from_named_rejects_unknown_key() {
        let mut named = BTreeMap::new();
        named.insert("roi".to_string(), 10.0);
        named.insert("budget".to_string(), 10.0);
        let err = FactorSet::from_named(&named, OutOfRangePolicy::Reject).unwrap_err();
        assert_eq!(err, ContractError::validation("budget", "unknown factor"));
    }

    #[test]
    fn test_priority_request_defaults() {
        let request: PriorityRequest =
            serde_json::from_str(r#"{"roi": 70, "urgency": 40, "risk": 30}"#).unwrap();
        assert_eq!(request.strategic_alignment, 50.0);
        assert_eq!(request.resource_availability, 50.0);
        assert_eq!(request.factors()[2], Factor::new(FactorKey::Risk, 30.0));
    }
}
