use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::factors::OutOfRangePolicy;

/// Main scoring configuration.
///
/// Every section is optional; missing sections fall back to the built-in
/// weight table and tier bands. Weights are fractions that must sum to 1.0.
/// Tiers are listed from most to least severe, each with the lowest score it
/// accepts; the last tier must start at 0.
///
/// Example YAML:
/// ```yaml
/// scoring:
///   out_of_range: reject
///   weights:
///     roi: 0.30
///     urgency: 0.25
///     risk: 0.20
///     strategic_alignment: 0.15
///     resource_availability: 0.10
///   inverted: [risk]
///   tiers:
///     - { name: Critical, min_score: 80, color: "#DC2626", recommendation: "Act now." }
///     - { name: Low, min_score: 0, color: "#16A34A", recommendation: "Revisit later." }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    /// Factor key -> weight fraction
    #[serde(default)]
    pub weights: Option<BTreeMap<String, f64>>,

    /// Factors scored as `100 - value` (higher input lowers the score)
    #[serde(default)]
    pub inverted: Option<Vec<String>>,

    /// Priority bands, most severe first
    #[serde(default)]
    pub tiers: Option<Vec<TierConfig>>,

    /// Reject (default) or clamp factor values outside [0, 100]
    #[serde(default)]
    pub out_of_range: Option<OutOfRangePolicy>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: Some(default_weights()),
            inverted: Some(vec!["risk".to_string()]),
            tiers: Some(default_tiers()),
            out_of_range: Some(OutOfRangePolicy::Reject),
        }
    }
}

impl ScoringConfig {
    pub fn effective_weights(&self) -> BTreeMap<String, f64> {
        self.weights.clone().unwrap_or_else(default_weights)
    }

    pub fn effective_inverted(&self) -> Vec<String> {
        self.inverted
            .clone()
            .unwrap_or_else(|| vec!["risk".to_string()])
    }

    pub fn effective_tiers(&self) -> Vec<TierConfig> {
        self.tiers.clone().unwrap_or_else(default_tiers)
    }

    pub fn effective_out_of_range(&self) -> OutOfRangePolicy {
        self.out_of_range.unwrap_or_default()
    }
}

/// One priority band.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TierConfig {
    pub name: String,

    /// Lowest score (inclusive) that lands in this band
    pub min_score: i64,

    /// Display color as `#RRGGBB`
    pub color: String,

    /// Recommendation shown for every project in this band
    pub recommendation: String,
}

pub fn default_weights() -> BTreeMap<String, f64> {
    [
        ("roi", 0.30),
        ("urgency", 0.25),
        ("risk", 0.20),
        ("strategic_alignment", 0.15),
        ("resource_availability", 0.10),
    ]
    .into_iter()
    .map(|(key, weight)| (key.to_string(), weight))
    .collect()
}

pub fn default_tiers() -> Vec<TierConfig> {
    vec![
        TierConfig {
            name: "Critical".to_string(),
            min_score: 80,
            color: "#DC2626".to_string(),
            recommendation:
                "Immediate action required. Allocate resources and start implementation."
                    .to_string(),
        },
        TierConfig {
            name: "High".to_string(),
            min_score: 60,
            color: "#EA580C".to_string(),
            recommendation: "Strong candidate for priority execution. Review resource allocation."
                .to_string(),
        },
        TierConfig {
            name: "Medium".to_string(),
            min_score: 40,
            color: "#CA8A04".to_string(),
            recommendation: "Queue for standard execution. Monitor for priority changes."
                .to_string(),
        },
        TierConfig {
            name: "Low".to_string(),
            min_score: 0,
            color: "#16A34A".to_string(),
            recommendation: "Schedule for future consideration. Document for quarterly review."
                .to_string(),
        },
    ]
}
