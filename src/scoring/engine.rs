use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::config::ScoringConfig;
use super::factors::{Factor, FactorKey, FactorSet, OutOfRangePolicy, PriorityRequest};
use super::tier::{TierTable, MAX_SCORE};
use super::validation::{validate_scoring, weight_to_basis_points, WEIGHT_SCALE};
use crate::error::{ContractError, ContractResult};

/// Factor values are carried in hundredths of a point.
const VALUE_SCALE: i64 = 100;

/// Raw contributions are `hundredths * basis points`, i.e. millionths of a point.
pub(crate) const RAW_SCALE: i64 = VALUE_SCALE * WEIGHT_SCALE as i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdownEntry {
    pub value: f64,
    pub weight: f64,
    /// Points this factor adds to the final score
    pub contribution: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityResult {
    pub score: u8,
    pub tier: String,
    pub tier_color: String,
    pub breakdown: BTreeMap<FactorKey, ScoreBreakdownEntry>,
    pub recommendation: String,
}

/// Validated weight table in basis points.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable {
    basis_points: BTreeMap<FactorKey, u32>,
    inverted: BTreeSet<FactorKey>,
}

impl WeightTable {
    pub fn weight(&self, key: FactorKey) -> f64 {
        f64::from(self.basis_points.get(&key).copied().unwrap_or(0)) / f64::from(WEIGHT_SCALE)
    }

    pub fn is_inverted(&self, key: FactorKey) -> bool {
        self.inverted.contains(&key)
    }

    /// Weighted share of one factor in millionths of a point.
    fn raw_contribution(&self, factor: Factor) -> i64 {
        let hundredths = (factor.value * VALUE_SCALE as f64).round() as i64;
        let effective = if self.is_inverted(factor.key) {
            100 * VALUE_SCALE - hundredths
        } else {
            hundredths
        };
        let bp = i64::from(self.basis_points.get(&factor.key).copied().unwrap_or(0));
        effective * bp
    }
}

/// Scoring engine built from a validated configuration. Construction fails
/// with a configuration error, so a `Scorer` that exists is always usable.
#[derive(Debug, Clone, PartialEq)]
pub struct Scorer {
    weights: WeightTable,
    tiers: TierTable,
    out_of_range: OutOfRangePolicy,
}

impl Scorer {
    pub fn new(config: &ScoringConfig) -> ContractResult<Self> {
        validate_scoring(config).map_err(ContractError::Configuration)?;

        let mut basis_points = BTreeMap::new();
        for (name, weight) in config.effective_weights() {
            // Both conversions were checked by validate_scoring
            if let (Some(key), Some(bp)) =
                (FactorKey::parse(&name), weight_to_basis_points(weight))
            {
                basis_points.insert(key, bp);
            }
        }
        let inverted = config
            .effective_inverted()
            .iter()
            .filter_map(|name| FactorKey::parse(name))
            .collect();

        Ok(Self {
            weights: WeightTable {
                basis_points,
                inverted,
            },
            tiers: TierTable::from_config(&config.effective_tiers())?,
            out_of_range: config.effective_out_of_range(),
        })
    }

    pub fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    pub fn out_of_range(&self) -> OutOfRangePolicy {
        self.out_of_range
    }

    /// Validate raw factors under this scorer's range policy.
    pub fn factor_set<I>(&self, factors: I) -> ContractResult<FactorSet>
    where
        I: IntoIterator<Item = Factor>,
    {
        FactorSet::from_factors(factors, self.out_of_range)
    }

    pub fn score_request(&self, request: &PriorityRequest) -> ContractResult<PriorityResult> {
        let factors = self.factor_set(request.factors())?;
        self.aggregate(&factors)
    }

    /// Combine weighted factors into an integer score, its tier and a
    /// breakdown whose contributions sum exactly to the score.
    pub fn aggregate(&self, factors: &FactorSet) -> ContractResult<PriorityResult> {
        let raws: Vec<(Factor, i64)> = factors
            .iter()
            .map(|factor| (factor, self.weights.raw_contribution(factor)))
            .collect();

        let total: i64 = raws.iter().map(|(_, raw)| raw).sum();
        let score = round_half_up(total).clamp(0, i64::from(MAX_SCORE)) as u8;

        let raw_values: Vec<i64> = raws.iter().map(|(_, raw)| *raw).collect();
        let contributions = reconcile_contributions(&raw_values, score);

        let breakdown = raws
            .iter()
            .zip(contributions)
            .map(|((factor, _), contribution)| {
                (
                    factor.key,
                    ScoreBreakdownEntry {
                        value: factor.value,
                        weight: self.weights.weight(factor.key),
                        contribution,
                    },
                )
            })
            .collect();

        let tier = self.tiers.classify(i64::from(score))?;
        debug!(score, tier = %tier.name, "aggregated priority score");

        Ok(PriorityResult {
            score,
            tier: tier.name.clone(),
            tier_color: tier.color.clone(),
            breakdown,
            recommendation: tier.recommendation.clone(),
        })
    }
}

/// Round millionths of a point to whole points, halves away from zero.
/// Saturates instead of overflowing at the ends of `i64`.
pub(crate) fn round_half_up(raw: i64) -> i64 {
    if raw >= 0 {
        raw.saturating_add(RAW_SCALE / 2) / RAW_SCALE
    } else {
        -(raw.saturating_neg().saturating_add(RAW_SCALE / 2) / RAW_SCALE)
    }
}

/// Round each raw contribution and hand out the rounding drift so the
/// rounded values sum to `score`.
///
/// Largest remainder: when points are missing they go to the entries that
/// were rounded down the most; when there are too many they come off the
/// entries that were rounded up the most. Ties go to the earlier entry.
///
/// Each raw value must be within 100 points either way; the drift is
/// handed out one point at a time.
pub(crate) fn reconcile_contributions(raws: &[i64], score: u8) -> Vec<u32> {
    let mut rounded: Vec<i64> = raws.iter().map(|raw| round_half_up(*raw).max(0)).collect();
    if rounded.is_empty() {
        return Vec::new();
    }

    // Positive error: rounded up. Negative: rounded down.
    let errors: Vec<i64> = raws
        .iter()
        .zip(&rounded)
        .map(|(raw, r)| r.saturating_mul(RAW_SCALE).saturating_sub(*raw))
        .collect();

    let rounded_total = rounded.iter().fold(0i64, |acc, r| acc.saturating_add(*r));
    let mut residual = i64::from(score).saturating_sub(rounded_total);
    let mut order: Vec<usize> = (0..rounded.len()).collect();

    if residual > 0 {
        order.sort_by_key(|&i| errors[i]);
        for &i in order.iter().cycle() {
            if residual == 0 {
                break;
            }
            rounded[i] += 1;
            residual -= 1;
        }
    } else if residual < 0 {
        order.sort_by_key(|&i| std::cmp::Reverse(errors[i]));
        let mut stalled = 0;
        for &i in order.iter().cycle() {
            if residual == 0 || stalled == rounded.len() {
                break;
            }
            if rounded[i] > 0 {
                rounded[i] -= 1;
                residual += 1;
                stalled = 0;
            } else {
                stalled += 1;
            }
        }
    }

    rounded.into_iter().map(|r| r as u32).collect()
}
