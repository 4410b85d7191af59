use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use super::config::{default_tiers, TierConfig};
use super::validation::validate_tiers;
use crate::error::{ContractError, ContractResult};

/// Highest score a project can reach.
pub const MAX_SCORE: u8 = 100;

/// A validated priority band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub name: String,
    pub min_score: u8,
    pub color: String,
    pub recommendation: String,
}

/// Ordered priority bands, most severe first. Thresholds partition [0, 100].
#[derive(Debug, Clone, PartialEq)]
pub struct TierTable {
    tiers: Vec<Tier>,
}

impl TierTable {
    pub fn from_config(configs: &[TierConfig]) -> ContractResult<Self> {
        let errors = validate_tiers(configs);
        if !errors.is_empty() {
            return Err(ContractError::Configuration(errors));
        }

        let tiers = configs
            .iter()
            .map(|config| Tier {
                name: config.name.trim().to_string(),
                // validate_tiers guarantees 0..=100
                min_score: config.min_score as u8,
                color: config.color.to_uppercase(),
                recommendation: config.recommendation.trim().to_string(),
            })
            .collect();

        Ok(Self { tiers })
    }

    /// Map a score to its band. Bands are scanned from the highest threshold
    /// down; the first whose lower bound is <= score wins.
    pub fn classify(&self, score: i64) -> ContractResult<&Tier> {
        if !(0..=i64::from(MAX_SCORE)).contains(&score) {
            return Err(ContractError::range(
                "score",
                format!("must be an integer in [0, 100], got {}", score),
            ));
        }

        self.tiers
            .iter()
            .find(|tier| i64::from(tier.min_score) <= score)
            .ok_or_else(|| {
                ContractError::Configuration(vec![format!("no tier covers score {}", score)])
            })
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Inclusive score range covered by the tier at `index`.
    pub fn range_of(&self, index: usize) -> Option<RangeInclusive<u8>> {
        let tier = self.tiers.get(index)?;
        let upper = match index {
            0 => MAX_SCORE,
            _ => self.tiers[index - 1].min_score - 1,
        };
        Some(tier.min_score..=upper)
    }
}

impl Default for TierTable {
    fn default() -> Self {
        let tiers = default_tiers()
            .into_iter()
            .map(|config| Tier {
                name: config.name,
                min_score: config.min_score as u8,
                color: config.color,
                recommendation: config.recommendation,
            })
            .collect();
        Self { tiers }
    }
}
