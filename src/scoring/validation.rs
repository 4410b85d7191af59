use std::collections::HashSet;

use super::config::{ScoringConfig, TierConfig};
use super::factors::FactorKey;

/// Weights are stored as basis points; 10_000 is a weight of 1.0.
pub const WEIGHT_SCALE: u32 = 10_000;

/// Convert a weight fraction to basis points, or `None` if it carries more
/// precision than 0.0001 or lies outside [0, 1].
pub fn weight_to_basis_points(weight: f64) -> Option<u32> {
    if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
        return None;
    }
    let scaled = weight * f64::from(WEIGHT_SCALE);
    let rounded = scaled.round();
    if (scaled - rounded).abs() > 1e-6 {
        return None;
    }
    Some(rounded as u32)
}

/// True for `#RRGGBB`.
pub fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Validate scoring configuration at startup.
/// Returns all validation errors at once (not just the first).
pub fn validate_scoring(config: &ScoringConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    validate_weights(config, &mut errors);
    validate_inverted(config, &mut errors);
    errors.extend(validate_tiers(&config.effective_tiers()));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_weights(config: &ScoringConfig, errors: &mut Vec<String>) {
    let weights = config.effective_weights();
    let mut seen = HashSet::new();
    let mut total: u32 = 0;
    let mut all_representable = true;

    for (name, weight) in &weights {
        let Some(key) = FactorKey::parse(name) else {
            errors.push(format!("scoring.weights.{}: unknown factor", name));
            continue;
        };
        if !seen.insert(key) {
            errors.push(format!("scoring.weights.{}: factor given more than once", name));
            continue;
        }
        match weight_to_basis_points(*weight) {
            Some(bp) => total += bp,
            None => {
                all_representable = false;
                errors.push(format!(
                    "scoring.weights.{}: invalid weight {} - must be in [0, 1], 4 decimals at most",
                    name, weight
                ));
            }
        }
    }

    for key in FactorKey::ALL {
        if !seen.contains(&key) {
            errors.push(format!("scoring.weights: missing factor '{}'", key));
        }
    }

    if all_representable && total != WEIGHT_SCALE {
        errors.push(format!(
            "scoring.weights: must sum to 1.0 (got {})",
            f64::from(total) / f64::from(WEIGHT_SCALE)
        ));
    }
}

fn validate_inverted(config: &ScoringConfig, errors: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for (i, name) in config.effective_inverted().iter().enumerate() {
        match FactorKey::parse(name) {
            Some(key) => {
                if !seen.insert(key) {
                    errors.push(format!("scoring.inverted[{}]: '{}' listed twice", i, name));
                }
            }
            None => errors.push(format!("scoring.inverted[{}]: unknown factor '{}'", i, name)),
        }
    }
}

/// Tiers must be listed most severe first with strictly decreasing
/// thresholds, and the last band must start at 0 so [0, 100] has no gaps.
pub fn validate_tiers(tiers: &[TierConfig]) -> Vec<String> {
    let mut errors = Vec::new();

    if tiers.is_empty() {
        errors.push("scoring.tiers: at least one tier is required".to_string());
        return errors;
    }

    let mut names = HashSet::new();
    for (i, tier) in tiers.iter().enumerate() {
        let name = tier.name.trim();
        if name.is_empty() {
            errors.push(format!("scoring.tiers[{}].name: must not be empty", i));
        } else if !names.insert(name.to_lowercase()) {
            errors.push(format!("scoring.tiers[{}].name: duplicate tier '{}'", i, name));
        }

        if !(0..=100).contains(&tier.min_score) {
            errors.push(format!(
                "scoring.tiers[{}].min_score: {} outside [0, 100]",
                i, tier.min_score
            ));
        }

        if !is_hex_color(&tier.color) {
            errors.push(format!(
                "scoring.tiers[{}].color: invalid '{}' - expected #RRGGBB",
                i, tier.color
            ));
        }

        if tier.recommendation.trim().is_empty() {
            errors.push(format!("scoring.tiers[{}].recommendation: must not be empty", i));
        }

        if i > 0 {
            let previous = &tiers[i - 1];
            if tier.min_score >= previous.min_score {
                errors.push(format!(
                    "scoring.tiers[{}].min_score: must be lower than '{}' ({})",
                    i, previous.name, previous.min_score
                ));
            }
        }
    }

    if let Some(last) = tiers.last() {
        if last.min_score != 0 {
            errors.push(format!(
                "scoring.tiers[{}].min_score: lowest tier must start at 0 (got {})",
                tiers.len() - 1,
                last.min_score
            ));
        }
    }

    errors
}
