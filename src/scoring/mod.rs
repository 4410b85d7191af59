pub mod config;
pub mod engine;
pub mod factors;
pub mod tier;
pub mod validation;

pub use config::*;
pub use engine::{PriorityResult, ScoreBreakdownEntry, Scorer, WeightTable};
pub use factors::{Factor, FactorKey, FactorSet, OutOfRangePolicy, PriorityRequest};
pub use tier::{Tier, TierTable};
pub use validation::validate_scoring;
