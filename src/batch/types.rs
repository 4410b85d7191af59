use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ErrorBody;
use crate::scoring::PriorityResult;

/// What to do when one project in a batch cannot be scored.
///
/// No `Default`: callers always pick one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Fail the whole batch with the first project's error
    Abort,
    /// Leave invalid projects out and list them under `skipped`
    Skip,
}

/// One row of batch input before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectInput {
    #[serde(default = "unknown_id")]
    pub id: String,
    #[serde(default = "untitled")]
    pub name: String,
    #[serde(default = "not_available")]
    pub area: String,
    #[serde(default = "not_available")]
    pub sponsor: String,
    /// Factor key -> value in [0, 100]
    #[serde(default)]
    pub factors: BTreeMap<String, f64>,
}

pub(crate) fn unknown_id() -> String {
    "Unknown".to_string()
}

pub(crate) fn untitled() -> String {
    "Untitled".to_string()
}

pub(crate) fn not_available() -> String {
    "N/A".to_string()
}

/// A scored project in a batch result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedProject {
    pub id: String,
    pub name: String,
    pub area: String,
    pub sponsor: String,
    #[serde(flatten)]
    pub priority: PriorityResult,
}

impl RankedProject {
    pub fn score(&self) -> u8 {
        self.priority.score
    }
}

/// A project left out of the batch under `FailurePolicy::Skip`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedProject {
    /// Position in the input, zero-based
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub total_projects: usize,
    /// Highest score first; equal scores keep input order
    pub results: Vec<RankedProject>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedProject>,
}
