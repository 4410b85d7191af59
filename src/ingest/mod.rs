//! Boundary between untyped service JSON and the typed contract.
//!
//! Everything received from the remote service, or loaded from a saved
//! response file, goes through one of these functions before it is used.

pub mod analysis;
pub mod batch;
pub mod history;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ContractError, ContractResult, ErrorBody};

pub use analysis::{analysis_result, IngestedAnalysis};
pub use batch::batch_result;
pub use history::{history_record, history_records, IngestedHistory};

/// A list entry that failed validation and was left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    pub index: usize,
    pub error: ErrorBody,
}

pub(crate) fn expect_object<'a>(
    value: &'a Value,
    what: &str,
) -> ContractResult<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| ContractError::validation(what, "expected a JSON object"))
}
