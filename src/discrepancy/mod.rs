pub mod severity;
pub mod types;
pub mod validator;

pub use severity::{classify_severity, Severity};
pub use types::{AnalysisResult, Discrepancy, DiscrepancyKind, SeverityCounts, SourceInfo};
pub use validator::{validate_discrepancy, ValidatorOptions};
