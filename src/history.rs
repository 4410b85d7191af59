use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which history a record belongs to. Each kind lives under its own
/// service path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    /// Spreadsheet vs slide-deck cross-checks
    #[value(name = "analysis")]
    CrossCheck,
    /// Batch prioritizations
    Batch,
}

impl HistoryKind {
    pub fn path(&self) -> &'static str {
        match self {
            HistoryKind::CrossCheck => "history",
            HistoryKind::Batch => "priority-history",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HistoryKind::CrossCheck => "cross-check",
            HistoryKind::Batch => "batch",
        }
    }
}

impl fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Completed,
    Pending,
    Failed,
}

impl HistoryStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "completed" => Some(HistoryStatus::Completed),
            "pending" => Some(HistoryStatus::Pending),
            "failed" => Some(HistoryStatus::Failed),
            _ => None,
        }
    }

    /// Details of a completed record never change, so they can be cached.
    pub fn is_final(&self) -> bool {
        *self == HistoryStatus::Completed
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryStatus::Completed => "completed",
            HistoryStatus::Pending => "pending",
            HistoryStatus::Failed => "failed",
        }
    }
}

/// One persisted analysis, as listed by the service. Read-only on this side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: u64,
    pub kind: HistoryKind,
    /// Spreadsheet and deck for cross-checks, the single upload for batches
    pub filenames: Vec<String>,
    pub analysis_date: DateTime<Utc>,
    pub status: HistoryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_projects: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_paths() {
        assert_eq!(HistoryKind::CrossCheck.path(), "history");
        assert_eq!(HistoryKind::Batch.path(), "priority-history");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(HistoryStatus::parse("Completed"), Some(HistoryStatus::Completed));
        assert_eq!(HistoryStatus::parse(" pending"), Some(HistoryStatus::Pending));
        assert_eq!(HistoryStatus::parse("failed"), Some(HistoryStatus::Failed));
        assert_eq!(HistoryStatus::parse("archived"), None);
    }

    #[test]
    fn test_only_completed_is_final() {
        assert!(HistoryStatus::Completed.is_final());
        assert!(!HistoryStatus::Pending.is_final());
        assert!(!HistoryStatus::Failed.is_final());
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&HistoryKind::CrossCheck).unwrap(),
            "\"cross_check\""
        );
    }
}
