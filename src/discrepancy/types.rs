use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::severity::Severity;

/// Category of a discrepancy derived from its free-form `type` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscrepancyKind {
    Budget,
    Date,
    Text,
    Missing,
    Numeric,
    Other,
}

impl DiscrepancyKind {
    pub fn classify(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "budget" | "presupuesto" => DiscrepancyKind::Budget,
            "date" | "fecha" => DiscrepancyKind::Date,
            "text" | "texto" => DiscrepancyKind::Text,
            "missing" | "faltante" => DiscrepancyKind::Missing,
            "numeric" | "numerico" | "numérico" => DiscrepancyKind::Numeric,
            _ => DiscrepancyKind::Other,
        }
    }

    /// Kinds that compare two concrete values and therefore need at least
    /// one of the paired values.
    pub fn is_value_mismatch(&self) -> bool {
        matches!(
            self,
            DiscrepancyKind::Budget | DiscrepancyKind::Date | DiscrepancyKind::Numeric
        )
    }
}

/// A mismatch between the two compared documents. Always built through
/// `validate_discrepancy`, so every field is already normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub severity: Severity,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_value_a: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_value_b: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

impl Discrepancy {
    pub fn kind_class(&self) -> DiscrepancyKind {
        DiscrepancyKind::classify(&self.kind)
    }

    /// True when both paired values are present and equal once currency
    /// symbols, thousands separators and whitespace are stripped, e.g.
    /// "$1,744,000" and "1744000".
    pub fn values_match(&self) -> bool {
        match (&self.source_value_a, &self.source_value_b) {
            (Some(a), Some(b)) => comparable(a) == comparable(b),
            _ => false,
        }
    }
}

fn comparable(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .collect()
}

/// Descriptive metadata about one compared document (filename, sheet or
/// slide counts). Fields other than `filename` are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Result of cross-checking a spreadsheet against a slide deck.
/// `discrepancies` keeps detection order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub match_score: u8,
    pub summary: String,
    pub discrepancies: Vec<Discrepancy>,
    pub source_a_info: SourceInfo,
    pub source_b_info: SourceInfo,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl AnalysisResult {
    pub fn severity_counts(&self) -> SeverityCounts {
        let mut counts = SeverityCounts::default();
        for discrepancy in &self.discrepancies {
            match discrepancy.severity {
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
            }
        }
        counts
    }

    /// Discrepancies ordered high to low for display. Detection order is
    /// kept within a severity.
    pub fn by_severity(&self) -> Vec<&Discrepancy> {
        let mut sorted: Vec<&Discrepancy> = self.discrepancies.iter().collect();
        sorted.sort_by_key(|d| d.severity);
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discrepancy(severity: Severity, a: Option<&str>, b: Option<&str>) -> Discrepancy {
        Discrepancy {
            severity,
            kind: "budget".to_string(),
            description: "Budget differs".to_string(),
            source_value_a: a.map(str::to_string),
            source_value_b: b.map(str::to_string),
            recommendation: None,
        }
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(DiscrepancyKind::classify("Presupuesto"), DiscrepancyKind::Budget);
        assert_eq!(DiscrepancyKind::classify("fecha"), DiscrepancyKind::Date);
        assert_eq!(DiscrepancyKind::classify("faltante"), DiscrepancyKind::Missing);
        assert_eq!(DiscrepancyKind::classify("numerico"), DiscrepancyKind::Numeric);
        assert_eq!(DiscrepancyKind::classify("owner"), DiscrepancyKind::Other);
        assert!(DiscrepancyKind::Budget.is_value_mismatch());
        assert!(!DiscrepancyKind::Missing.is_value_mismatch());
        assert!(!DiscrepancyKind::Text.is_value_mismatch());
    }

    #[test]
    fn test_values_match_ignores_formatting() {
        assert!(discrepancy(Severity::High, Some("$1,744,000"), Some("1744000")).values_match());
        assert!(!discrepancy(Severity::High, Some("1,500,000"), Some("1,750,000")).values_match());
        assert!(!discrepancy(Severity::High, Some("100"), None).values_match());
    }

    #[test]
    fn test_severity_counts_and_display_order() {
        let result = AnalysisResult {
            match_score: 70,
            summary: "Two issues".to_string(),
            discrepancies: vec![
                discrepancy(Severity::Low, Some("a"), Some("b")),
                discrepancy(Severity::High, Some("c"), Some("d")),
                discrepancy(Severity::Low, Some("e"), Some("f")),
            ],
            source_a_info: SourceInfo::default(),
            source_b_info: SourceInfo::default(),
        };
        let counts = result.severity_counts();
        assert_eq!((counts.high, counts.medium, counts.low), (1, 0, 2));

        let ordered = result.by_severity();
        assert_eq!(ordered[0].source_value_a.as_deref(), Some("c"));
        assert_eq!(ordered[1].source_value_a.as_deref(), Some("a"));
        assert_eq!(ordered[2].source_value_a.as_deref(), Some("e"));
        // the stored order is untouched
        assert_eq!(result.discrepancies[0].severity, Severity::Low);
    }

    #[test]
    fn test_source_info_keeps_extra_fields() {
        let raw = r#"{"filename": "q3.xlsx", "sheets": 2, "total_rows": 40}"#;
        let info: SourceInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(info.filename.as_deref(), Some("q3.xlsx"));
        assert_eq!(info.details["sheets"], 2);
        let back = serde_json::to_value(&info).unwrap();
        assert_eq!(back["total_rows"], 40);
    }

    #[test]
    fn test_absent_pairs_not_serialized() {
        let json = serde_json::to_value(discrepancy(Severity::Medium, None, None)).unwrap();
        assert!(json.get("source_value_a").is_none());
        assert_eq!(json["type"], "budget");
        assert_eq!(json["severity"], "medium");
    }
}
