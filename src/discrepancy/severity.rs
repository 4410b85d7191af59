use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

const HIGH_LABELS: &[&str] = &["high", "alta", "alto"];
const MEDIUM_LABELS: &[&str] = &["medium", "media", "medio"];
const LOW_LABELS: &[&str] = &["low", "baja", "bajo"];

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }

    /// Match a label against the known English and Spanish spellings.
    /// Returns `None` for anything unrecognized.
    pub fn recognize(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase();
        if HIGH_LABELS.contains(&normalized.as_str()) {
            Some(Severity::High)
        } else if MEDIUM_LABELS.contains(&normalized.as_str()) {
            Some(Severity::Medium)
        } else if LOW_LABELS.contains(&normalized.as_str()) {
            Some(Severity::Low)
        } else {
            None
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map any label to a severity. Unrecognized labels (including the empty
/// string) are treated as informational and classified as low.
pub fn classify_severity(label: &str) -> Severity {
    Severity::recognize(label).unwrap_or(Severity::Low)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_labels() {
        assert_eq!(classify_severity("high"), Severity::High);
        assert_eq!(classify_severity("medium"), Severity::Medium);
        assert_eq!(classify_severity("low"), Severity::Low);
    }

    #[test]
    fn test_spanish_labels() {
        assert_eq!(classify_severity("alta"), Severity::High);
        assert_eq!(classify_severity("media"), Severity::Medium);
        assert_eq!(classify_severity("baja"), Severity::Low);
    }

    #[test]
    fn test_case_and_whitespace_ignored() {
        assert_eq!(classify_severity("  HIGH "), Severity::High);
        assert_eq!(classify_severity("Media"), Severity::Medium);
        assert_eq!(classify_severity("ALTA"), Severity::High);
    }

    #[test]
    fn test_unknown_defaults_to_low() {
        assert_eq!(classify_severity(""), Severity::Low);
        assert_eq!(classify_severity("critical"), Severity::Low);
        assert_eq!(classify_severity("¿?"), Severity::Low);
    }

    #[test]
    fn test_recognize_distinguishes_unknown_from_low() {
        assert_eq!(Severity::recognize("bajo"), Some(Severity::Low));
        assert_eq!(Severity::recognize("urgent"), None);
    }

    #[test]
    fn test_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::Medium).unwrap(), "\"medium\"");
    }
}
