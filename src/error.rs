use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse error category shared by the contract validators and the remote
/// service, so presentation layers can render both the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "range_error")]
    Range,
    #[serde(rename = "configuration_error")]
    Configuration,
    #[serde(rename = "validation_error")]
    Validation,
    #[serde(rename = "transport_error")]
    Transport,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Range => "range_error",
            ErrorKind::Configuration => "configuration_error",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Transport => "transport_error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContractError {
    /// A numeric value fell outside its allowed domain.
    #[error("{field}: {message}")]
    Range { field: String, message: String },

    /// Tier thresholds or weights are malformed. Always fatal at startup.
    #[error("invalid configuration: {}", .0.join("; "))]
    Configuration(Vec<String>),

    /// A single record failed shape or invariant checks.
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    /// The remote service was unreachable or answered with a non-success status.
    #[error("service request failed: {0}")]
    Transport(String),
}

pub type ContractResult<T> = Result<T, ContractError>;

impl ContractError {
    pub fn range(field: impl Into<String>, message: impl Into<String>) -> Self {
        ContractError::Range {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ContractError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ContractError::Range { .. } => ErrorKind::Range,
            ContractError::Configuration(_) => ErrorKind::Configuration,
            ContractError::Validation { .. } => ErrorKind::Validation,
            ContractError::Transport(_) => ErrorKind::Transport,
        }
    }

    /// Prefix the offending field with an enclosing scope, e.g.
    /// `roi` becomes `projects[2].roi`.
    pub fn within(self, scope: &str) -> Self {
        match self {
            ContractError::Range { field, message } => ContractError::Range {
                field: format!("{}.{}", scope, field),
                message,
            },
            ContractError::Validation { field, message } => ContractError::Validation {
                field: format!("{}.{}", scope, field),
                message,
            },
            other => other,
        }
    }
}

/// Wire shape `{kind, message}` for rendering errors uniformly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ContractError> for ErrorBody {
    fn from(err: &ContractError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
