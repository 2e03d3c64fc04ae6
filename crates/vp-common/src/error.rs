//! Configuration error taxonomy and aggregate validation reporting.
//!
//! Loading either fully succeeds or fully fails. Validation problems are
//! collected into a single [`ValidationReport`] so an operator can fix every
//! broken key in one editing pass instead of iterating error-by-error.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("io_config not found: {path}")]
    MissingReference { path: String },

    #[error("io_config document {path} declares its own io_config; only one level of indirection is allowed")]
    NestedReference { path: String },

    #[error("{0}")]
    Validation(ValidationReport),
}

impl ConfigError {
    /// Stable error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ConfigError::Io { .. } => 60,
            ConfigError::Parse { .. } => 61,
            ConfigError::MissingReference { .. } => 62,
            ConfigError::NestedReference { .. } => 63,
            ConfigError::Validation(_) => 64,
        }
    }
}

/// What kind of problem a single key exhibits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A required key is absent from the merged document.
    MissingKey,
    /// The key is present but has the wrong type or an out-of-range value.
    InvalidValue,
    /// A constraint spanning multiple keys is violated.
    InvariantViolation,
    /// A key the schema does not recognize (strict mode only).
    UnknownKey,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::MissingKey => write!(f, "missing key"),
            IssueKind::InvalidValue => write!(f, "invalid value"),
            IssueKind::InvariantViolation => write!(f, "invariant violation"),
            IssueKind::UnknownKey => write!(f, "unknown key"),
        }
    }
}

/// A single validation problem, tied to the key that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub key: String,
    pub kind: IssueKind,
    pub reason: String,
}

impl Issue {
    pub fn missing(key: &str) -> Self {
        Issue {
            key: key.to_string(),
            kind: IssueKind::MissingKey,
            reason: "required key is absent".to_string(),
        }
    }

    pub fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Issue {
            key: key.to_string(),
            kind: IssueKind::InvalidValue,
            reason: reason.into(),
        }
    }

    pub fn invariant(key: &str, reason: impl Into<String>) -> Self {
        Issue {
            key: key.to_string(),
            kind: IssueKind::InvariantViolation,
            reason: reason.into(),
        }
    }

    pub fn unknown(key: &str) -> Self {
        Issue {
            key: key.to_string(),
            kind: IssueKind::UnknownKey,
            reason: "key is not part of the schema (strict mode)".to_string(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.key, self.kind, self.reason)
    }
}

/// Every validation problem found in one load, reported together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        ValidationReport::default()
    }

    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// True if any issue names the given key.
    pub fn mentions(&self, key: &str) -> bool {
        self.issues.iter().any(|i| i.key == key)
    }

    /// Turn a non-empty report into an error, or pass `ok` through.
    pub fn into_result<T>(self, ok: T) -> Result<T> {
        if self.is_empty() {
            Ok(ok)
        } else {
            Err(ConfigError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "configuration invalid ({} problem(s)):", self.issues.len())?;
        for issue in &self.issues {
            writeln!(f, "  - {}", issue)?;
        }
        Ok(())
    }
}
