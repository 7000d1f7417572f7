// Configuration error types
// Raised before any runtime state is built

use std::any::Any;
use std::fmt;

use thiserror::Error;

use crate::{ContextLogError, ErrorCode, ErrorDomain};

/// Configuration error codes
pub mod codes {
    use crate::ErrorCode;

    // Configuration error codes start with 1000
    pub const INVALID: ErrorCode = ErrorCode(1001);
    pub const PARSE: ErrorCode = ErrorCode(1002);
    pub const IO: ErrorCode = ErrorCode(1003);
}

/// A single problem found while validating a configuration record
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValidationIssue {
    /// Dotted path of the offending field, e.g. `sinks.file.path`
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors produced while loading or validating configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// One or more fields failed validation
    #[error("Invalid configuration ({} issue(s)): {}", .0.len(), join_issues(.0))]
    Invalid(Vec<ValidationIssue>),

    /// The configuration text could not be parsed
    #[error("Configuration parse error: {0}")]
    Parse(String),

    /// The configuration file could not be read
    #[error("Configuration I/O error: {0}")]
    Io(String),
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl ConfigError {
    /// The validation issues carried by this error, if any
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            ConfigError::Invalid(issues) => issues,
            _ => &[],
        }
    }
}

impl ContextLogError for ConfigError {
    fn code(&self) -> ErrorCode {
        match self {
            ConfigError::Invalid(_) => codes::INVALID,
            ConfigError::Parse(_) => codes::PARSE,
            ConfigError::Io(_) => codes::IO,
        }
    }

    fn domain(&self) -> ErrorDomain {
        ErrorDomain::Config
    }

    fn error_code(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "CONFIG_INVALID",
            ConfigError::Parse(_) => "CONFIG_PARSE",
            ConfigError::Io(_) => "CONFIG_IO",
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

/// Convenient Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_lists_every_issue() {
        let err = ConfigError::Invalid(vec![
            ValidationIssue::new("application_name", "must not be empty"),
            ValidationIssue::new("queue.capacity", "must be at most 1000000"),
        ]);
        let text = err.to_string();
        assert!(text.contains("2 issue(s)"));
        assert!(text.contains("application_name: must not be empty"));
        assert!(text.contains("queue.capacity"));
        assert_eq!(err.issues().len(), 2);
        assert_eq!(err.code(), codes::INVALID);
    }
}
