// Parse errors for the data model
// Out-of-range severities and importances are rejected at the boundary

use std::any::Any;

use thiserror::Error;

use crate::{ContextLogError, ErrorCode, ErrorDomain};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown severity: {0}")]
    UnknownSeverity(String),

    #[error("Unknown importance: {0}")]
    UnknownImportance(String),

    #[error("Unknown persistence method: {0}")]
    UnknownMethod(String),

    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

impl ContextLogError for ParseError {
    fn code(&self) -> ErrorCode {
        match self {
            ParseError::UnknownSeverity(_) => ErrorCode(5001),
            ParseError::UnknownImportance(_) => ErrorCode(5002),
            ParseError::UnknownMethod(_) => ErrorCode(5003),
            ParseError::UnknownVariant { .. } => ErrorCode(5004),
        }
    }

    fn domain(&self) -> ErrorDomain {
        ErrorDomain::Types
    }

    fn error_code(&self) -> &'static str {
        match self {
            ParseError::UnknownSeverity(_) => "TYPES_UNKNOWN_SEVERITY",
            ParseError::UnknownImportance(_) => "TYPES_UNKNOWN_IMPORTANCE",
            ParseError::UnknownMethod(_) => "TYPES_UNKNOWN_METHOD",
            ParseError::UnknownVariant { .. } => "TYPES_UNKNOWN_VARIANT",
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
