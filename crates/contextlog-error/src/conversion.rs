// Error conversion utilities
// Provides tools for converting foreign errors into BoxError

use std::any::Any;

use thiserror::Error;

use crate::{BoxError, ContextLogError, ErrorCode, ErrorDomain};

/// Trait for converting any error type to a BoxError
pub trait IntoBoxError {
    /// Convert the error into a BoxError
    fn into_box_error(self) -> BoxError;
}

// Implement for anything that already implements ContextLogError
impl<E: ContextLogError> IntoBoxError for E {
    fn into_box_error(self) -> BoxError {
        Box::new(self)
    }
}

impl IntoBoxError for std::io::Error {
    fn into_box_error(self) -> BoxError {
        Box::new(ExternalError::Io(self.to_string()))
    }
}

impl IntoBoxError for serde_json::Error {
    fn into_box_error(self) -> BoxError {
        Box::new(ExternalError::Serde(self.to_string()))
    }
}

impl IntoBoxError for String {
    fn into_box_error(self) -> BoxError {
        Box::new(ExternalError::Other(self))
    }
}

impl IntoBoxError for &str {
    fn into_box_error(self) -> BoxError {
        Box::new(ExternalError::Other(self.to_string()))
    }
}

impl IntoBoxError for anyhow::Error {
    fn into_box_error(self) -> BoxError {
        Box::new(ExternalError::Other(self.to_string()))
    }
}

/// Errors that come from outside the runtime
#[derive(Error, Debug)]
pub enum ExternalError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serde(String),

    #[error("{0}")]
    Other(String),
}

impl ContextLogError for ExternalError {
    fn code(&self) -> ErrorCode {
        match self {
            ExternalError::Io(_) => ErrorCode(9001),
            ExternalError::Serde(_) => ErrorCode(9002),
            ExternalError::Other(_) => ErrorCode(9000),
        }
    }

    fn domain(&self) -> ErrorDomain {
        ErrorDomain::External
    }

    fn error_code(&self) -> &'static str {
        match self {
            ExternalError::Io(_) => "EXTERNAL_IO",
            ExternalError::Serde(_) => "EXTERNAL_SERDE",
            ExternalError::Other(_) => "EXTERNAL_OTHER",
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Convert any convertible error into a BoxError
pub fn to_box_error<E: IntoBoxError>(err: E) -> BoxError {
    err.into_box_error()
}
