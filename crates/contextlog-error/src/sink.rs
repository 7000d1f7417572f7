// Sink error types
// Retryable errors stay inside the sink worker; fatal errors disable the sink

use std::any::Any;
use std::time::Duration;

use thiserror::Error;

use crate::{ContextLogError, ErrorCode, ErrorDomain, Retryable};

/// Sink error codes
pub mod codes {
    use crate::ErrorCode;

    // Sink error codes start with 4000
    pub const RETRYABLE: ErrorCode = ErrorCode(4001);
    pub const FATAL: ErrorCode = ErrorCode(4002);
    pub const DISABLED: ErrorCode = ErrorCode(4003);
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    /// A transient failure; the worker backs off and tries again
    #[error("Retryable sink error: {message}")]
    Retryable {
        message: String,
        retry_after: Option<Duration>,
    },

    /// A permanent failure; the sink is disabled for the rest of the run
    #[error("Fatal sink error: {0}")]
    Fatal(String),

    /// The sink was disabled by an earlier fatal error
    #[error("Sink disabled: {0}")]
    Disabled(String),
}

impl SinkError {
    pub fn retryable(message: impl Into<String>) -> Self {
        SinkError::Retryable { message: message.into(), retry_after: None }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        SinkError::Fatal(message.into())
    }
}

impl ContextLogError for SinkError {
    fn code(&self) -> ErrorCode {
        match self {
            SinkError::Retryable { .. } => codes::RETRYABLE,
            SinkError::Fatal(_) => codes::FATAL,
            SinkError::Disabled(_) => codes::DISABLED,
        }
    }

    fn domain(&self) -> ErrorDomain {
        ErrorDomain::Sink
    }

    fn error_code(&self) -> &'static str {
        match self {
            SinkError::Retryable { .. } => "SINK_RETRYABLE",
            SinkError::Fatal(_) => "SINK_FATAL",
            SinkError::Disabled(_) => "SINK_DISABLED",
        }
    }

    fn is_transient(&self) -> bool {
        self.is_retryable()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Retryable for SinkError {
    fn is_retryable(&self) -> bool {
        matches!(self, SinkError::Retryable { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            SinkError::Retryable { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    fn non_retryable(self) -> Self {
        match self {
            SinkError::Retryable { message, .. } => SinkError::Fatal(message),
            other => other,
        }
    }
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut => {
                SinkError::retryable(err.to_string())
            }
            _ => SinkError::Fatal(err.to_string()),
        }
    }
}

pub type SinkResult<T> = Result<T, SinkError>;
