// contextlog error handling framework
// Central location for error types, traits, and handling utilities

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;

// Re-export common error handling tools for convenience
pub use anyhow;
pub use thiserror;
#[doc(hidden)]
pub use tracing as __tracing;

mod conversion;
mod macros;
mod traits;

mod config;
mod policy;
mod probe;
mod queue;
mod sink;
mod types;

pub use config::{ConfigError, ConfigResult, ValidationIssue};
pub use conversion::{to_box_error, ExternalError, IntoBoxError};
pub use policy::{PolicyError, PolicyResult};
pub use probe::{ProbeError, ProbeResult};
pub use queue::{QueueError, QueueResult};
pub use sink::{SinkError, SinkResult};
pub use traits::Retryable;
pub use types::{ParseError, ParseResult};

/// Error domains representing the subsystems of the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorDomain {
    /// Configuration loading and validation
    Config,
    /// Policy edits, presets and triggers
    Policy,
    /// Smart queue operations
    Queue,
    /// Sink writes and lifecycle
    Sink,
    /// Parsing of the data model
    Types,
    /// System metric sampling
    Probe,
    /// Errors from outside the runtime
    External,
}

impl fmt::Display for ErrorDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorDomain::Config => write!(f, "config"),
            ErrorDomain::Policy => write!(f, "policy"),
            ErrorDomain::Queue => write!(f, "queue"),
            ErrorDomain::Sink => write!(f, "sink"),
            ErrorDomain::Types => write!(f, "types"),
            ErrorDomain::Probe => write!(f, "probe"),
            ErrorDomain::External => write!(f, "external"),
        }
    }
}

/// Error code structure for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ErrorCode(pub u32);

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

/// Standard error message format for serialization
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ErrorMessage {
    pub code: ErrorCode,
    pub domain: ErrorDomain,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorMessage {
    /// Capture any runtime error as a serializable message
    pub fn from_error(err: &dyn ContextLogError) -> Self {
        Self {
            code: err.code(),
            domain: err.domain(),
            message: err.to_string(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Standard Result type using BoxError
pub type Result<T> = std::result::Result<T, BoxError>;
/// Shorthand for a boxed ContextLogError
pub type BoxError = Box<dyn ContextLogError>;

/// Base trait for all errors raised by the runtime.
pub trait ContextLogError: StdError + fmt::Debug + fmt::Display + Send + Sync + Any + 'static {
    /// Numeric code, grouped by domain (1xxx config, 2xxx policy, ...).
    fn code(&self) -> ErrorCode;

    /// The subsystem that raised the error.
    fn domain(&self) -> ErrorDomain;

    /// Returns a unique static string code for this error type.
    fn error_code(&self) -> &'static str;

    /// Provides a brief description of the error (defaults to Display impl).
    fn description(&self) -> String {
        format!("{}", self)
    }

    /// Indicates if the error is temporary and retrying might succeed.
    fn is_transient(&self) -> bool {
        false
    }

    /// Returns this error as a `&dyn Any` to allow downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl dyn ContextLogError {
    /// Downcast a boxed error back to its concrete type.
    pub fn downcast_ref<T: ContextLogError>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}
