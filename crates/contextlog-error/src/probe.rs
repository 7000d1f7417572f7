// System-metric probe errors
// A failed probe never stops the manager; the last good sample is reused

use std::any::Any;

use thiserror::Error;

use crate::{ContextLogError, ErrorCode, ErrorDomain};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProbeError {
    #[error("Metric unavailable: {0}")]
    Unavailable(String),

    #[error("Metric out of range: {name} = {value}")]
    OutOfRange { name: &'static str, value: f64 },
}

impl ContextLogError for ProbeError {
    fn code(&self) -> ErrorCode {
        match self {
            ProbeError::Unavailable(_) => ErrorCode(6001),
            ProbeError::OutOfRange { .. } => ErrorCode(6002),
        }
    }

    fn domain(&self) -> ErrorDomain {
        ErrorDomain::Probe
    }

    fn error_code(&self) -> &'static str {
        match self {
            ProbeError::Unavailable(_) => "PROBE_UNAVAILABLE",
            ProbeError::OutOfRange { .. } => "PROBE_OUT_OF_RANGE",
        }
    }

    fn is_transient(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub type ProbeResult<T> = Result<T, ProbeError>;
