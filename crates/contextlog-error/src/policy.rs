// Policy error types
// Returned by set_policy and friends; the active policy is left unchanged

use std::any::Any;

use thiserror::Error;

use crate::{ContextLogError, ErrorCode, ErrorDomain};

/// Policy error codes
pub mod codes {
    use crate::ErrorCode;

    // Policy error codes start with 2000
    pub const INVALID: ErrorCode = ErrorCode(2001);
    pub const ROLLBACK_OUT_OF_RANGE: ErrorCode = ErrorCode(2002);
    pub const TRIGGER_NOT_FOUND: ErrorCode = ErrorCode(2003);
    pub const TRIGGER_INVALID: ErrorCode = ErrorCode(2004);
    pub const SERIALIZATION: ErrorCode = ErrorCode(2005);
}

/// Policy-specific error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    /// The policy has contradictory or out-of-range fields
    #[error("Invalid policy: {}", .0.join("; "))]
    Invalid(Vec<String>),

    /// Rollback asked for more steps than the history holds
    #[error("Cannot roll back {requested} step(s); {available} available")]
    RollbackOutOfRange { requested: usize, available: usize },

    /// No trigger with the given id is registered
    #[error("Adaptive trigger not found: {0}")]
    TriggerNotFound(u32),

    /// The trigger definition is malformed
    #[error("Invalid adaptive trigger {id}: {reason}")]
    TriggerInvalid { id: u32, reason: String },

    /// Policy import/export failed
    #[error("Policy serialization failed: {0}")]
    Serialization(String),
}

impl PolicyError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        PolicyError::Invalid(vec![reason.into()])
    }
}

impl ContextLogError for PolicyError {
    fn code(&self) -> ErrorCode {
        use codes::*;
        match self {
            PolicyError::Invalid(_) => INVALID,
            PolicyError::RollbackOutOfRange { .. } => ROLLBACK_OUT_OF_RANGE,
            PolicyError::TriggerNotFound(_) => TRIGGER_NOT_FOUND,
            PolicyError::TriggerInvalid { .. } => TRIGGER_INVALID,
            PolicyError::Serialization(_) => SERIALIZATION,
        }
    }

    fn domain(&self) -> ErrorDomain {
        ErrorDomain::Policy
    }

    fn error_code(&self) -> &'static str {
        match self {
            PolicyError::Invalid(_) => "POLICY_INVALID",
            PolicyError::RollbackOutOfRange { .. } => "POLICY_ROLLBACK_OUT_OF_RANGE",
            PolicyError::TriggerNotFound(_) => "POLICY_TRIGGER_NOT_FOUND",
            PolicyError::TriggerInvalid { .. } => "POLICY_TRIGGER_INVALID",
            PolicyError::Serialization(_) => "POLICY_SERIALIZATION",
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl From<serde_json::Error> for PolicyError {
    fn from(err: serde_json::Error) -> Self {
        PolicyError::Serialization(err.to_string())
    }
}

/// Convenient Result type for policy operations
pub type PolicyResult<T> = Result<T, PolicyError>;
