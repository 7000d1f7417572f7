// Queue error types
// Enqueue rejection is a verdict, not an error; these cover misuse only

use std::any::Any;

use thiserror::Error;

use crate::{ContextLogError, ErrorCode, ErrorDomain};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The queue has been shut down
    #[error("Queue is shutting down")]
    ShuttingDown,

    /// Waiting for the queue to drain timed out
    #[error("Timed out waiting for {outstanding} outstanding message(s)")]
    DrainTimeout { outstanding: usize },
}

impl ContextLogError for QueueError {
    fn code(&self) -> ErrorCode {
        match self {
            QueueError::ShuttingDown => ErrorCode(3001),
            QueueError::DrainTimeout { .. } => ErrorCode(3002),
        }
    }

    fn domain(&self) -> ErrorDomain {
        ErrorDomain::Queue
    }

    fn error_code(&self) -> &'static str {
        match self {
            QueueError::ShuttingDown => "QUEUE_SHUTTING_DOWN",
            QueueError::DrainTimeout { .. } => "QUEUE_DRAIN_TIMEOUT",
        }
    }

    fn is_transient(&self) -> bool {
        matches!(self, QueueError::DrainTimeout { .. })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub type QueueResult<T> = Result<T, QueueError>;
