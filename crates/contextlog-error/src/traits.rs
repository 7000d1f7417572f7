// Error handling traits
// Core traits shared by the error domains

use crate::ContextLogError;

/// Trait for error types that support retries
pub trait Retryable: ContextLogError {
    /// Check if the error is retryable
    fn is_retryable(&self) -> bool;

    /// Get the recommended retry delay (if any)
    fn retry_after(&self) -> Option<std::time::Duration>;

    /// Create a non-retryable version of this error
    fn non_retryable(self) -> Self;
}
