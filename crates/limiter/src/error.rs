use thiserror::Error;

/// Errors surfaced by the limiter primitives themselves.
///
/// Task failures are never wrapped in this type; [`run_limited`](crate::run_limited)
/// returns the task's own error unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LimiterError {
    /// The semaphore was closed while waiting or before acquiring.
    #[error("semaphore closed")]
    Closed,
    /// `try_acquire` found no permit available.
    #[error("no permits available")]
    NoPermits,
    /// Configuration is inconsistent.
    #[error("invalid limiter config: {0}")]
    InvalidConfig(String),
}
