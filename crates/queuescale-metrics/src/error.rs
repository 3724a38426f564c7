//! Metric source error types.

use thiserror::Error;

/// Result type alias for backlog sampling operations.
pub type MetricResult<T> = Result<T, MetricError>;

/// Errors that can occur while sampling the queue backlog.
///
/// All variants are transient by policy: the control loop logs them and
/// retries at its next tick.
#[derive(Debug, Error)]
pub enum MetricError {
    #[error("invalid stats url: {0}")]
    InvalidUrl(String),

    #[error("stats request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("stats response is not a JSON object")]
    NotAnObject,

    #[error("counter missing from stats response: {0}")]
    MissingCounter(String),

    #[error("counter is not a non-negative integer: {0}")]
    NonIntegerCounter(String),
}
