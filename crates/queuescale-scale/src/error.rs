//! Scale actuator error types.

use thiserror::Error;

/// Result type alias for actuator operations.
pub type ScaleResult<T> = Result<T, ScaleError>;

/// Errors that can occur while reading or writing the replica count.
#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("invalid scaler config: {0}")]
    InvalidConfig(String),

    #[error("failed to load cluster credentials: {0}")]
    Credentials(String),

    #[error("orchestrator request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("scale response for {0} has no spec.replicas")]
    MissingReplicas(String),
}
