//! Error types for the strategy loop and its adapters

use thiserror::Error;
use uuid::Uuid;

/// Failures from the remote analysis service
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// Call failed, timed out, or the service reported an error
    #[error("analysis unavailable: {0}")]
    Unavailable(String),

    /// Payload could not be understood at all
    #[error("invalid analysis response: {0}")]
    InvalidResponse(String),
}

/// Failures from the remote execution service
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    /// The service (or local pre-trade checks) declined the order
    #[error("execution rejected: {0}")]
    Rejected(String),

    /// The service could not be reached or its answer was lost
    #[error("execution connectivity error: {0}")]
    Connectivity(String),
}

/// Errors returned by the controller's control surface
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("position {0} not found")]
    PositionNotFound(Uuid),
}
