//! Disruption engine error types.

use thiserror::Error;

/// Errors that can occur while building candidates or computing commands.
#[derive(Debug, Error)]
pub enum DisruptionError {
    #[error("node is not disruptable: {0}")]
    NotDisruptable(String),

    #[error("candidate is already being disrupted: {0}")]
    AlreadyDisrupting(String),

    #[error("nodepool {0:?} not found")]
    GroupNotFound(String),

    #[error("pods are not disruptable: {0}")]
    PodsNotDisruptable(String),

    #[error("scheduling simulation failed: {0}")]
    SimulationFailed(#[source] anyhow::Error),

    #[error("state error: {0}")]
    State(#[from] nodeshift_state::StateError),

    #[error("evaluation cancelled")]
    Cancelled,
}

pub type DisruptionResult<T> = Result<T, DisruptionError>;
