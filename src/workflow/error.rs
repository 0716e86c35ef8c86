// Error types for the workflow system

use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Errors surfaced by pipeline operations.
///
/// `Validation`, `Precondition` and `Busy` are rejected before any request is
/// issued and never mutate pipeline state. `Service` moves the pipeline to
/// `Phase::Failed` with the backend's message.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{0}")]
    Precondition(&'static str),

    #[error("A request is already in flight")]
    Busy,

    #[error("Service error: {0}")]
    Service(String),
}

impl WorkflowError {
    pub fn empty_input(what: &str) -> Self {
        WorkflowError::Validation(format!("{} must not be empty", what))
    }
}
