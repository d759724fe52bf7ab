use crate::{NodeId, WorkflowId};
use thiserror::Error;

/// Request-level failures surfaced before any node executes.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),

    #[error("stop node {0} does not exist in this workflow")]
    UnknownStopNode(NodeId),

    #[error("invalid workflow: {0}")]
    InvalidWorkflow(String),
}

/// A node executor could not complete. Halts the run at that node;
/// prior records are preserved.
#[derive(Error, Debug, Clone)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid type for field '{field}': expected {expected}")]
    InvalidFieldType { field: String, expected: String },

    #[error("{0}")]
    Upstream(String),

    #[error("timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("cancelled")]
    Cancelled,
}

/// Faults from the definitions or results store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level engine error returned to callers. Node failures never appear
/// here; they are folded into the run's execution flow instead.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
