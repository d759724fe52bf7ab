//! Core abstractions for the RAG workflow engine
//!
//! This crate provides the fundamental types and traits that all other
//! components depend on: workflow definitions, the data envelope threaded
//! between nodes, the executor contract, run result types, and the error
//! taxonomy.

mod envelope;
mod error;
pub mod events;
mod node;
mod result;
mod services;
mod value;
mod workflow;

pub use envelope::Envelope;
pub use error::{EngineError, NodeError, StoreError, ValidationError};
pub use node::{NodeContext, NodeExecutor};
pub use result::{ExecutionResult, NodeExecution, NodeStatus, RunStatus};
pub use services::{
    DocumentIndex, Generation, GenerationRequest, RetrievedDocument, TextGenerator,
};
pub use value::Value;
pub use workflow::{
    Connection, GeneratorConfig, InputConfig, NodeConfig, NodeId, NodeSpec, NodeType,
    OutputConfig, RetrieverConfig, RouterConfig, Workflow, WorkflowId,
};
pub use events::{EventBus, EventEmitter, ExecutionEvent, ExecutionId, NodeEvent};
