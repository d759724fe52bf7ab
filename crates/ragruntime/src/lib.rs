//! Workflow execution runtime
//!
//! This crate provides the engine that runs workflows node by node, the
//! executor registry it dispatches through, the recorder that captures and
//! persists per-node trace records, and the definitions/results stores.

mod engine;
mod recorder;
mod registry;
mod sqlite;
mod store;

pub use engine::{EngineConfig, ExecutionEngine, PlannedNode, RunRequest};
pub use recorder::ExecutionRecorder;
pub use registry::ExecutorRegistry;
pub use sqlite::SqliteResults;
pub use store::{DefinitionsStore, MemoryDefinitions, MemoryResults, ResultsStore};
