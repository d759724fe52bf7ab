//! Built-in node executors
//!
//! The five executors of the RAG pipeline plus the HTTP clients for the
//! outbound services the Retriever and Generator depend on.

mod generator;
mod http;
mod input;
mod output;
mod retriever;
mod router;

pub use generator::GeneratorExecutor;
pub use http::{HttpDocumentIndex, HttpTextGenerator};
pub use input::InputExecutor;
pub use output::OutputExecutor;
pub use retriever::RetrieverExecutor;
pub use router::RouterExecutor;

use ragcore::{DocumentIndex, NodeType, TextGenerator};
use ragruntime::ExecutorRegistry;
use std::sync::Arc;

/// Register the five built-in executors with a registry.
pub fn register_builtin(
    registry: &mut ExecutorRegistry,
    index: Arc<dyn DocumentIndex>,
    generator: Arc<dyn TextGenerator>,
) {
    registry.register(NodeType::Input, Arc::new(InputExecutor));
    registry.register(NodeType::Router, Arc::new(RouterExecutor));
    registry.register(NodeType::Retriever, Arc::new(RetrieverExecutor::new(index)));
    registry.register(NodeType::Generator, Arc::new(GeneratorExecutor::new(generator)));
    registry.register(NodeType::Output, Arc::new(OutputExecutor));
}
