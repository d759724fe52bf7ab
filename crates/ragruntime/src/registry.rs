use ragcore::{NodeExecutor, NodeType};
use std::collections::HashMap;
use std::sync::Arc;

/// Fixed mapping from node-type tag to the executor instance handling it.
///
/// Populated once at process start; the engine loop only reads it. New node
/// types register here without the engine loop changing.
pub struct ExecutorRegistry {
    executors: HashMap<NodeType, Arc<dyn NodeExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    pub fn register(&mut self, node_type: NodeType, executor: Arc<dyn NodeExecutor>) {
        tracing::info!(node_type = %node_type, "registering node executor");
        self.executors.insert(node_type, executor);
    }

    pub fn get(&self, node_type: NodeType) -> Option<Arc<dyn NodeExecutor>> {
        self.executors.get(&node_type).cloned()
    }

    pub fn registered_types(&self) -> Vec<NodeType> {
        let mut types: Vec<NodeType> = self.executors.keys().copied().collect();
        types.sort_by_key(|t| t.as_str());
        types
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
