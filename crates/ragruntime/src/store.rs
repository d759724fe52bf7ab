use async_trait::async_trait;
use ragcore::{ExecutionId, ExecutionResult, StoreError, Workflow, WorkflowId};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Read-only view of the workflow definitions store.
///
/// The engine only ever reads during a run; create/update/delete of
/// definitions lives elsewhere.
#[async_trait]
pub trait DefinitionsStore: Send + Sync {
    async fn get_workflow(&self, id: WorkflowId) -> Result<Option<Workflow>, StoreError>;
}

/// Append-only store of finished runs. Each result is independent and keyed
/// by its own id, so concurrent appends need no global coordination.
#[async_trait]
pub trait ResultsStore: Send + Sync {
    async fn save(&self, result: &ExecutionResult) -> Result<(), StoreError>;

    async fn get(&self, id: ExecutionId) -> Result<Option<ExecutionResult>, StoreError>;

    async fn list_for_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<ExecutionResult>, StoreError>;
}

/// In-memory definitions store for embedding, the CLI, and tests.
pub struct MemoryDefinitions {
    workflows: RwLock<HashMap<WorkflowId, Workflow>>,
}

impl MemoryDefinitions {
    pub fn new() -> Self {
        Self {
            workflows: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, workflow: Workflow) {
        self.workflows.write().await.insert(workflow.id, workflow);
    }

    pub async fn list(&self) -> Vec<Workflow> {
        self.workflows.read().await.values().cloned().collect()
    }
}

impl Default for MemoryDefinitions {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DefinitionsStore for MemoryDefinitions {
    async fn get_workflow(&self, id: WorkflowId) -> Result<Option<Workflow>, StoreError> {
        Ok(self.workflows.read().await.get(&id).cloned())
    }
}

/// In-memory results store for tests and ephemeral embedding.
pub struct MemoryResults {
    runs: RwLock<HashMap<ExecutionId, ExecutionResult>>,
}

impl MemoryResults {
    pub fn new() -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryResults {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultsStore for MemoryResults {
    async fn save(&self, result: &ExecutionResult) -> Result<(), StoreError> {
        self.runs.write().await.insert(result.id, result.clone());
        Ok(())
    }

    async fn get(&self, id: ExecutionId) -> Result<Option<ExecutionResult>, StoreError> {
        Ok(self.runs.read().await.get(&id).cloned())
    }

    async fn list_for_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<ExecutionResult>, StoreError> {
        let mut runs: Vec<ExecutionResult> = self
            .runs
            .read()
            .await
            .values()
            .filter(|r| r.workflow_id == workflow_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs)
    }
}
