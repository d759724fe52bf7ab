use crate::engine::PlannedNode;
use crate::store::ResultsStore;
use ragcore::{Envelope, ExecutionResult, NodeError, NodeExecution, NodeStatus};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// Wraps each executor invocation with timing and status capture, and
/// persists the finished run.
pub struct ExecutionRecorder {
    results: Arc<dyn ResultsStore>,
}

impl ExecutionRecorder {
    pub fn new(results: Arc<dyn ResultsStore>) -> Self {
        Self { results }
    }

    /// Drive one node invocation and build its trace record. Returns the
    /// record plus the next envelope when the node succeeded.
    pub async fn observe<F>(
        &self,
        node: &PlannedNode,
        input: Envelope,
        invocation: F,
    ) -> (NodeExecution, Option<Envelope>)
    where
        F: Future<Output = Result<Envelope, NodeError>>,
    {
        let started = Instant::now();
        let outcome = invocation.await;
        let elapsed = started.elapsed().as_secs_f64();

        match outcome {
            Ok(output) => (
                NodeExecution {
                    node_id: node.id,
                    node_name: node.name.clone(),
                    node_type: node.node_type,
                    input,
                    output: output.clone(),
                    processing_time_seconds: elapsed,
                    status: NodeStatus::Success,
                    error: None,
                },
                Some(output),
            ),
            Err(e) => (
                NodeExecution {
                    node_id: node.id,
                    node_name: node.name.clone(),
                    node_type: node.node_type,
                    input,
                    output: Envelope::new(),
                    processing_time_seconds: elapsed,
                    status: NodeStatus::Error,
                    error: Some(e.to_string()),
                },
                None,
            ),
        }
    }

    /// Persist a finished run. Fire-and-forget: a store failure is logged
    /// and never changes the caller-visible result.
    pub fn persist(&self, result: &ExecutionResult) {
        let store = Arc::clone(&self.results);
        let result = result.clone();
        tokio::spawn(async move {
            if let Err(e) = store.save(&result).await {
                tracing::error!(
                    execution_id = %result.id,
                    error = %e,
                    "failed to persist execution result"
                );
            }
        });
    }
}
