use crate::recorder::ExecutionRecorder;
use crate::registry::ExecutorRegistry;
use crate::store::{DefinitionsStore, ResultsStore};
use chrono::Utc;
use ragcore::{
    EngineError, Envelope, EventBus, ExecutionEvent, ExecutionId, ExecutionResult, NodeConfig,
    NodeContext, NodeError, NodeId, NodeType, RunStatus, ValidationError, Workflow, WorkflowId,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A run request as received from the invocation surface.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub workflow_id: WorkflowId,
    pub test_input: String,
    /// Halt after this node completes (partial run).
    pub stop_at_node: Option<NodeId>,
}

/// Engine tunables. Timeouts bound each node invocation; exceeding one is
/// an ordinary node failure.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Input, Router and Output nodes (pure/local work).
    pub local_timeout: Duration,
    pub retrieval_timeout: Duration,
    pub generation_timeout: Duration,
    pub event_buffer_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            local_timeout: Duration::from_secs(5),
            retrieval_timeout: Duration::from_secs(10),
            generation_timeout: Duration::from_secs(60),
            event_buffer_size: 1024,
        }
    }
}

impl EngineConfig {
    fn timeout_for(&self, node_type: NodeType) -> Duration {
        match node_type {
            NodeType::Retriever => self.retrieval_timeout,
            NodeType::Generator => self.generation_timeout,
            NodeType::Input | NodeType::Router | NodeType::Output => self.local_timeout,
        }
    }
}

/// One node of a loaded workflow, execution-ready: sorted into position and
/// with its configuration parsed once. A config parse failure is kept here
/// and surfaces as a node failure when the node is reached.
pub struct PlannedNode {
    pub id: NodeId,
    pub name: String,
    pub node_type: NodeType,
    pub position: i32,
    pub(crate) config: Result<NodeConfig, NodeError>,
}

fn plan_nodes(workflow: &Workflow) -> Vec<PlannedNode> {
    workflow
        .sorted_nodes()
        .into_iter()
        .map(|spec| PlannedNode {
            id: spec.id,
            name: spec.name.clone(),
            node_type: spec.node_type,
            position: spec.position,
            config: NodeConfig::parse(spec.node_type, &spec.config),
        })
        .collect()
}

/// Walks a workflow's nodes in position order, dispatching each to its
/// registered executor and threading the envelope forward.
///
/// Connections are never consulted; the router's decision is advisory and
/// execution order stays fixed.
pub struct ExecutionEngine {
    registry: Arc<ExecutorRegistry>,
    definitions: Arc<dyn DefinitionsStore>,
    recorder: ExecutionRecorder,
    event_bus: Arc<EventBus>,
    config: EngineConfig,
}

impl ExecutionEngine {
    pub fn new(
        registry: Arc<ExecutorRegistry>,
        definitions: Arc<dyn DefinitionsStore>,
        results: Arc<dyn ResultsStore>,
        config: EngineConfig,
    ) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        Self {
            registry,
            definitions,
            recorder: ExecutionRecorder::new(results),
            event_bus,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ExecutorRegistry> {
        &self.registry
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Execute a full or partial run.
    pub async fn run(&self, request: RunRequest) -> Result<ExecutionResult, EngineError> {
        self.run_cancellable(request, CancellationToken::new())
            .await
    }

    /// Execute a run that a caller may cancel. Cancellation is observed
    /// before each node starts and propagated into the in-flight node.
    pub async fn run_cancellable(
        &self,
        request: RunRequest,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult, EngineError> {
        let workflow = self
            .definitions
            .get_workflow(request.workflow_id)
            .await?
            .ok_or(ValidationError::WorkflowNotFound(request.workflow_id))?;

        if let Some(stop) = request.stop_at_node {
            if workflow.find_node(stop).is_none() {
                return Err(ValidationError::UnknownStopNode(stop).into());
            }
        }

        let execution_id = Uuid::new_v4();
        let plan = plan_nodes(&workflow);

        tracing::info!(
            workflow = %workflow.name,
            execution_id = %execution_id,
            nodes = plan.len(),
            stop_at = ?request.stop_at_node,
            "starting run"
        );
        self.event_bus.emit(ExecutionEvent::RunStarted {
            execution_id,
            workflow_id: workflow.id,
            timestamp: Utc::now(),
        });

        let mut envelope = Envelope::new();
        envelope.insert("message", request.test_input.clone());

        let mut flow = Vec::with_capacity(plan.len());
        let mut last_output: Option<Envelope> = None;
        let mut status = RunStatus::Success;
        let mut error_message = None;

        for (index, node) in plan.iter().enumerate() {
            if cancel.is_cancelled() {
                status = RunStatus::Error;
                error_message = Some(format!("run cancelled before node '{}'", node.name));
                break;
            }

            self.event_bus.emit(ExecutionEvent::NodeStarted {
                execution_id,
                node_id: node.id,
                node_type: node.node_type,
                timestamp: Utc::now(),
            });

            let (record, next) = self
                .recorder
                .observe(
                    node,
                    envelope.clone(),
                    self.invoke(node, execution_id, envelope.clone(), &cancel),
                )
                .await;

            match next {
                Some(next_envelope) => {
                    self.event_bus.emit(ExecutionEvent::NodeCompleted {
                        execution_id,
                        node_id: node.id,
                        output: next_envelope.clone(),
                        duration_ms: (record.processing_time_seconds * 1000.0) as u64,
                        timestamp: Utc::now(),
                    });

                    envelope = next_envelope;
                    last_output = Some(envelope.clone());
                    flow.push(record);

                    if request.stop_at_node == Some(node.id) {
                        if index + 1 < plan.len() {
                            status = RunStatus::Partial;
                        }
                        break;
                    }
                }
                None => {
                    let reason = record
                        .error
                        .clone()
                        .unwrap_or_else(|| "unknown failure".to_string());
                    self.event_bus.emit(ExecutionEvent::NodeFailed {
                        execution_id,
                        node_id: node.id,
                        error: reason.clone(),
                        timestamp: Utc::now(),
                    });
                    tracing::warn!(
                        node = %node.name,
                        error = %reason,
                        "node failed, halting run"
                    );

                    status = RunStatus::Error;
                    error_message = Some(format!("node '{}' failed: {reason}", node.name));
                    flow.push(record);
                    break;
                }
            }
        }

        let total_time_seconds: f64 = flow.iter().map(|n| n.processing_time_seconds).sum();
        let result = ExecutionResult {
            id: execution_id,
            workflow_id: workflow.id,
            test_input: request.test_input,
            status,
            node_executions: flow,
            final_output: last_output.unwrap_or_default(),
            total_time_seconds,
            error_message,
            created_at: Utc::now(),
        };

        self.event_bus.emit(ExecutionEvent::RunCompleted {
            execution_id,
            status,
            total_time_seconds,
            timestamp: Utc::now(),
        });
        self.recorder.persist(&result);

        Ok(result)
    }

    async fn invoke(
        &self,
        node: &PlannedNode,
        execution_id: ExecutionId,
        envelope: Envelope,
        cancel: &CancellationToken,
    ) -> Result<Envelope, NodeError> {
        let executor = self.registry.get(node.node_type).ok_or_else(|| {
            NodeError::Configuration(format!(
                "no executor registered for node type '{}'",
                node.node_type
            ))
        })?;
        let config = node.config.clone()?;

        let ctx = NodeContext {
            node_id: node.id,
            node_name: node.name.clone(),
            envelope,
            config,
            events: self.event_bus.create_emitter(execution_id, node.id),
            cancellation: cancel.child_token(),
        };

        let limit = self.config.timeout_for(node.node_type);
        tokio::select! {
            _ = cancel.cancelled() => Err(NodeError::Cancelled),
            outcome = timeout(limit, executor.execute(ctx)) => match outcome {
                Ok(result) => result,
                Err(_) => Err(NodeError::Timeout {
                    seconds: limit.as_secs(),
                }),
            },
        }
    }
}
