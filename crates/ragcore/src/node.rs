use crate::{Envelope, EventEmitter, NodeConfig, NodeError, NodeId};
use async_trait::async_trait;

/// Contract every node executor implements.
///
/// An executor receives the accumulated envelope from all prior nodes plus
/// its own parsed configuration, and returns a new envelope (conventionally
/// a superset of the one it received). Executors never mutate the envelope
/// the engine holds; the context carries an owned snapshot.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Type tag this executor handles (e.g. "retriever").
    fn node_type(&self) -> &str;

    async fn execute(&self, ctx: NodeContext) -> Result<Envelope, NodeError>;
}

/// Execution context passed to each node.
pub struct NodeContext {
    pub node_id: NodeId,
    pub node_name: String,

    /// Snapshot of the envelope produced by the previous node.
    pub envelope: Envelope,

    /// Typed configuration, parsed once at workflow load.
    pub config: NodeConfig,

    /// Emitter for real-time progress events.
    pub events: EventEmitter,

    /// Cancellation signal for the run; long outbound calls should
    /// observe it and return early.
    pub cancellation: tokio_util::sync::CancellationToken,
}

impl NodeContext {
    /// The current message, required by every built-in executor.
    pub fn require_message(&self) -> Result<&str, NodeError> {
        self.envelope
            .get("message")
            .ok_or_else(|| NodeError::MissingField("message".to_string()))?
            .as_str()
            .ok_or_else(|| NodeError::InvalidFieldType {
                field: "message".to_string(),
                expected: "string".to_string(),
            })
    }
}
