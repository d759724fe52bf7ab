use async_trait::async_trait;
use ragcore::{Envelope, NodeContext, NodeError, NodeExecutor, Value};
use std::collections::HashMap;

/// Formats the final payload: `finalResponse`, `format`, `sources` and a
/// `metadata` object. Pure transform; does not fail under normal conditions.
pub struct OutputExecutor;

#[async_trait]
impl NodeExecutor for OutputExecutor {
    fn node_type(&self) -> &str {
        "output"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Envelope, NodeError> {
        let cfg = ctx.config.as_output()?;

        // Falls back to the raw message when no generator ran upstream
        let final_response = ctx
            .envelope
            .get_str("response")
            .or_else(|| ctx.envelope.get_str("message"))
            .unwrap_or_default()
            .to_string();
        let sources = ctx
            .envelope
            .get("sources")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));

        let mut metadata = HashMap::new();
        if let Some(intent) = ctx.envelope.get("intent") {
            metadata.insert("intent".to_string(), intent.clone());
        }
        if let Some(model) = ctx.envelope.get("model") {
            metadata.insert("model".to_string(), model.clone());
        }

        let mut next = ctx.envelope.clone();
        next.insert("finalResponse", final_response);
        next.insert("format", cfg.format.clone());
        next.insert("sources", sources);
        next.insert("metadata", Value::Object(metadata));
        Ok(next)
    }
}
