use async_trait::async_trait;
use chrono::Utc;
use ragcore::{Envelope, NodeContext, NodeError, NodeExecutor};

/// Validates and truncates the raw message against the configured maximum
/// length. Adds `timestamp` and `length` alongside the (possibly truncated)
/// `message`.
pub struct InputExecutor;

#[async_trait]
impl NodeExecutor for InputExecutor {
    fn node_type(&self) -> &str {
        "input"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Envelope, NodeError> {
        let cfg = ctx.config.as_input()?;
        let message = ctx.require_message()?;

        let total_chars = message.chars().count();
        let accepted: String = message.chars().take(cfg.max_length).collect();
        if total_chars > cfg.max_length {
            ctx.events.warn(format!(
                "message truncated from {total_chars} to {} characters",
                cfg.max_length
            ));
        }
        let length = accepted.chars().count();

        let mut next = ctx.envelope.clone();
        next.insert("message", accepted);
        next.insert("timestamp", Utc::now().to_rfc3339());
        next.insert("length", length);
        Ok(next)
    }
}
