use async_trait::async_trait;
use ragcore::{
    DocumentIndex, Envelope, NodeContext, NodeError, NodeExecutor, RetrievedDocument, Value,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Queries the external document index for candidates matching the current
/// message. Adds `retrievedDocuments`, `retrievalSource` and `numResults`.
pub struct RetrieverExecutor {
    index: Arc<dyn DocumentIndex>,
}

impl RetrieverExecutor {
    pub fn new(index: Arc<dyn DocumentIndex>) -> Self {
        Self { index }
    }
}

pub(crate) fn document_value(doc: &RetrievedDocument) -> Value {
    Value::Object(HashMap::from([
        ("id".to_string(), Value::from(doc.id.clone())),
        ("title".to_string(), Value::from(doc.title.clone())),
        ("content".to_string(), Value::from(doc.content.clone())),
        ("relevance".to_string(), Value::from(doc.relevance)),
    ]))
}

#[async_trait]
impl NodeExecutor for RetrieverExecutor {
    fn node_type(&self) -> &str {
        "retriever"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Envelope, NodeError> {
        let cfg = ctx.config.as_retriever()?;
        let message = ctx.require_message()?;

        ctx.events.info(format!(
            "searching index for up to {} documents",
            cfg.max_results
        ));

        let documents = tokio::select! {
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
            found = self.index.search(message, cfg.max_results, cfg.source.as_deref()) => found?,
        };

        ctx.events
            .info(format!("retrieved {} documents", documents.len()));

        let mut next = ctx.envelope.clone();
        next.insert(
            "retrievedDocuments",
            Value::Array(documents.iter().map(document_value).collect()),
        );
        next.insert(
            "retrievalSource",
            cfg.source.clone().unwrap_or_else(|| "all".to_string()),
        );
        next.insert("numResults", documents.len());
        Ok(next)
    }
}
