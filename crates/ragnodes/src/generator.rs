use async_trait::async_trait;
use ragcore::{
    Envelope, GenerationRequest, NodeContext, NodeError, NodeExecutor, RetrievedDocument,
    TextGenerator, Value,
};
use std::sync::Arc;

/// Calls the external text-generation provider with the current message and
/// any retrieved context. Adds `response`, `model`, `temperature`,
/// `sources` and `tokensUsed`.
///
/// Performs a single retry on a transient provider error; the engine's
/// per-node timeout still bounds the whole invocation.
pub struct GeneratorExecutor {
    provider: Arc<dyn TextGenerator>,
}

impl GeneratorExecutor {
    pub fn new(provider: Arc<dyn TextGenerator>) -> Self {
        Self { provider }
    }
}

fn is_transient(error: &NodeError) -> bool {
    match error {
        NodeError::Upstream(msg) => {
            msg.contains("429")
                || msg.contains("500")
                || msg.contains("502")
                || msg.contains("503")
                || msg.contains("timeout")
                || msg.contains("connection")
        }
        _ => false,
    }
}

fn context_documents(envelope: &Envelope) -> Result<Vec<RetrievedDocument>, NodeError> {
    let Some(value) = envelope.get("retrievedDocuments") else {
        return Ok(Vec::new());
    };
    let items = value.as_array().ok_or_else(|| NodeError::InvalidFieldType {
        field: "retrievedDocuments".to_string(),
        expected: "array".to_string(),
    })?;

    let mut documents = Vec::with_capacity(items.len());
    for item in items {
        let fields = item.as_object().ok_or_else(|| NodeError::InvalidFieldType {
            field: "retrievedDocuments".to_string(),
            expected: "array of objects".to_string(),
        })?;
        documents.push(RetrievedDocument {
            id: fields
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            title: fields
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            content: fields
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            relevance: fields
                .get("relevance")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
        });
    }
    Ok(documents)
}

fn build_prompt(message: &str, documents: &[RetrievedDocument]) -> String {
    if documents.is_empty() {
        return message.to_string();
    }
    let mut prompt = String::from("Answer using the context below.\n\nContext:\n");
    for doc in documents {
        prompt.push_str(&format!("[{}] {}\n{}\n\n", doc.id, doc.title, doc.content));
    }
    prompt.push_str(&format!("Question: {message}"));
    prompt
}

#[async_trait]
impl NodeExecutor for GeneratorExecutor {
    fn node_type(&self) -> &str {
        "generator"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Envelope, NodeError> {
        let cfg = ctx.config.as_generator()?;
        let message = ctx.require_message()?;
        let documents = context_documents(&ctx.envelope)?;

        let request = GenerationRequest {
            prompt: build_prompt(message, &documents),
            context: documents.clone(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
        };

        ctx.events.info(format!(
            "generating with model '{}' and {} context documents",
            cfg.model,
            documents.len()
        ));

        let generate = async {
            match self.provider.generate(request.clone()).await {
                Ok(generation) => Ok(generation),
                Err(e) if is_transient(&e) => {
                    ctx.events
                        .warn(format!("transient provider error, retrying once: {e}"));
                    self.provider.generate(request.clone()).await
                }
                Err(e) => Err(e),
            }
        };
        let generation = tokio::select! {
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
            outcome = generate => outcome?,
        };

        let sources: Vec<Value> = documents
            .iter()
            .map(|doc| Value::from(doc.id.clone()))
            .collect();

        let mut next = ctx.envelope.clone();
        next.insert("response", generation.text);
        next.insert("model", cfg.model.clone());
        next.insert("temperature", cfg.temperature);
        next.insert("sources", Value::Array(sources));
        next.insert("tokensUsed", generation.tokens_used as i64);
        Ok(next)
    }
}
