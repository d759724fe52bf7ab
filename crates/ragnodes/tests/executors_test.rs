use async_trait::async_trait;
use ragcore::{
    DocumentIndex, Envelope, EventBus, Generation, GenerationRequest, NodeConfig, NodeContext,
    NodeError, NodeExecutor, NodeType, RetrievedDocument, TextGenerator, Value,
};
use ragnodes::{GeneratorExecutor, InputExecutor, OutputExecutor, RetrieverExecutor, RouterExecutor};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

fn doc(id: &str, relevance: f64) -> RetrievedDocument {
    RetrievedDocument {
        id: id.to_string(),
        title: format!("Title {id}"),
        content: format!("Content {id}"),
        relevance,
    }
}

/// Index that serves a fixed corpus.
struct StaticIndex {
    docs: Vec<RetrievedDocument>,
}

#[async_trait]
impl DocumentIndex for StaticIndex {
    async fn search(
        &self,
        _query: &str,
        max_results: usize,
        _source: Option<&str>,
    ) -> Result<Vec<RetrievedDocument>, NodeError> {
        Ok(self.docs.iter().take(max_results).cloned().collect())
    }
}

struct UnreachableIndex;

#[async_trait]
impl DocumentIndex for UnreachableIndex {
    async fn search(
        &self,
        _query: &str,
        _max_results: usize,
        _source: Option<&str>,
    ) -> Result<Vec<RetrievedDocument>, NodeError> {
        Err(NodeError::Upstream(
            "document index unreachable: connection refused".to_string(),
        ))
    }
}

/// Provider that echoes how it was called.
struct EchoGenerator;

#[async_trait]
impl TextGenerator for EchoGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, NodeError> {
        Ok(Generation {
            text: format!(
                "[{}@{}] answer from {} documents",
                request.model,
                request.temperature,
                request.context.len()
            ),
            tokens_used: 42,
        })
    }
}

/// Provider that fails once with a transient error, then succeeds.
struct FlakyGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl TextGenerator for FlakyGenerator {
    async fn generate(&self, _request: GenerationRequest) -> Result<Generation, NodeError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(NodeError::Upstream(
                "generation provider returned status 503".to_string(),
            ));
        }
        Ok(Generation {
            text: "second attempt".to_string(),
            tokens_used: 7,
        })
    }
}

fn context(node_type: NodeType, raw: HashMap<String, Value>, envelope: Envelope) -> NodeContext {
    let bus = EventBus::new(64);
    let node_id = Uuid::new_v4();
    NodeContext {
        node_id,
        node_name: node_type.as_str().to_string(),
        envelope,
        config: NodeConfig::parse(node_type, &raw).unwrap(),
        events: bus.create_emitter(Uuid::new_v4(), node_id),
        cancellation: tokio_util::sync::CancellationToken::new(),
    }
}

fn message_envelope(message: &str) -> Envelope {
    let mut envelope = Envelope::new();
    envelope.insert("message", message);
    envelope
}

#[tokio::test]
async fn input_stamps_timestamp_and_length() {
    let ctx = context(
        NodeType::Input,
        HashMap::new(),
        message_envelope("Apa itu RAG?"),
    );
    let output = InputExecutor.execute(ctx).await.unwrap();

    assert_eq!(output.get_str("message"), Some("Apa itu RAG?"));
    assert!(output.contains_key("timestamp"));
    assert_eq!(output.get("length").and_then(Value::as_u64), Some(12));
}

#[tokio::test]
async fn input_truncates_long_messages() {
    let raw = HashMap::from([("maxLength".to_string(), Value::from(5i64))]);
    let ctx = context(NodeType::Input, raw, message_envelope("Apa itu RAG?"));
    let output = InputExecutor.execute(ctx).await.unwrap();

    assert_eq!(output.get_str("message"), Some("Apa i"));
    assert_eq!(output.get("length").and_then(Value::as_u64), Some(5));
}

#[tokio::test]
async fn input_requires_a_message_field() {
    let ctx = context(NodeType::Input, HashMap::new(), Envelope::new());
    let err = InputExecutor.execute(ctx).await.unwrap_err();
    assert!(matches!(err, NodeError::MissingField(_)));
}

#[tokio::test]
async fn router_adds_route_fields_without_touching_message() {
    let ctx = context(
        NodeType::Router,
        HashMap::new(),
        message_envelope("Apa itu RAG?"),
    );
    let output = RouterExecutor.execute(ctx).await.unwrap();

    assert_eq!(output.get_str("message"), Some("Apa itu RAG?"));
    assert_eq!(output.get_str("intent"), Some("question"));
    assert_eq!(output.get_str("route"), Some("retrieval"));
    assert!(output.get("confidence").and_then(Value::as_f64).is_some());
    assert!(output.get_str("reasoning").is_some());
}

#[tokio::test]
async fn retriever_attaches_documents_and_counts() {
    let index = Arc::new(StaticIndex {
        docs: vec![doc("d1", 0.9), doc("d2", 0.8), doc("d3", 0.7)],
    });
    let raw = HashMap::from([("maxResults".to_string(), Value::from(2i64))]);
    let ctx = context(NodeType::Retriever, raw, message_envelope("indexing"));

    let output = RetrieverExecutor::new(index).execute(ctx).await.unwrap();

    assert_eq!(output.get("numResults").and_then(Value::as_u64), Some(2));
    assert_eq!(output.get_str("retrievalSource"), Some("all"));
    let docs = output.get("retrievedDocuments").and_then(Value::as_array).unwrap();
    assert_eq!(docs.len(), 2);
    let first = docs[0].as_object().unwrap();
    assert_eq!(first.get("id").and_then(Value::as_str), Some("d1"));
    assert_eq!(first.get("relevance").and_then(Value::as_f64), Some(0.9));
}

#[tokio::test]
async fn retriever_reports_configured_source() {
    let index = Arc::new(StaticIndex { docs: vec![] });
    let raw = HashMap::from([("source".to_string(), Value::from("handbook"))]);
    let ctx = context(NodeType::Retriever, raw, message_envelope("anything"));

    let output = RetrieverExecutor::new(index).execute(ctx).await.unwrap();
    assert_eq!(output.get_str("retrievalSource"), Some("handbook"));
    assert_eq!(output.get("numResults").and_then(Value::as_u64), Some(0));
}

#[tokio::test]
async fn retriever_surfaces_unreachable_index() {
    let ctx = context(
        NodeType::Retriever,
        HashMap::new(),
        message_envelope("anything"),
    );
    let err = RetrieverExecutor::new(Arc::new(UnreachableIndex))
        .execute(ctx)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unreachable"));
}

#[tokio::test]
async fn generator_builds_on_retrieved_context() {
    let index = Arc::new(StaticIndex {
        docs: vec![doc("d1", 0.9), doc("d2", 0.8)],
    });
    let retrieved = RetrieverExecutor::new(index)
        .execute(context(
            NodeType::Retriever,
            HashMap::new(),
            message_envelope("Apa itu RAG?"),
        ))
        .await
        .unwrap();

    let raw = HashMap::from([
        ("model".to_string(), Value::from("tiny-1")),
        ("temperature".to_string(), Value::from(0.2)),
    ]);
    let ctx = context(NodeType::Generator, raw, retrieved);
    let output = GeneratorExecutor::new(Arc::new(EchoGenerator))
        .execute(ctx)
        .await
        .unwrap();

    assert_eq!(
        output.get_str("response"),
        Some("[tiny-1@0.2] answer from 2 documents")
    );
    assert_eq!(output.get_str("model"), Some("tiny-1"));
    let sources = output.get("sources").and_then(Value::as_array).unwrap();
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0].as_str(), Some("d1"));
    assert_eq!(output.get("tokensUsed").and_then(Value::as_u64), Some(42));
}

#[tokio::test]
async fn generator_works_without_retrieved_documents() {
    let ctx = context(
        NodeType::Generator,
        HashMap::new(),
        message_envelope("hello"),
    );
    let output = GeneratorExecutor::new(Arc::new(EchoGenerator))
        .execute(ctx)
        .await
        .unwrap();

    assert_eq!(
        output.get_str("response"),
        Some("[default@0.7] answer from 0 documents")
    );
    assert_eq!(
        output.get("sources").and_then(Value::as_array).map(|s| s.len()),
        Some(0)
    );
}

#[tokio::test]
async fn generator_retries_once_on_transient_failure() {
    let provider = Arc::new(FlakyGenerator {
        calls: AtomicUsize::new(0),
    });
    let ctx = context(
        NodeType::Generator,
        HashMap::new(),
        message_envelope("hello"),
    );
    let output = GeneratorExecutor::new(provider.clone())
        .execute(ctx)
        .await
        .unwrap();

    assert_eq!(output.get_str("response"), Some("second attempt"));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn generator_rejects_malformed_document_shape() {
    let mut envelope = message_envelope("hello");
    envelope.insert("retrievedDocuments", "not an array");
    let ctx = context(NodeType::Generator, HashMap::new(), envelope);

    let err = GeneratorExecutor::new(Arc::new(EchoGenerator))
        .execute(ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::InvalidFieldType { .. }));
}

#[tokio::test]
async fn output_formats_the_final_payload() {
    let mut envelope = message_envelope("Apa itu RAG?");
    envelope.insert("intent", "question");
    envelope.insert("response", "RAG is retrieval-augmented generation.");
    envelope.insert("model", "tiny-1");
    envelope.insert(
        "sources",
        Value::Array(vec![Value::from("d1"), Value::from("d2")]),
    );

    let raw = HashMap::from([("format".to_string(), Value::from("markdown"))]);
    let ctx = context(NodeType::Output, raw, envelope);
    let output = OutputExecutor.execute(ctx).await.unwrap();

    assert_eq!(
        output.get_str("finalResponse"),
        Some("RAG is retrieval-augmented generation.")
    );
    assert_eq!(output.get_str("format"), Some("markdown"));
    let metadata = output.get("metadata").and_then(Value::as_object).unwrap();
    assert_eq!(metadata.get("intent").and_then(Value::as_str), Some("question"));
    assert_eq!(metadata.get("model").and_then(Value::as_str), Some("tiny-1"));
}

#[tokio::test]
async fn output_falls_back_to_the_message() {
    let ctx = context(
        NodeType::Output,
        HashMap::new(),
        message_envelope("just chatting"),
    );
    let output = OutputExecutor.execute(ctx).await.unwrap();

    assert_eq!(output.get_str("finalResponse"), Some("just chatting"));
    assert_eq!(output.get_str("format"), Some("text"));
    assert_eq!(
        output.get("sources").and_then(Value::as_array).map(|s| s.len()),
        Some(0)
    );
}
