//! End-to-end runs of the canonical five-node RAG pipeline with the real
//! executors and mocked outbound services.

use async_trait::async_trait;
use ragcore::{
    EngineError, Generation, GenerationRequest, DocumentIndex, NodeError, NodeSpec, NodeStatus,
    NodeType, RetrievedDocument, RunStatus, TextGenerator, ValidationError, Workflow,
};
use ragnodes::register_builtin;
use ragruntime::{
    EngineConfig, ExecutionEngine, ExecutorRegistry, MemoryDefinitions, MemoryResults, RunRequest,
};
use std::sync::Arc;
use uuid::Uuid;

struct StaticIndex;

#[async_trait]
impl DocumentIndex for StaticIndex {
    async fn search(
        &self,
        _query: &str,
        max_results: usize,
        _source: Option<&str>,
    ) -> Result<Vec<RetrievedDocument>, NodeError> {
        let corpus = vec![
            RetrievedDocument {
                id: "d1".to_string(),
                title: "RAG basics".to_string(),
                content: "Retrieval-augmented generation combines search and generation."
                    .to_string(),
                relevance: 0.92,
            },
            RetrievedDocument {
                id: "d2".to_string(),
                title: "Indexing".to_string(),
                content: "Documents are chunked and indexed for retrieval.".to_string(),
                relevance: 0.81,
            },
        ];
        Ok(corpus.into_iter().take(max_results).collect())
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

struct CannedGenerator;

#[async_trait]
impl TextGenerator for CannedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, NodeError> {
        Ok(Generation {
            text: format!("Answer grounded in {} documents.", request.context.len()),
            tokens_used: 21,
        })
    }
}

fn rag_workflow() -> Workflow {
    let mut workflow = Workflow::new("RAG Chatbot", "rag");
    workflow.add_node(NodeSpec::new(NodeType::Input, 0).with_name("Intake"));
    workflow.add_node(NodeSpec::new(NodeType::Router, 1).with_name("Intent Router"));
    workflow.add_node(
        NodeSpec::new(NodeType::Retriever, 2)
            .with_name("Docs Retriever")
            .with_config("maxResults", 2i64),
    );
    workflow.add_node(NodeSpec::new(NodeType::Generator, 3).with_name("Answer Generator"));
    workflow.add_node(NodeSpec::new(NodeType::Output, 4).with_name("Formatter"));
    workflow
}

async fn engine_for(workflow: Workflow, index: Arc<dyn DocumentIndex>) -> ExecutionEngine {
    let mut registry = ExecutorRegistry::new();
    register_builtin(&mut registry, index, Arc::new(CannedGenerator));
    let definitions = Arc::new(MemoryDefinitions::new());
    definitions.insert(workflow).await;
    ExecutionEngine::new(
        Arc::new(registry),
        definitions,
        Arc::new(MemoryResults::new()),
        EngineConfig::default(),
    )
}

fn node_id(workflow: &Workflow, node_type: NodeType) -> Uuid {
    workflow
        .nodes
        .iter()
        .find(|n| n.node_type == node_type)
        .unwrap()
        .id
}

#[tokio::test]
async fn stopping_at_the_router_yields_a_two_node_partial_run() {
    let workflow = rag_workflow();
    let engine = engine_for(workflow.clone(), Arc::new(StaticIndex)).await;

    let result = engine
        .run(RunRequest {
            workflow_id: workflow.id,
            test_input: "Apa itu RAG?".to_string(),
            stop_at_node: Some(node_id(&workflow, NodeType::Router)),
        })
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Partial);
    assert_eq!(result.node_executions.len(), 2);
    let router = &result.node_executions[1];
    assert_eq!(router.node_type, NodeType::Router);
    assert!(router.output.contains_key("route"));
    assert_eq!(result.final_output.get_str("route"), Some("retrieval"));
}

#[tokio::test]
async fn a_full_run_produces_a_final_response() {
    let workflow = rag_workflow();
    let engine = engine_for(workflow.clone(), Arc::new(StaticIndex)).await;

    let result = engine
        .run(RunRequest {
            workflow_id: workflow.id,
            test_input: "Apa itu RAG?".to_string(),
            stop_at_node: None,
        })
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.node_executions.len(), 5);
    assert_eq!(
        result.final_output.get_str("finalResponse"),
        Some("Answer grounded in 2 documents.")
    );
    assert_eq!(
        result.final_output.get("numResults").and_then(|v| v.as_u64()),
        Some(2)
    );
    // Per-node trace threads the envelope forward
    assert_eq!(
        result.node_executions[3].input.get_str("route"),
        Some("retrieval")
    );
}

#[tokio::test]
async fn an_unreachable_index_halts_the_run_at_the_retriever() {
    let workflow = rag_workflow();
    let engine = engine_for(workflow.clone(), Arc::new(UnreachableIndex)).await;

    let result = engine
        .run(RunRequest {
            workflow_id: workflow.id,
            test_input: "Apa itu RAG?".to_string(),
            stop_at_node: None,
        })
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Error);
    assert_eq!(result.node_executions.len(), 3);
    let failed = &result.node_executions[2];
    assert_eq!(failed.node_type, NodeType::Retriever);
    assert_eq!(failed.status, NodeStatus::Error);
    assert!(!failed.error.as_deref().unwrap().is_empty());
}

#[tokio::test]
async fn an_unknown_stop_node_is_rejected_before_any_node_runs() {
    let workflow = rag_workflow();
    let engine = engine_for(workflow.clone(), Arc::new(StaticIndex)).await;

    let err = engine
        .run(RunRequest {
            workflow_id: workflow.id,
            test_input: "Apa itu RAG?".to_string(),
            stop_at_node: Some(Uuid::new_v4()),
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::UnknownStopNode(_))
    ));
}

#[tokio::test]
async fn the_deterministic_prefix_classifies_identically_across_runs() {
    let workflow = rag_workflow();
    let engine = engine_for(workflow.clone(), Arc::new(StaticIndex)).await;
    let stop = node_id(&workflow, NodeType::Router);

    let mut outputs = Vec::new();
    for _ in 0..2 {
        let result = engine
            .run(RunRequest {
                workflow_id: workflow.id,
                test_input: "Apa itu RAG?".to_string(),
                stop_at_node: Some(stop),
            })
            .await
            .unwrap();
        outputs.push(result.final_output);
    }

    // The input stage stamps a wall-clock timestamp; everything the
    // deterministic nodes compute must match exactly
    for key in ["message", "length", "intent", "category", "route", "confidence", "reasoning"] {
        assert_eq!(outputs[0].get(key), outputs[1].get(key), "field {key}");
    }
}
