use crate::NodeError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One candidate document returned by the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedDocument {
    pub id: String,
    pub title: String,
    pub content: String,
    pub relevance: f64,
}

/// External document index consumed by the Retriever executor.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        source: Option<&str>,
    ) -> Result<Vec<RetrievedDocument>, NodeError>;
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub context: Vec<RetrievedDocument>,
    pub model: String,
    pub temperature: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub text: String,
    pub tokens_used: u64,
}

/// External text-generation provider consumed by the Generator executor.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, NodeError>;
}
