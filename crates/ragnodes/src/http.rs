use async_trait::async_trait;
use ragcore::{
    DocumentIndex, Generation, GenerationRequest, NodeError, RetrievedDocument, TextGenerator,
};
use serde::{Deserialize, Serialize};

/// HTTP client for the external document index.
pub struct HttpDocumentIndex {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDocumentIndex {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
}

#[derive(Deserialize)]
struct SearchResponse {
    documents: Vec<RetrievedDocument>,
}

#[async_trait]
impl DocumentIndex for HttpDocumentIndex {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        source: Option<&str>,
    ) -> Result<Vec<RetrievedDocument>, NodeError> {
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&SearchRequest {
                query,
                max_results,
                source,
            })
            .send()
            .await
            .map_err(|e| NodeError::Upstream(format!("document index unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(NodeError::Upstream(format!(
                "document index returned status {}",
                response.status().as_u16()
            )));
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| {
            NodeError::Upstream(format!("document index returned malformed response: {e}"))
        })?;
        Ok(parsed.documents)
    }
}

/// HTTP client for the external text-generation provider.
pub struct HttpTextGenerator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTextGenerator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    prompt: &'a str,
    model: &'a str,
    temperature: f64,
    context: &'a [RetrievedDocument],
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, NodeError> {
        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .json(&GenerateRequest {
                prompt: &request.prompt,
                model: &request.model,
                temperature: request.temperature,
                context: &request.context,
            })
            .send()
            .await
            .map_err(|e| NodeError::Upstream(format!("generation provider unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(NodeError::Upstream(format!(
                "generation provider returned status {}",
                response.status().as_u16()
            )));
        }

        response.json().await.map_err(|e| {
            NodeError::Upstream(format!(
                "generation provider returned malformed response: {e}"
            ))
        })
    }
}
