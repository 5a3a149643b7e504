use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedder call failed: {0}")]
    Call(String),
    #[error("embedder returned {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type EmbedResult<T> = Result<T, EmbedError>;

/// Abstraction over the configured embedding provider (§4.11 `embedder`). Dimension is fixed
/// per-deployment (e.g. 1536) and validated by [`crate::index::VectorIndex::insert`].
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;
    async fn embed(&self, text: &str) -> EmbedResult<Vec<f32>>;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// An [`Embedder`] backed by a configured HTTP endpoint (§4.11 `embedder.endpoint`). The wire
/// shape (`{input}` in, `{embedding: [f32]}` out) matches the approval-service-adjacent wire
/// conventions used elsewhere in this port (plain JSON, no provider-specific SDK), since no
/// concrete embedding provider is named in the source.
pub struct HttpEmbedder {
    http: reqwest::Client,
    endpoint: url::Url,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(http: reqwest::Client, endpoint: url::Url, dimension: usize) -> Self {
        Self { http, endpoint, dimension }
    }
}

#[async_trait::async_trait]
impl Embedder for HttpEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> EmbedResult<Vec<f32>> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&EmbedRequest { input: text })
            .send()
            .await
            .map_err(|e| EmbedError::Call(e.to_string()))?;
        if !response.status().is_success() {
            return Err(EmbedError::Call(format!("embedder returned status {}", response.status())));
        }
        let body: EmbedResponse =
            response.json().await.map_err(|e| EmbedError::Call(format!("invalid embedder response: {e}")))?;
        if body.embedding.len() != self.dimension {
            return Err(EmbedError::DimensionMismatch { expected: self.dimension, actual: body.embedding.len() });
        }
        Ok(body.embedding)
    }
}
