use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::AppConfig,
    error::{Error, Result},
};

/// The two operations the ranking cascade needs from an inference service.
///
/// The pipeline depends only on this contract, never on the backend's wire
/// protocol, so tests substitute a deterministic double.
pub trait InferenceBackend: Send + Sync {
    /// Embed free text into a fixed-dimension vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Score each document's relevance to the query, aligned by input order.
    fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<f32>>;
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    documents: &'a [String],
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankEntry>,
}

#[derive(Deserialize)]
struct RerankEntry {
    index: usize,
    relevance_score: f32,
}

/// HTTP client for a llama-server style inference backend exposing
/// `/v1/embeddings` and `/v1/rerank`.
pub struct HttpBackend {
    client: reqwest::blocking::Client,
    base_url: String,
    embed_timeout: std::time::Duration,
    rerank_timeout: std::time::Duration,
}

impl HttpBackend {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            embed_timeout: config.embed_timeout,
            rerank_timeout: config.rerank_timeout,
        })
    }
}

impl InferenceBackend for HttpBackend {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(self.embed_timeout)
            .json(&EmbeddingsRequest { input: text })
            .send()
            .map_err(|e| Error::InferenceUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::InferenceUnavailable(format!(
                "embedding endpoint returned {}",
                response.status()
            )));
        }

        let body: EmbeddingsResponse = response
            .json()
            .map_err(|e| Error::InferenceUnavailable(e.to_string()))?;
        let vector = body
            .data
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .ok_or_else(|| {
                Error::InferenceUnavailable(
                    "embedding response carried no vector".to_string(),
                )
            })?;

        debug!(dim = vector.len(), "received query embedding");
        Ok(vector)
    }

    fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        let url = format!("{}/v1/rerank", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(self.rerank_timeout)
            .json(&RerankRequest { query, documents })
            .send()
            .map_err(|e| Error::InferenceUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::InferenceUnavailable(format!(
                "rerank endpoint returned {}",
                response.status()
            )));
        }

        let body: RerankResponse = response
            .json()
            .map_err(|e| Error::InferenceUnavailable(e.to_string()))?;

        // Responses arrive indexed; realign to input order.
        let mut scores = vec![None; documents.len()];
        for entry in body.results {
            if let Some(slot) = scores.get_mut(entry.index) {
                *slot = Some(entry.relevance_score);
            }
        }
        scores
            .into_iter()
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| {
                Error::InferenceUnavailable(
                    "rerank response missing candidate scores".to_string(),
                )
            })
    }
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = AppConfig {
            backend_url: "http://localhost:9999/".to_string(),
            ..AppConfig::default()
        };
        let backend = HttpBackend::new(&config).unwrap();
        assert_eq!(backend.base_url, "http://localhost:9999");
    }

    #[test]
    fn unreachable_server_is_inference_unavailable() {
        let config = AppConfig {
            // Nothing listens here; connection is refused immediately.
            backend_url: "http://127.0.0.1:1".to_string(),
            embed_timeout: std::time::Duration::from_millis(200),
            ..AppConfig::default()
        };
        let backend = HttpBackend::new(&config).unwrap();
        let err = backend.embed("query").unwrap_err();
        assert!(matches!(err, Error::InferenceUnavailable(_)));
    }
}
