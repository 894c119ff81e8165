use std::time::Duration;

use clap::ValueEnum;

/// Default base URL of the inference server (llama-server style HTTP API).
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8080";

/// How the ranking cascade uses the inference backend for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QueryMode {
    /// Structured shortlist only; the backend is never contacted.
    Off,
    /// Shortlist, then order by embedding similarity.
    Embeddings,
    /// Embedding order with a rerank pass over the top slice.
    Hybrid,
}

impl std::fmt::Display for QueryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryMode::Off => write!(f, "off"),
            QueryMode::Embeddings => write!(f, "embeddings"),
            QueryMode::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Process-wide configuration, built once in `main` and passed by reference.
///
/// No component reads process environment directly; everything tunable
/// arrives through this value.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the inference server.
    pub backend_url: String,
    /// Timeout for a single embedding request.
    pub embed_timeout: Duration,
    /// Timeout for a single rerank request.
    pub rerank_timeout: Duration,
    /// Size of the top slice handed to the reranker in hybrid mode.
    pub rerank_depth: usize,
    /// Worker threads for similarity scoring and extraction.
    pub concurrency: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            embed_timeout: Duration::from_secs(30),
            rerank_timeout: Duration::from_secs(30),
            rerank_depth: 10,
            concurrency: 4,
        }
    }
}
