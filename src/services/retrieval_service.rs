use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RetrievalConfig;
use crate::services::session::{CandidateMetadata, RetrievalCandidate, RetrievalProvider};

use super::embedding_service::EmbeddingService;

#[derive(Debug, Serialize)]
struct IndexQueryRequest {
    vector: Vec<f32>,
    top_k: usize,
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct IndexQueryResponse {
    matches: Vec<IndexMatch>,
}

#[derive(Debug, Deserialize)]
struct IndexMatch {
    id: String,
    score: f32,
    #[serde(default)]
    metadata: CandidateMetadata,
}

/// The disorder fetcher: embeds the query text and runs a nearest-neighbor
/// lookup against the vector index service. Safe for concurrent read-only
/// queries from multiple sessions.
#[derive(Clone)]
pub struct RetrievalService {
    client: Client,
    index_url: String,
    embedding: EmbeddingService,
}

impl RetrievalService {
    pub fn new(config: RetrievalConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(config.timeout_seconds))
                .build()
                .unwrap_or_else(|_| Client::new()),
            index_url: config.index_url,
            embedding: EmbeddingService::new(config.embedding),
        }
    }
}

#[async_trait::async_trait]
impl RetrievalProvider for RetrievalService {
    async fn fetch(&self, query_text: &str, top_k: usize) -> Result<Vec<RetrievalCandidate>> {
        let vector = self
            .embedding
            .embed(query_text)
            .await
            .context("Failed to embed query text")?;

        let request = IndexQueryRequest {
            vector,
            top_k,
            include_metadata: true,
        };

        let response = self
            .client
            .post(format!("{}/query", self.index_url))
            .json(&request)
            .send()
            .await
            .context("Failed to query vector index")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Vector index error ({}): {}", status, body);
        }

        let parsed: IndexQueryResponse = response
            .json()
            .await
            .context("Failed to parse vector index response")?;

        debug!("Vector index returned {} matches", parsed.matches.len());

        Ok(parsed
            .matches
            .into_iter()
            .map(|m| RetrievalCandidate {
                id: m.id,
                score: m.score,
                metadata: m.metadata,
            })
            .collect())
    }
}
