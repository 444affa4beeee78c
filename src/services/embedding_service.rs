use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::config::EmbeddingConfig;

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    content: String,
    input: String,
}

/// HTTP client for the embedding server.
#[derive(Clone)]
pub struct EmbeddingService {
    client: Client,
    base_url: String,
    dimension: usize,
}

impl EmbeddingService {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: config.base_url,
            dimension: config.dimension,
        }
    }

    /// Generate an embedding for a single text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for {} chars", text.len());

        let request = EmbeddingRequest {
            content: text.to_string(),
            // Some servers read `content`, others `input`; send both
            input: text.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/embedding", self.base_url))
            .json(&request)
            .send()
            .await
            .context("Failed to connect to embedding server")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Embedding API error ({}): {}", status, body);
        }

        let json_value: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse embedding response as JSON")?;

        let embedding = Self::extract_vector(&json_value)?;

        if embedding.is_empty() {
            anyhow::bail!("Generated embedding is empty");
        }
        if embedding.len() != self.dimension {
            anyhow::bail!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                embedding.len()
            );
        }

        Ok(embedding)
    }

    /// Accepts both the llama.cpp shape `{"embedding": [...]}` and the
    /// OpenAI shape `{"data": [{"embedding": [...]}]}`.
    fn extract_vector(value: &serde_json::Value) -> Result<Vec<f32>> {
        let array = if let Some(embedding) = value.get("embedding").and_then(|v| v.as_array()) {
            embedding
        } else if let Some(data) = value.get("data").and_then(|v| v.as_array()) {
            data.first()
                .and_then(|d| d.get("embedding"))
                .and_then(|v| v.as_array())
                .ok_or_else(|| anyhow::anyhow!("Empty data array from embedding server"))?
        } else {
            anyhow::bail!("Unrecognized embedding response format: {}", value);
        };

        Ok(array
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect())
    }
}
