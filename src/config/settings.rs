use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::services::session::SessionLimits;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub primary_model: ModelConfig,
    pub assistant_model: AssistantConfig,
    pub retrieval: RetrievalConfig,
    pub session: SessionConfig,
    pub prompts: PromptsConfig,
    pub transcript: TranscriptConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Which inference backend a model integration talks to. Both speak the
/// OpenAI-compatible chat-completions protocol; they differ in base URL,
/// default model name and API-key requirements.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    Openai,
    Ollama,
}

impl ModelBackend {
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Openai => "gpt-4.1-mini",
            Self::Ollama => "gpt-oss:latest",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    pub backend: ModelBackend,
    #[serde(default)]
    pub model: Option<String>,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_seconds: u64,
}

impl ModelConfig {
    pub fn model_name(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.backend.default_model().to_string())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AssistantConfig {
    pub enabled: bool,
    #[serde(flatten)]
    pub model: ModelConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrievalConfig {
    pub enabled: bool,
    /// Vector index query endpoint (Pinecone-shaped `/query` contract).
    pub index_url: String,
    pub top_k: usize,
    pub score_threshold: f32,
    pub timeout_seconds: u64,
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    pub model: String,
    pub base_url: String,
    pub dimension: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    pub mock_mode: bool,
    #[serde(default)]
    pub time_limit_minutes: Option<f64>,
    #[serde(default)]
    pub message_limit: Option<usize>,
    #[serde(default)]
    pub token_limit: Option<usize>,
    #[serde(default = "default_flag_ratio")]
    pub flag_ratio: f64,
}

fn default_flag_ratio() -> f64 {
    0.2
}

impl SessionConfig {
    pub fn limits(&self) -> SessionLimits {
        SessionLimits {
            time_limit_minutes: self.time_limit_minutes,
            message_limit: self.message_limit,
            token_limit: self.token_limit,
            flag_ratio: self.flag_ratio,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptsConfig {
    pub initial_prompt_path: String,
    pub intermediate_prompt_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TranscriptConfig {
    pub dir: String,
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(true))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }
}
