use anyhow::{Context, Result};
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::config::{ModelBackend, ModelConfig};
use crate::models::chat::ChatMessage;
use crate::services::session::LlmProvider;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: String,
}

/// Stateless chat-completions client. Both supported backends speak the
/// OpenAI-compatible protocol; Ollama serves it locally without a key.
#[derive(Clone)]
pub struct LlmService {
    client: Client,
    config: ModelConfig,
    api_key: Option<String>,
}

impl LlmService {
    pub fn new(config: ModelConfig) -> Self {
        let api_key = match config.backend {
            ModelBackend::Openai => std::env::var("OPENAI_API_KEY").ok(),
            ModelBackend::Ollama => None,
        };

        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(config.timeout_seconds))
                .build()
                .unwrap_or_else(|_| Client::new()),
            config,
            api_key,
        }
    }

    pub fn model_name(&self) -> String {
        self.config.model_name()
    }

    /// Full-response chat completion (no streaming).
    pub async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String> {
        debug!("Starting chat generation with {} messages", messages.len());

        let request = ChatCompletionRequest {
            model: self.config.model_name(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: false,
        };

        let mut builder = self
            .client
            .post(format!("{}/v1/chat/completions", self.config.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .context("Failed to call chat completions API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Chat completions API error: {} - {}", status, body);
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse chat completions response")?;

        completion
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("No choices returned from model"))
    }
}

/// One model integration bound to one conversation.
///
/// Wraps the shared HTTP client with this session's own append-only memory.
/// `run` sends the full history and records the new exchange; `generate` is a
/// one-shot call that leaves memory untouched, so an assistant integration
/// never pollutes the therapist's conversational state.
pub struct ConversationModel {
    service: Arc<LlmService>,
    memory: Mutex<Vec<ChatMessage>>,
}

impl ConversationModel {
    pub fn new(service: Arc<LlmService>) -> Self {
        Self {
            service,
            memory: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for ConversationModel {
    async fn run(&self, prompt: &str) -> Result<String> {
        let mut messages = self.memory.lock().clone();
        messages.push(ChatMessage::user(prompt));

        let reply = self.service.chat(messages).await?;

        // Memory grows only after a successful call: a failed turn leaves
        // the session in its previous state.
        let mut memory = self.memory.lock();
        memory.push(ChatMessage::user(prompt));
        memory.push(ChatMessage::assistant(reply.clone()));

        Ok(reply)
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.service.chat(vec![ChatMessage::user(prompt)]).await
    }

    fn memory_len(&self) -> usize {
        self.memory.lock().len()
    }

    fn last_messages(&self, n: usize) -> Vec<ChatMessage> {
        let memory = self.memory.lock();
        memory[memory.len().saturating_sub(n)..].to_vec()
    }
}
