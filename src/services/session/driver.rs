use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::chat::ChatMessage;
use crate::services::assistant::AssistantSummarizer;
use crate::transcript::{TranscriptEntry, TranscriptWriter};
use crate::utils::count_tokens;
use crate::utils::error::SessionError;

use super::prompts::PromptSet;

/// Trait for the primary/secondary model integrations.
///
/// Each integration owns its own append-only conversational memory; the
/// driver reads the memory's length and its most recent entries but never
/// mutates it directly; mutation is a side effect of `run`.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stateful invocation: the integration appends the exchange to its own
    /// memory as part of the call.
    async fn run(&self, prompt: &str) -> Result<String>;

    /// One-shot completion with no memory involvement.
    async fn generate(&self, prompt: &str) -> Result<String>;

    fn memory_len(&self) -> usize;

    /// Most recent `n` memory entries, oldest first.
    fn last_messages(&self, n: usize) -> Vec<ChatMessage>;
}

/// Trait for the similarity-search service (embedding + nearest-neighbor
/// lookup behind one call). Results arrive sorted by descending score.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RetrievalProvider: Send + Sync {
    async fn fetch(&self, query_text: &str, top_k: usize) -> Result<Vec<RetrievalCandidate>>;
}

/// One ranked result of a similarity query. Ephemeral: never persisted except
/// as summarized text inside an `Action` transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalCandidate {
    pub id: String,
    pub score: f32,
    pub metadata: CandidateMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateMetadata {
    #[serde(default)]
    pub diagnostic_criteria: String,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Per-session driver tuning.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub top_k: usize,
    pub score_threshold: f32,
    pub mock_mode: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            score_threshold: 0.59,
            mock_mode: false,
        }
    }
}

/// The session orchestration core.
///
/// Owns the turn lifecycle: log the user's utterance, enrich it with
/// retrieved clinical context, assemble the prompt, invoke the therapist
/// model and record every event in the session transcript. Collaborators are
/// injected at construction; the driver holds no global state.
pub struct ConversationDriver {
    primary: Arc<dyn LlmProvider>,
    assistant: Option<AssistantSummarizer>,
    retrieval: Option<Arc<dyn RetrievalProvider>>,
    transcript: TranscriptWriter,
    prompts: PromptSet,
    config: DriverConfig,
}

impl ConversationDriver {
    pub fn new(
        primary: Arc<dyn LlmProvider>,
        assistant: Option<AssistantSummarizer>,
        retrieval: Option<Arc<dyn RetrievalProvider>>,
        transcript: TranscriptWriter,
        prompts: PromptSet,
        config: DriverConfig,
    ) -> Self {
        Self {
            primary,
            assistant,
            retrieval,
            transcript,
            prompts,
            config,
        }
    }

    /// Open the session with an AI-initiated greeting instead of waiting for
    /// user input. Logs the prompt and the reply; no `Human` entry is written.
    pub async fn proactive_start(&self) -> Result<String, SessionError> {
        let prompt = self.build_prompt("", "");
        self.log(&TranscriptEntry::prompt(prompt.clone()))?;

        let reply = if self.config.mock_mode {
            "A: Proactive start".to_string()
        } else {
            self.primary
                .run(&prompt)
                .await
                .map_err(SessionError::ModelInvocation)?
        };

        self.log(&TranscriptEntry::ai(
            reply.clone(),
            count_tokens(&prompt),
            count_tokens(&reply),
        ))?;
        Ok(reply)
    }

    /// The main turn. The user's utterance is durably logged before anything
    /// else; retrieval failures degrade to an empty context; a primary model
    /// failure aborts the turn and surfaces to the caller.
    pub async fn ask(&self, query: &str) -> Result<String, SessionError> {
        if query.trim().eq_ignore_ascii_case("start") {
            debug!("Sentinel input, routing to proactive start");
            return self.proactive_start().await;
        }

        self.log(&TranscriptEntry::human(query))?;

        let disorder_context = match self.fetch_disorder_context(query).await {
            Ok(context) => context,
            Err(err) if err.is_recoverable() => {
                warn!("Retrieval degraded to empty context: {}", err);
                String::new()
            }
            Err(err) => return Err(err),
        };

        let prompt = self.build_prompt(query, &disorder_context);
        self.log(&TranscriptEntry::prompt(prompt.clone()))?;

        let reply = if self.config.mock_mode {
            format!("B: User: {query}")
        } else {
            self.primary
                .run(&prompt)
                .await
                .map_err(SessionError::ModelInvocation)?
        };

        self.log(&TranscriptEntry::ai(
            reply.clone(),
            count_tokens(&prompt),
            count_tokens(&reply),
        ))?;
        Ok(reply)
    }

    /// Retrieval-augmentation step.
    ///
    /// Only fires once the conversation has exchanged more than one prior
    /// round (memory length > 2) and a fetcher is configured; otherwise it is
    /// a no-op returning an empty string with no service call and no log
    /// entry. Candidates at or below the score threshold are dropped; ranks
    /// refer to positions in the original unfiltered list.
    pub async fn fetch_disorder_context(&self, query: &str) -> Result<String, SessionError> {
        let Some(retrieval) = &self.retrieval else {
            return Ok(String::new());
        };
        if self.primary.memory_len() <= 2 {
            debug!("Not enough conversation context yet, skipping retrieval");
            return Ok(String::new());
        }

        let candidates = retrieval
            .fetch(query, self.config.top_k)
            .await
            .map_err(SessionError::Retrieval)?;

        let mut summary = String::from("Possible Disorder Matches:\n");
        let mut compact_log = String::new();

        for (i, candidate) in candidates.iter().enumerate() {
            let rank = i + 1;
            if candidate.score > self.config.score_threshold {
                summary.push_str(&format!(
                    "Disorder Match {rank}. {} (Score: {:.2})\nDiagnostic Criteria: {}\n",
                    candidate.id, candidate.score, candidate.metadata.diagnostic_criteria
                ));
                compact_log.push_str(&format!(
                    "{rank}. ID: {}, Score: {:.2}",
                    candidate.id, candidate.score
                ));
            }
        }

        if compact_log.trim().is_empty() {
            return Ok(summary);
        }
        self.log(&TranscriptEntry::fetcher(compact_log.clone()))?;
        let Some(assistant) = &self.assistant else {
            return Ok(summary);
        };

        match assistant.help(&summary, &self.primary.last_messages(2)).await {
            Ok((response, prompt_used)) => {
                self.log(&TranscriptEntry::assistant(
                    response.clone(),
                    prompt_used.clone(),
                    count_tokens(&prompt_used),
                    count_tokens(&response),
                ))?;
                Ok(response)
            }
            Err(err) => {
                // Summarization is best-effort: fall back to the raw summary
                let err = SessionError::Summarization(err);
                warn!("Assistant summarization failed, using raw context: {}", err);
                Ok(summary)
            }
        }
    }

    /// Template choice is gated strictly on memory emptiness: a session is
    /// Fresh until the first model call succeeds, Warm afterwards.
    fn build_prompt(&self, query: &str, disorder_context: &str) -> String {
        if self.primary.memory_len() == 0 {
            return self.prompts.initial().to_string();
        }

        let mut prompt = format!("{}\n", self.prompts.intermediate());
        if !disorder_context.is_empty() {
            prompt.push_str(&format!("\n{disorder_context}\n"));
        }
        prompt.push_str(&format!("Patient Response: {query}"));
        prompt
    }

    fn log(&self, entry: &TranscriptEntry) -> Result<(), SessionError> {
        self.transcript.write(entry).map_err(SessionError::LogWrite)
    }

    pub fn transcript_path(&self) -> &Path {
        self.transcript.path()
    }
}

impl std::fmt::Debug for ConversationDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationDriver")
            .field("transcript", &self.transcript.path())
            .field("assistant_enabled", &self.assistant.is_some())
            .field("retrieval_enabled", &self.retrieval.is_some())
            .field("config", &self.config)
            .finish()
    }
}
