use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Settings;
use crate::services::session::{
    ConversationDriver, DriverConfig, LlmProvider, PromptSet, RetrievalProvider, SessionMonitor,
    SessionRegistry,
};
use crate::services::{AssistantSummarizer, ModelProvider, RetrievalService};
use crate::transcript::TranscriptWriter;
use crate::utils::error::SessionError;

/// Shared application state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub provider: Arc<ModelProvider>,
    pub registry: Arc<SessionRegistry>,
    retrieval: Option<Arc<RetrievalService>>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let settings = Arc::new(settings);
        let retrieval = settings
            .retrieval
            .enabled
            .then(|| Arc::new(RetrievalService::new(settings.retrieval.clone())));

        Self {
            provider: Arc::new(ModelProvider::new(settings.clone())),
            registry: Arc::new(SessionRegistry::new()),
            retrieval,
            settings,
        }
    }

    /// Look up the session's driver, creating it with its transcript file and
    /// model bindings on first sight of the id.
    pub fn session(&self, session_id: &str) -> Result<Arc<ConversationDriver>, SessionError> {
        self.registry.get_or_create(session_id, || {
            let prompts = PromptSet::load(&self.settings.prompts)?;
            let transcript = TranscriptWriter::create(self.transcript_path(session_id))
                .map_err(SessionError::LogWrite)?;

            let assistant = self.provider.assistant_session().map(|model| {
                let model: Arc<dyn LlmProvider> = model;
                AssistantSummarizer::new(model)
            });

            let retrieval = self.retrieval.clone().map(|service| {
                let service: Arc<dyn RetrievalProvider> = service;
                service
            });

            let primary: Arc<dyn LlmProvider> = self.provider.primary_session();

            Ok(ConversationDriver::new(
                primary,
                assistant,
                retrieval,
                transcript,
                prompts,
                DriverConfig {
                    top_k: self.settings.retrieval.top_k,
                    score_threshold: self.settings.retrieval.score_threshold,
                    mock_mode: self.settings.session.mock_mode,
                },
            ))
        })
    }

    pub fn monitor(&self, session_id: &str) -> Arc<Mutex<SessionMonitor>> {
        self.registry.monitor_or_create(session_id, || {
            SessionMonitor::new(self.transcript_path(session_id), self.settings.session.limits())
        })
    }

    pub fn transcript_path(&self, session_id: &str) -> PathBuf {
        PathBuf::from(&self.settings.transcript.dir).join(format!("conv_{session_id}.json"))
    }
}
