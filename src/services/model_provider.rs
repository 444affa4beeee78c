use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::info;

use crate::config::Settings;

use super::llm_service::{ConversationModel, LlmService};

/// Central factory for model integrations.
///
/// The underlying HTTP clients are built lazily on first use and shared
/// across sessions; each session then gets its own `ConversationModel` with
/// fresh memory on top of the shared client.
pub struct ModelProvider {
    settings: Arc<Settings>,
    primary: OnceCell<Arc<LlmService>>,
    assistant: OnceCell<Arc<LlmService>>,
}

impl ModelProvider {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            settings,
            primary: OnceCell::new(),
            assistant: OnceCell::new(),
        }
    }

    fn primary_service(&self) -> Arc<LlmService> {
        self.primary
            .get_or_init(|| {
                let service = LlmService::new(self.settings.primary_model.clone());
                info!("Loaded primary model client: {}", service.model_name());
                Arc::new(service)
            })
            .clone()
    }

    fn assistant_service(&self) -> Arc<LlmService> {
        self.assistant
            .get_or_init(|| {
                let service = LlmService::new(self.settings.assistant_model.model.clone());
                info!("Loaded assistant model client: {}", service.model_name());
                Arc::new(service)
            })
            .clone()
    }

    /// A fresh conversation-scoped binding of the primary model.
    pub fn primary_session(&self) -> Arc<ConversationModel> {
        Arc::new(ConversationModel::new(self.primary_service()))
    }

    /// A fresh conversation-scoped binding of the assistant model, or `None`
    /// when the assistant is disabled in configuration.
    pub fn assistant_session(&self) -> Option<Arc<ConversationModel>> {
        if !self.settings.assistant_model.enabled {
            return None;
        }
        Some(Arc::new(ConversationModel::new(self.assistant_service())))
    }
}
