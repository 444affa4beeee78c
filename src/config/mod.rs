mod settings;

pub use settings::{
    AssistantConfig, EmbeddingConfig, ModelBackend, ModelConfig, PromptsConfig, RetrievalConfig,
    ServerConfig, SessionConfig, Settings, TranscriptConfig,
};
