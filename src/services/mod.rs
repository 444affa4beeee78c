pub mod assistant;
pub mod embedding_service;
pub mod llm_service;
pub mod model_provider;
pub mod retrieval_service;
pub mod session;

pub use assistant::AssistantSummarizer;
pub use embedding_service::EmbeddingService;
pub use llm_service::{ConversationModel, LlmService};
pub use model_provider::ModelProvider;
pub use retrieval_service::RetrievalService;
