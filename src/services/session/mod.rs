//! Session orchestration core.
//!
//! The driver threads one turn through retrieval, assistant pre-digestion,
//! prompt assembly and the primary model call, logging every event to the
//! session transcript. The monitor replays that transcript to enforce soft
//! session limits.

mod driver;
mod monitor;
mod prompts;
mod registry;

pub use driver::{
    CandidateMetadata, ConversationDriver, DriverConfig, LlmProvider, RetrievalCandidate,
    RetrievalProvider,
};
pub use monitor::{MonitorVerdict, SessionLimits, SessionMonitor};
pub use prompts::PromptSet;
pub use registry::SessionRegistry;
