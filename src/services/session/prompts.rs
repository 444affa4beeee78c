use std::fs;

use crate::config::PromptsConfig;
use crate::utils::error::SessionError;

/// The therapist persona's prompt templates, read once at session start.
///
/// The initial template opens a fresh session verbatim; the intermediate
/// template frames every later turn and is followed by the optional disorder
/// context and the patient's response.
#[derive(Debug, Clone)]
pub struct PromptSet {
    initial: String,
    intermediate: String,
}

impl PromptSet {
    pub fn load(config: &PromptsConfig) -> Result<Self, SessionError> {
        let initial = fs::read_to_string(&config.initial_prompt_path).map_err(SessionError::Template)?;
        let intermediate =
            fs::read_to_string(&config.intermediate_prompt_path).map_err(SessionError::Template)?;

        Ok(Self {
            initial,
            intermediate,
        })
    }

    pub fn from_parts(initial: impl Into<String>, intermediate: impl Into<String>) -> Self {
        Self {
            initial: initial.into(),
            intermediate: intermediate.into(),
        }
    }

    pub fn initial(&self) -> &str {
        &self.initial
    }

    pub fn intermediate(&self) -> &str {
        &self.intermediate
    }
}
