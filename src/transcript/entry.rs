use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One atomic event in a session's transcript, serialized as a single JSON
/// line. The tagged union makes a partial or mis-shaped record
/// unrepresentable: every variant carries exactly the fields its role needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role")]
pub enum TranscriptEntry {
    /// The exact prompt assembled before a model call.
    Prompt {
        details: PromptDetails,
        timestamp: DateTime<Utc>,
    },
    /// The raw user utterance.
    Human {
        details: HumanDetails,
        timestamp: DateTime<Utc>,
    },
    /// The primary model's reply plus token accounting.
    #[serde(rename = "AI")]
    Ai {
        details: AiDetails,
        timestamp: DateTime<Utc>,
    },
    /// A side activity (retrieval lookup, assistant summarization).
    Action {
        name: ActionName,
        details: ActionDetails,
        timestamp: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDetails {
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanDetails {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiDetails {
    pub response: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Named kind of a side activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionName {
    Fetcher,
    #[serde(rename = "Therapist_Assistant")]
    TherapistAssistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDetails {
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<usize>,
}

impl TranscriptEntry {
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self::Prompt {
            details: PromptDetails {
                prompt: prompt.into(),
            },
            timestamp: Utc::now(),
        }
    }

    pub fn human(query: impl Into<String>) -> Self {
        Self::Human {
            details: HumanDetails {
                query: query.into(),
            },
            timestamp: Utc::now(),
        }
    }

    pub fn ai(response: impl Into<String>, input_tokens: usize, output_tokens: usize) -> Self {
        Self::Ai {
            details: AiDetails {
                response: response.into(),
                input_tokens,
                output_tokens,
            },
            timestamp: Utc::now(),
        }
    }

    /// Retrieval lookup record: the compact ranked-candidate summary.
    pub fn fetcher(compact_log: impl Into<String>) -> Self {
        Self::Action {
            name: ActionName::Fetcher,
            details: ActionDetails {
                response: compact_log.into(),
                input: None,
                input_tokens: None,
                output_tokens: None,
            },
            timestamp: Utc::now(),
        }
    }

    /// Assistant summarization record with full token accounting on both
    /// sides of the secondary model call.
    pub fn assistant(
        response: impl Into<String>,
        input: impl Into<String>,
        input_tokens: usize,
        output_tokens: usize,
    ) -> Self {
        Self::Action {
            name: ActionName::TherapistAssistant,
            details: ActionDetails {
                response: response.into(),
                input: Some(input.into()),
                input_tokens: Some(input_tokens),
                output_tokens: Some(output_tokens),
            },
            timestamp: Utc::now(),
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::Prompt { .. } => "Prompt",
            Self::Human { .. } => "Human",
            Self::Ai { .. } => "AI",
            Self::Action { .. } => "Action",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Prompt { timestamp, .. }
            | Self::Human { timestamp, .. }
            | Self::Ai { timestamp, .. }
            | Self::Action { timestamp, .. } => *timestamp,
        }
    }
}
