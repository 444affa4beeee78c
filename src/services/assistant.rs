use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use crate::models::chat::ChatMessage;
use crate::services::session::LlmProvider;

const ASSISTANT_PROMPT: &str = "You are an assistant to me, who is a professional therapist. I will provide you with my question, patient's response and the relevant potential mental health disorders.
I will also provide you with diagnostic criteria of all these potential disorders. From the patient response and the disorder context, do the following:
- Summarise the issues the patient is facing in a concise manner based on just current info (don't emphasize too much since it is just temporary context).
- For all of these listed disorders, add a precise summary of diagnostic criteria with only the most crucial symptoms.

- Suggest further possible symptoms I should ask the patient about to decide on possible disorders from this list.

My Question: {question}

Patient Response: {response}

Relevant Disorders: {disorders}
";

/// Pre-digests raw retrieval context through a secondary model so the
/// therapist prompt carries a condensed clinical summary instead of raw
/// diagnostic criteria. The assistant's model context is never shared with
/// the therapist's.
pub struct AssistantSummarizer {
    model: Arc<dyn LlmProvider>,
}

impl AssistantSummarizer {
    pub fn new(model: Arc<dyn LlmProvider>) -> Self {
        Self { model }
    }

    /// Summarize fetched disorder context against the latest exchange.
    ///
    /// `recent_memory` holds up to the last two conversation entries: the
    /// second-to-last is treated as the therapist's question and the last as
    /// the patient's response. With fewer entries the missing slots stay
    /// empty. Returns the model output together with the exact prompt used,
    /// so the caller can log and account for both.
    pub async fn help(
        &self,
        fetched_disorders: &str,
        recent_memory: &[ChatMessage],
    ) -> Result<(String, String)> {
        if recent_memory.is_empty() {
            debug!("No conversation history available for assistant");
        }

        let question = if recent_memory.len() > 1 {
            recent_memory[recent_memory.len() - 2].content.as_str()
        } else {
            ""
        };
        let response = recent_memory
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or("");

        let prompt = self.build_prompt(question, response, fetched_disorders);
        let output = self.model.generate(&prompt).await?;
        Ok((output, prompt))
    }

    fn build_prompt(&self, question: &str, response: &str, disorders: &str) -> String {
        ASSISTANT_PROMPT
            .replace("{question}", question)
            .replace("{response}", response)
            .replace("{disorders}", disorders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoModel;

    #[async_trait::async_trait]
    impl LlmProvider for EchoModel {
        async fn run(&self, _prompt: &str) -> Result<String> {
            unreachable!("assistant never uses stateful invocation")
        }
        async fn generate(&self, prompt: &str) -> Result<String> {
            Ok(format!("SUMMARY of {} chars", prompt.len()))
        }
        fn memory_len(&self) -> usize {
            0
        }
        fn last_messages(&self, _n: usize) -> Vec<ChatMessage> {
            Vec::new()
        }
    }

    #[tokio::test]
    async fn test_question_and_response_slots() {
        let summarizer = AssistantSummarizer::new(Arc::new(EchoModel));
        let memory = vec![
            ChatMessage::assistant("How long has this lasted?"),
            ChatMessage::user("About three weeks now"),
        ];

        let (_, prompt) = summarizer.help("Possible Disorder Matches:\n", &memory).await.unwrap();
        assert!(prompt.contains("My Question: How long has this lasted?"));
        assert!(prompt.contains("Patient Response: About three weeks now"));
        assert!(prompt.contains("Relevant Disorders: Possible Disorder Matches:"));
    }

    #[tokio::test]
    async fn test_single_entry_leaves_question_empty() {
        let summarizer = AssistantSummarizer::new(Arc::new(EchoModel));
        let memory = vec![ChatMessage::user("I can't sleep")];

        let (_, prompt) = summarizer.help("ctx", &memory).await.unwrap();
        assert!(prompt.contains("My Question: \n"));
        assert!(prompt.contains("Patient Response: I can't sleep"));
    }

    #[tokio::test]
    async fn test_empty_memory_degrades_gracefully() {
        let summarizer = AssistantSummarizer::new(Arc::new(EchoModel));
        let (output, prompt) = summarizer.help("ctx", &[]).await.unwrap();
        assert!(prompt.contains("My Question: \n"));
        assert!(prompt.contains("Patient Response: \n"));
        assert!(output.starts_with("SUMMARY"));
    }
}
