//! End-to-end session lifecycle tests against stub model and retrieval
//! services, verifying the transcript produced on disk and the monitor
//! verdicts replayed from it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Extension, Path as UrlPath};
use axum::Json;
use parking_lot::Mutex;

use therapy_api_server::config::{
    AssistantConfig, EmbeddingConfig, ModelBackend, ModelConfig, PromptsConfig, RetrievalConfig,
    ServerConfig, SessionConfig, Settings, TranscriptConfig,
};
use therapy_api_server::handlers::{chat_handler, monitor_handler};
use therapy_api_server::models::chat::{ChatMessage, ChatRequest};
use therapy_api_server::state::AppState;
use therapy_api_server::utils::error::ApiError;
use therapy_api_server::services::session::{
    CandidateMetadata, ConversationDriver, DriverConfig, LlmProvider, PromptSet,
    RetrievalCandidate, RetrievalProvider, SessionLimits, SessionMonitor,
};
use therapy_api_server::services::AssistantSummarizer;
use therapy_api_server::transcript::{read_entries, ActionName, TranscriptEntry, TranscriptWriter};

/// Scripted therapist model with real conversational memory semantics:
/// every successful stateful call appends the user prompt and the reply.
struct ScriptedModel {
    replies: Mutex<Vec<String>>,
    memory: Mutex<Vec<ChatMessage>>,
}

impl ScriptedModel {
    fn new(replies: &[&str]) -> Self {
        let mut replies: Vec<String> = replies.iter().map(|r| r.to_string()).collect();
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            memory: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedModel {
    async fn run(&self, prompt: &str) -> anyhow::Result<String> {
        let reply = self
            .replies
            .lock()
            .pop()
            .ok_or_else(|| anyhow::anyhow!("script exhausted"))?;
        let mut memory = self.memory.lock();
        memory.push(ChatMessage::user(prompt));
        memory.push(ChatMessage::assistant(reply.clone()));
        Ok(reply)
    }

    async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
        Ok("Condensed clinical summary".to_string())
    }

    fn memory_len(&self) -> usize {
        self.memory.lock().len()
    }

    fn last_messages(&self, n: usize) -> Vec<ChatMessage> {
        let memory = self.memory.lock();
        memory[memory.len().saturating_sub(n)..].to_vec()
    }
}

struct StubRetrieval {
    calls: AtomicUsize,
    candidates: Vec<RetrievalCandidate>,
}

impl StubRetrieval {
    fn new(candidates: Vec<RetrievalCandidate>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            candidates,
        }
    }
}

#[async_trait::async_trait]
impl RetrievalProvider for StubRetrieval {
    async fn fetch(&self, _query: &str, _top_k: usize) -> anyhow::Result<Vec<RetrievalCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.candidates.clone())
    }
}

fn candidate(id: &str, score: f32) -> RetrievalCandidate {
    RetrievalCandidate {
        id: id.to_string(),
        score,
        metadata: CandidateMetadata {
            diagnostic_criteria: format!("Criteria for {id}"),
            extra: HashMap::new(),
        },
    }
}

fn prompts() -> PromptSet {
    PromptSet::from_parts(
        "You are a therapist. Greet the patient.",
        "You are a therapist. Continue the session.",
    )
}

#[tokio::test]
async fn full_session_produces_expected_role_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conv_e2e.json");

    let model = Arc::new(ScriptedModel::new(&[
        "Hello, what brings you in today?",
        "That sounds difficult. How long has it lasted?",
        "Have you noticed changes in your sleep?",
    ]));
    let retrieval = Arc::new(StubRetrieval::new(vec![
        candidate("Generalized Anxiety", 0.82),
        candidate("Insomnia", 0.44),
    ]));
    let assistant_model: Arc<dyn LlmProvider> = model.clone();
    let assistant = AssistantSummarizer::new(assistant_model);

    let driver = ConversationDriver::new(
        model.clone(),
        Some(assistant),
        Some(retrieval.clone()),
        TranscriptWriter::create(&path).unwrap(),
        prompts(),
        DriverConfig::default(),
    );

    // Turn 1: sentinel opens the session proactively
    driver.ask("START").await.unwrap();
    // Turn 2: memory has one round, retrieval still gated off
    driver.ask("I worry about everything").await.unwrap();
    // Turn 3: retrieval fires and feeds the assistant
    driver.ask("It's been months and I can't relax").await.unwrap();

    assert_eq!(retrieval.calls.load(Ordering::SeqCst), 1);

    let entries = read_entries(&path).unwrap();
    let roles: Vec<_> = entries.iter().map(|e| e.role().to_string()).collect();
    assert_eq!(
        roles,
        vec![
            "Prompt", "AI", // proactive start
            "Human", "Prompt", "AI", // first real turn, no retrieval yet
            "Human", "Action", "Action", "Prompt", "AI", // augmented turn
        ]
    );

    // The two actions are the fetcher then the assistant, in that order
    match (&entries[6], &entries[7]) {
        (
            TranscriptEntry::Action {
                name: ActionName::Fetcher,
                details: fetcher,
                ..
            },
            TranscriptEntry::Action {
                name: ActionName::TherapistAssistant,
                details: assistant,
                ..
            },
        ) => {
            assert!(fetcher.response.contains("1. ID: Generalized Anxiety, Score: 0.82"));
            assert!(!fetcher.response.contains("Insomnia"));
            assert_eq!(assistant.response, "Condensed clinical summary");
            assert!(assistant.input.as_deref().unwrap().contains("Relevant Disorders:"));
            assert!(assistant.input_tokens.unwrap() > 0);
            assert!(assistant.output_tokens.unwrap() > 0);
        }
        other => panic!("unexpected action pair: {:?}", other),
    }

    // The augmented prompt carries the assistant's digest, not raw criteria
    match &entries[8] {
        TranscriptEntry::Prompt { details, .. } => {
            assert!(details.prompt.contains("Condensed clinical summary"));
            assert!(details
                .prompt
                .ends_with("Patient Response: It's been months and I can't relax"));
        }
        other => panic!("expected Prompt, got {:?}", other),
    }
}

#[tokio::test]
async fn monitor_replays_transcript_written_by_driver() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conv_monitor.json");

    let model = Arc::new(ScriptedModel::new(&["r1", "r2", "r3", "r4"]));
    let driver = ConversationDriver::new(
        model,
        None,
        None,
        TranscriptWriter::create(&path).unwrap(),
        prompts(),
        DriverConfig::default(),
    );

    for query in ["one", "two", "three", "four"] {
        driver.ask(query).await.unwrap();
    }

    let mut monitor = SessionMonitor::new(
        &path,
        SessionLimits {
            message_limit: Some(5),
            ..SessionLimits::default()
        },
    );

    let verdict = monitor.evaluate().unwrap();
    assert_eq!(verdict.message_count, 4);
    // 5 - 4 = 1 <= 0.2 * 5 -> final lap, but not over the limit
    assert!(verdict.final_lap);
    assert!(!verdict.end_flag);
    assert!(verdict.token_count > 0);

    // Flag stays sticky on re-evaluation
    let verdict = monitor.evaluate().unwrap();
    assert!(verdict.final_lap);
}

#[tokio::test]
async fn sentinel_is_trimmed_and_case_insensitive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conv_sentinel.json");

    let model = Arc::new(ScriptedModel::new(&["opening", "reply"]));
    let driver = ConversationDriver::new(
        model,
        None,
        None,
        TranscriptWriter::create(&path).unwrap(),
        prompts(),
        DriverConfig::default(),
    );

    driver.ask("  sTaRt ").await.unwrap();
    // "restart" is a normal utterance, not the sentinel
    driver.ask("restart").await.unwrap();

    let entries = read_entries(&path).unwrap();
    let humans: Vec<_> = entries
        .iter()
        .filter_map(|e| match e {
            TranscriptEntry::Human { details, .. } => Some(details.query.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(humans, vec!["restart"]);
}

/// Minimal mock-mode settings rooted in a temp directory, with the message
/// limit low enough for end-of-session tests.
fn test_settings(root: &std::path::Path) -> Settings {
    let prompts_dir = root.join("prompts");
    std::fs::create_dir_all(&prompts_dir).unwrap();
    let initial = prompts_dir.join("initial.txt");
    let intermediate = prompts_dir.join("intermediate.txt");
    std::fs::write(&initial, "Greet the patient.").unwrap();
    std::fs::write(&intermediate, "Continue the session.").unwrap();

    let model = ModelConfig {
        backend: ModelBackend::Ollama,
        model: None,
        base_url: "http://localhost:1".to_string(),
        temperature: 0.7,
        max_tokens: 64,
        timeout_seconds: 1,
    };

    Settings {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        primary_model: model.clone(),
        assistant_model: AssistantConfig {
            enabled: false,
            model,
        },
        retrieval: RetrievalConfig {
            enabled: false,
            index_url: "http://localhost:1".to_string(),
            top_k: 5,
            score_threshold: 0.59,
            timeout_seconds: 1,
            embedding: EmbeddingConfig {
                model: "none".to_string(),
                base_url: "http://localhost:1".to_string(),
                dimension: 4,
            },
        },
        session: SessionConfig {
            mock_mode: true,
            time_limit_minutes: None,
            message_limit: Some(2),
            token_limit: None,
            flag_ratio: 0.2,
        },
        prompts: PromptsConfig {
            initial_prompt_path: initial.to_string_lossy().into_owned(),
            intermediate_prompt_path: intermediate.to_string_lossy().into_owned(),
        },
        transcript: TranscriptConfig {
            dir: root.join("logs").to_string_lossy().into_owned(),
        },
    }
}

#[tokio::test]
async fn path_like_session_id_is_rejected_before_touching_disk() {
    let dir = tempfile::tempdir().unwrap();
    let secrets = dir.path().join("secrets");
    std::fs::create_dir_all(&secrets).unwrap();
    let bystander = secrets.join("victim.json");
    std::fs::write(&bystander, "{}").unwrap();

    let state = AppState::new(test_settings(dir.path()));
    let result = chat_handler(
        Extension(state),
        Json(ChatRequest {
            message: "hello".to_string(),
            session_id: Some("x/../../secrets/victim".to_string()),
        }),
    )
    .await;

    assert!(matches!(result, Err(ApiError::BadRequest(_))));
    // The file outside the transcript directory survives untouched
    assert!(bystander.exists());
}

#[tokio::test]
async fn monitor_evicts_session_once_end_flag_raised() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::new(test_settings(dir.path()));
    let sid = "00000000-0000-4000-8000-000000000001";

    for message in ["first", "second"] {
        chat_handler(
            Extension(state.clone()),
            Json(ChatRequest {
                message: message.to_string(),
                session_id: Some(sid.to_string()),
            }),
        )
        .await
        .unwrap();
    }

    let Json(verdict) = monitor_handler(Extension(state.clone()), UrlPath(sid.to_string()))
        .await
        .unwrap();
    assert_eq!(verdict.message_count, 2);
    assert!(verdict.end_flag);

    // The monitor endpoint already evicted the session
    assert!(state.registry.remove(sid).is_none());
}

#[tokio::test]
async fn transcript_is_replaced_on_session_creation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conv_replace.json");

    std::fs::write(&path, "stale content from a previous run\n").unwrap();

    let writer = TranscriptWriter::create(&path).unwrap();
    writer.write(&TranscriptEntry::human("fresh")).unwrap();

    let entries = read_entries(&path).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].role(), "Human");
}
