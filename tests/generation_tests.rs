use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use voicereach::kernel::cancel::RequestState;
use voicereach::kernel::config::GenerationSettings;
use voicereach::kernel::context::{ContextFrame, Speaker};
use voicereach::kernel::event::{GenerationStage, IntentAxis};
use voicereach::kernel::telemetry::TelemetryRecorder;
use voicereach::planner::{parse_candidates, Orchestrator, StageBackend};
use voicereach::services::llm::{ChatMessage, ChatRole, CloudClient, CloudProvider, GenerationRequest, TextGenerator};

const FOUR: &str = r#"[
  {"text": "I'm fine, thanks", "intent": "emotional_response", "confidence": 0.9},
  {"text": "How was your day?", "intent": "question", "confidence": 0.8},
  {"text": "I'd like some water", "intent": "action_request", "confidence": 0.7},
  {"text": "Tell me more", "intent": "other_reference", "confidence": 0.6}
]"#;

#[derive(Clone)]
enum Reply {
    Text(&'static str),
    Nothing,
    Fail,
}

struct Scripted {
    delay: Duration,
    reply: Reply,
    models: Arc<Mutex<Vec<String>>>,
}

impl Scripted {
    fn new(delay_ms: u64, reply: Reply) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            reply,
            models: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl TextGenerator for Scripted {
    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<Option<String>> {
        self.models.lock().unwrap().push(request.model.clone());
        tokio::time::sleep(self.delay).await;
        match &self.reply {
            Reply::Text(t) => Ok(Some(t.to_string())),
            Reply::Nothing => Ok(None),
            Reply::Fail => Err(anyhow::anyhow!("backend down")),
        }
    }
}

fn backend(delay_ms: u64, reply: Reply) -> StageBackend {
    StageBackend::new(Arc::new(Scripted::new(delay_ms, reply)), "test-model")
}

fn orchestrator(fast: StageBackend, quality: StageBackend, cloud: StageBackend) -> Orchestrator {
    let settings = GenerationSettings {
        stage1_timeout_ms: 300,
        stage2_timeout_ms: 600,
        stage3_timeout_ms: 1000,
        ..GenerationSettings::default()
    };
    Orchestrator::new(fast, quality, cloud, settings, TelemetryRecorder::new())
}

fn context() -> ContextFrame {
    let mut ctx = ContextFrame::new();
    ctx.push_turn(Speaker::Partner, "How are you feeling today?");
    ctx
}

// --- Parsing ---

#[test]
fn test_parse_truncates_and_clamps() {
    let raw = r#"[
      {"text": "one", "intent": "question", "confidence": 1.5},
      {"text": "two", "intent": "nonsense", "confidence": -0.2},
      {"text": "three"},
      {"text": "four", "intent": "humor", "confidence": 0.4},
      {"text": "five", "intent": "question", "confidence": 0.3}
    ]"#;
    let out = parse_candidates(raw, GenerationStage::Cloud, 42, 4);

    assert_eq!(out.len(), 4);
    let texts: Vec<&str> = out.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["one", "two", "three", "four"]);
    assert!(out.iter().all(|c| (0.0..=1.0).contains(&c.confidence)));
    assert_eq!(out[0].confidence, 1.0);
    assert_eq!(out[1].confidence, 0.0);
    assert!((out[2].confidence - 0.7).abs() < 1e-6);

    // Unknown/missing intents fall back by position.
    assert_eq!(out[1].intent_axis, IntentAxis::Question);
    assert_eq!(out[2].intent_axis, IntentAxis::SelfReference);
    assert_eq!(out[3].intent_axis, IntentAxis::Humor);
    assert!(out.iter().all(|c| c.generation_stage == GenerationStage::Cloud && c.latency_ms == 42));
}

#[test]
fn test_parse_empty_input() {
    assert!(parse_candidates("", GenerationStage::LocalFast, 0, 4).is_empty());
    assert!(parse_candidates("   \n\n ", GenerationStage::LocalFast, 0, 4).is_empty());
}

#[test]
fn test_parse_line_fallback() {
    let long = "x".repeat(120);
    let raw = format!("1. Hello there\n- I'm hungry\n\n* \"Thank you\"\n{}\n2) Not now", long);
    let out = parse_candidates(&raw, GenerationStage::LocalQuality, 5, 10);

    let texts: Vec<&str> = out.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["Hello there", "I'm hungry", "Thank you", "Not now"]);
    assert!(out.iter().all(|c| c.confidence == 0.5));
    assert_eq!(out[0].intent_axis, IntentAxis::EmotionalResponse);
    assert_eq!(out[3].intent_axis, IntentAxis::ActionRequest);
}

#[test]
fn test_parse_unusable_array_falls_back_to_lines() {
    let out = parse_candidates("[]\n1. Hello\n2. Bye", GenerationStage::LocalFast, 0, 4);
    let texts: Vec<&str> = out.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["Hello", "Bye"]);

    let out = parse_candidates("[1, 2]\nYes please", GenerationStage::LocalFast, 0, 4);
    let texts: Vec<&str> = out.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["[1, 2]", "Yes please"]);
    assert!(out.iter().all(|c| c.confidence == 0.5));
}

#[test]
fn test_parse_respects_smaller_limit() {
    assert_eq!(parse_candidates(FOUR, GenerationStage::Cloud, 0, 2).len(), 2);
    assert!(parse_candidates(FOUR, GenerationStage::Cloud, 0, 0).is_empty());
}

// --- Orchestrator ---

#[tokio::test]
async fn test_cloud_only_success_yields_single_final_set() {
    let orch = orchestrator(
        backend(10, Reply::Nothing),
        backend(10, Reply::Fail),
        backend(50, Reply::Text(FOUR)),
    );
    let stream = orch.generate(&context(), 4);
    let id = stream.request_id();
    let sets = stream.collect().await;

    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].stage, GenerationStage::Cloud);
    assert!(sets[0].is_final);
    assert_eq!(sets[0].request_id, id);
    assert_eq!(sets[0].len(), 4);
    assert_eq!(orch.state(id), Some(RequestState::Complete));
}

#[tokio::test]
async fn test_sets_arrive_in_completion_order() {
    let orch = orchestrator(
        backend(120, Reply::Text(FOUR)),
        backend(10, Reply::Text(FOUR)),
        backend(250, Reply::Text(FOUR)),
    );
    let stream = orch.generate(&context(), 4);
    let id = stream.request_id();
    let sets = stream.collect().await;

    let stages: Vec<GenerationStage> = sets.iter().map(|s| s.stage).collect();
    assert_eq!(
        stages,
        vec![GenerationStage::LocalQuality, GenerationStage::LocalFast, GenerationStage::Cloud]
    );
    assert!(sets.iter().all(|s| s.request_id == id));
    assert_eq!(sets.iter().filter(|s| s.is_final).count(), 1);
}

#[tokio::test]
async fn test_local_sets_after_cloud_are_still_delivered() {
    let orch = orchestrator(
        backend(250, Reply::Nothing),
        backend(150, Reply::Text(FOUR)),
        backend(10, Reply::Text(FOUR)),
    );
    let mut stream = orch.generate(&context(), 4);
    let id = stream.request_id();

    let first = stream.next().await.unwrap();
    assert_eq!(first.stage, GenerationStage::Cloud);
    assert!(first.is_final);
    assert_eq!(orch.state(id), Some(RequestState::Complete));

    let rest = stream.collect().await;
    let stages: Vec<GenerationStage> = rest.iter().map(|s| s.stage).collect();
    assert_eq!(stages, vec![GenerationStage::LocalQuality]);
    assert!(!rest[0].is_final);
    assert_eq!(orch.state(id), Some(RequestState::Complete));

    let snapshot = orch.telemetry().snapshot();
    assert_eq!(snapshot.stages[&GenerationStage::LocalQuality].delivered, 1);
    assert_eq!(snapshot.stages[&GenerationStage::Cloud].delivered, 1);
    assert_eq!(snapshot.stages[&GenerationStage::LocalFast].dropped, 1);
    assert_eq!(snapshot.request_stats.completed, 1);
}

#[tokio::test]
async fn test_slow_stage_is_skipped_on_timeout() {
    let orch = orchestrator(
        backend(500, Reply::Text(FOUR)),
        backend(10, Reply::Text(FOUR)),
        backend(400, Reply::Nothing),
    );
    let sets = orch.generate(&context(), 4).collect().await;

    let stages: Vec<GenerationStage> = sets.iter().map(|s| s.stage).collect();
    assert_eq!(stages, vec![GenerationStage::LocalQuality]);
    assert_eq!(orch.telemetry().snapshot().stages[&GenerationStage::LocalFast].timeouts, 1);
}

#[tokio::test]
async fn test_total_failure_ends_empty() {
    let orch = orchestrator(
        backend(5, Reply::Fail),
        backend(5, Reply::Text("   ")),
        backend(5, Reply::Nothing),
    );
    let stream = orch.generate(&context(), 4);
    let id = stream.request_id();

    let sets = tokio::time::timeout(Duration::from_secs(2), stream.collect())
        .await
        .expect("stream must end on its own");
    assert!(sets.is_empty());
    assert_eq!(orch.state(id), Some(RequestState::Complete));
}

#[tokio::test]
async fn test_cancel_suppresses_later_stages() {
    let orch = orchestrator(
        backend(10, Reply::Text(FOUR)),
        backend(150, Reply::Text(FOUR)),
        backend(250, Reply::Text(FOUR)),
    );
    let mut stream = orch.generate(&context(), 4);
    let id = stream.request_id();

    let first = stream.next().await.expect("fast stage delivers");
    assert_eq!(first.stage, GenerationStage::LocalFast);

    assert!(orch.cancel(id));
    assert!(!orch.cancel(id), "cancel is not repeatable");
    assert!(stream.next().await.is_none());
    assert_eq!(orch.state(id), Some(RequestState::Cancelled));

    // In-flight calls still finish; their results are dropped.
    tokio::time::sleep(Duration::from_millis(350)).await;
    let snapshot = orch.telemetry().snapshot();
    assert_eq!(snapshot.stages[&GenerationStage::LocalQuality].dropped, 1);
    assert_eq!(snapshot.stages[&GenerationStage::Cloud].dropped, 1);
    assert_eq!(snapshot.request_stats.cancelled, 1);
    assert_eq!(snapshot.request_stats.completed, 0);
}

#[tokio::test]
async fn test_cancelled_request_stays_cancelled() {
    let orch = orchestrator(
        backend(5, Reply::Text(FOUR)),
        backend(5, Reply::Text(FOUR)),
        backend(5, Reply::Text(FOUR)),
    );
    let stream = orch.generate(&context(), 4);
    let id = stream.request_id();
    orch.cancel(id);

    assert!(stream.collect().await.is_empty());
    assert_eq!(orch.state(id), Some(RequestState::Cancelled));
}

#[tokio::test]
async fn test_stage_parameters_reach_backends() {
    let fast = Arc::new(Scripted::new(5, Reply::Nothing));
    let models = Arc::clone(&fast.models);
    let orch = orchestrator(
        StageBackend::new(fast, "tiny"),
        backend(5, Reply::Nothing),
        backend(5, Reply::Nothing),
    );
    orch.generate(&context(), 4).collect().await;
    assert_eq!(*models.lock().unwrap(), vec!["tiny".to_string()]);
}

// --- Cloud failover ---

fn request(timeout_ms: u64) -> GenerationRequest {
    GenerationRequest {
        model: String::new(),
        messages: vec![ChatMessage::new(ChatRole::User, "hi")],
        temperature: 0.8,
        max_tokens: 200,
        timeout: Duration::from_millis(timeout_ms),
    }
}

fn provider(name: &str, generator: Arc<Scripted>) -> CloudProvider {
    CloudProvider {
        name: name.to_string(),
        model: format!("{}-model", name),
        generator,
    }
}

#[tokio::test]
async fn test_cloud_fails_over_in_order() {
    let broken = Arc::new(Scripted::new(5, Reply::Fail));
    let empty = Arc::new(Scripted::new(5, Reply::Nothing));
    let good = Arc::new(Scripted::new(5, Reply::Text("ok")));
    let unused = Arc::new(Scripted::new(5, Reply::Text("never")));

    let client = CloudClient::new(vec![
        provider("a", broken.clone()),
        provider("b", empty.clone()),
        provider("c", good.clone()),
        provider("d", unused.clone()),
    ]);
    assert_eq!(client.available_providers(), vec!["a", "b", "c", "d"]);

    let out = client.generate(&request(1000)).await.unwrap();
    assert_eq!(out.as_deref(), Some("ok"));
    assert_eq!(*good.models.lock().unwrap(), vec!["c-model".to_string()]);
    assert!(unused.models.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_cloud_gives_up_at_deadline() {
    let slow = Arc::new(Scripted::new(500, Reply::Text("late")));
    let next = Arc::new(Scripted::new(5, Reply::Text("too late")));
    let client = CloudClient::new(vec![provider("slow", slow), provider("next", next.clone())]);

    let out = client.generate(&request(100)).await.unwrap();
    assert_eq!(out, None);
    assert!(next.models.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_cloud_without_providers_returns_nothing() {
    let client = CloudClient::new(Vec::new());
    assert_eq!(client.generate(&request(100)).await.unwrap(), None);
}
