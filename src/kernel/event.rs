use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::error::CoreError;
use super::time::now_ms;

/// Hard cap on candidates presented at once (one per gaze zone in the 4-zone layout).
pub const MAX_CANDIDATES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    Gaze,
    Blink,
    Finger,
    Keyboard,
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputSource::Gaze => "gaze",
            InputSource::Blink => "blink",
            InputSource::Finger => "finger",
            InputSource::Keyboard => "keyboard",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Confirm,
    Cancel,
    Select,
    Scroll,
    Emergency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Canonical input event. Fields are private: the only way in is through
/// a validating constructor, so an `IalEvent` in hand is always well-formed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IalEventFields")]
pub struct IalEvent {
    event_type: EventType,
    source: InputSource,
    target_id: Option<usize>,
    scroll_direction: Option<ScrollDirection>,
    confidence: f32,
    timestamp_ms: u64,
}

#[derive(Deserialize)]
struct IalEventFields {
    event_type: EventType,
    source: InputSource,
    #[serde(default)]
    target_id: Option<usize>,
    #[serde(default)]
    scroll_direction: Option<ScrollDirection>,
    #[serde(default = "default_confidence")]
    confidence: f32,
    #[serde(default)]
    timestamp_ms: u64,
}

fn default_confidence() -> f32 {
    1.0
}

impl TryFrom<IalEventFields> for IalEvent {
    type Error = CoreError;

    fn try_from(raw: IalEventFields) -> Result<Self, Self::Error> {
        IalEvent::new(
            raw.event_type,
            raw.source,
            raw.target_id,
            raw.scroll_direction,
            raw.confidence,
            raw.timestamp_ms,
        )
    }
}

impl IalEvent {
    pub fn new(
        event_type: EventType,
        source: InputSource,
        target_id: Option<usize>,
        scroll_direction: Option<ScrollDirection>,
        confidence: f32,
        timestamp_ms: u64,
    ) -> Result<Self, CoreError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(CoreError::ConfidenceOutOfRange(confidence));
        }
        if event_type == EventType::Select && target_id.is_none() {
            return Err(CoreError::MissingTarget);
        }
        Ok(Self {
            event_type,
            source,
            target_id,
            scroll_direction,
            confidence,
            timestamp_ms,
        })
    }

    /// Full-confidence event of a type that carries no payload.
    fn bare(event_type: EventType, source: InputSource, timestamp_ms: u64) -> Self {
        Self {
            event_type,
            source,
            target_id: None,
            scroll_direction: None,
            confidence: 1.0,
            timestamp_ms,
        }
    }

    pub fn confirm(source: InputSource, timestamp_ms: u64) -> Self {
        Self::bare(EventType::Confirm, source, timestamp_ms)
    }

    pub fn cancel(source: InputSource, timestamp_ms: u64) -> Self {
        Self::bare(EventType::Cancel, source, timestamp_ms)
    }

    pub fn emergency(source: InputSource, timestamp_ms: u64) -> Self {
        Self::bare(EventType::Emergency, source, timestamp_ms)
    }

    pub fn select(source: InputSource, target_id: usize, timestamp_ms: u64) -> Self {
        Self {
            target_id: Some(target_id),
            ..Self::bare(EventType::Select, source, timestamp_ms)
        }
    }

    pub fn scroll(source: InputSource, direction: ScrollDirection, timestamp_ms: u64) -> Self {
        Self {
            scroll_direction: Some(direction),
            ..Self::bare(EventType::Scroll, source, timestamp_ms)
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn source(&self) -> InputSource {
        self.source
    }

    pub fn target_id(&self) -> Option<usize> {
        self.target_id
    }

    pub fn scroll_direction(&self) -> Option<ScrollDirection> {
        self.scroll_direction
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }
}

/// Ordered by expected latency, not by priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum GenerationStage {
    LocalFast = 1,
    LocalQuality = 2,
    Cloud = 3,
}

impl GenerationStage {
    pub const ALL: [GenerationStage; 3] = [
        GenerationStage::LocalFast,
        GenerationStage::LocalQuality,
        GenerationStage::Cloud,
    ];
}

impl From<GenerationStage> for u8 {
    fn from(stage: GenerationStage) -> u8 {
        stage as u8
    }
}

impl TryFrom<u8> for GenerationStage {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(GenerationStage::LocalFast),
            2 => Ok(GenerationStage::LocalQuality),
            3 => Ok(GenerationStage::Cloud),
            other => Err(format!("unknown generation stage {}", other)),
        }
    }
}

/// Pragmatic category of a candidate utterance. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentAxis {
    EmotionalResponse,
    Question,
    SelfReference,
    OtherReference,
    ActionRequest,
    Humor,
    TopicChange,
}

impl IntentAxis {
    pub const ALL: [IntentAxis; 7] = [
        IntentAxis::EmotionalResponse,
        IntentAxis::Question,
        IntentAxis::SelfReference,
        IntentAxis::OtherReference,
        IntentAxis::ActionRequest,
        IntentAxis::Humor,
        IntentAxis::TopicChange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentAxis::EmotionalResponse => "emotional_response",
            IntentAxis::Question => "question",
            IntentAxis::SelfReference => "self_reference",
            IntentAxis::OtherReference => "other_reference",
            IntentAxis::ActionRequest => "action_request",
            IntentAxis::Humor => "humor",
            IntentAxis::TopicChange => "topic_change",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|axis| axis.as_str() == name)
    }
}

/// Correlation token shared by every `CandidateSet` of one generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub text: String,
    pub intent_axis: IntentAxis,
    pub confidence: f32,
    pub generation_stage: GenerationStage,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSet {
    pub candidates: Vec<Candidate>,
    pub stage: GenerationStage,
    pub request_id: RequestId,
    pub timestamp_ms: u64,
    pub is_final: bool,
}

impl CandidateSet {
    /// Builds a set for `stage`. Only the cloud stage is final.
    pub fn new(mut candidates: Vec<Candidate>, stage: GenerationStage, request_id: RequestId) -> Self {
        candidates.truncate(MAX_CANDIDATES);
        Self {
            candidates,
            stage,
            request_id,
            timestamp_ms: now_ms(),
            is_final: stage == GenerationStage::Cloud,
        }
    }

    pub fn get(&self, index: usize) -> Option<&Candidate> {
        self.candidates.get(index)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Messages pushed to the client through the transport sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    CandidateUpdate {
        request_id: RequestId,
        candidate_set: CandidateSet,
        is_final: bool,
    },
    TtsReady {
        audio_url: String,
        text: String,
        duration_ms: u64,
    },
    EmergencyAck {
        notified_caregivers: Vec<String>,
    },
    Error {
        detail: String,
    },
}
