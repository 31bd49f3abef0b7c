use serde::{Deserialize, Serialize};

use super::time::now_ms;
use crate::gaze::zone_mapper::NO_ZONE;

/// ALS progression stage (ALSFRS-R handwriting score).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlsStage {
    /// Normal fine motor control.
    Stage1 = 1,
    /// Slow but every function still available.
    Stage2 = 2,
    /// Severe limitations.
    Stage3 = 3,
    /// No voluntary movement.
    Stage4 = 4,
}

impl Default for AlsStage {
    fn default() -> Self {
        Self::Stage1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EmotionState {
    pub valence: f32, // -1.0 - 1.0
    pub arousal: f32, // -1.0 - 1.0
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientState {
    pub als_stage: AlsStage,
    pub active_input_source: String,
    pub emotion: EmotionState,
    pub fatigue_level: f32, // 0.0 - 1.0
}

impl Default for PatientState {
    fn default() -> Self {
        Self {
            als_stage: AlsStage::default(),
            active_input_source: "gaze".to_string(),
            emotion: EmotionState::default(),
            fatigue_level: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentContext {
    pub location: String,
    pub people_present: Vec<String>,
    pub time_of_day: String,
    pub activity: String,
    pub description: String,
}

impl Default for EnvironmentContext {
    fn default() -> Self {
        Self {
            location: "home".to_string(),
            people_present: Vec::new(),
            time_of_day: "daytime".to_string(),
            activity: String::new(),
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Partner,
    Patient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: Speaker,
    pub text: String,
    pub timestamp_ms: u64,
}

impl ConversationEntry {
    pub fn new(role: Speaker, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp_ms: now_ms(),
        }
    }
}

/// Session state for candidate generation.
///
/// Owned by the `Pipeline`; the orchestrator only ever sees a clone.
/// History is append-only: there is no removal API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFrame {
    pub patient: PatientState,
    pub environment: EnvironmentContext,
    conversation_history: Vec<ConversationEntry>,
    pub current_zone_id: i32,
    /// Free-text personal voice profile used to bias phrasing.
    pub voice_profile: Option<String>,
}

impl Default for ContextFrame {
    fn default() -> Self {
        Self {
            patient: PatientState::default(),
            environment: EnvironmentContext::default(),
            conversation_history: Vec::new(),
            current_zone_id: NO_ZONE,
            voice_profile: None,
        }
    }
}

impl ContextFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_turn(&mut self, role: Speaker, text: impl Into<String>) {
        self.conversation_history.push(ConversationEntry::new(role, text));
    }

    pub fn history(&self) -> &[ConversationEntry] {
        &self.conversation_history
    }

    /// Last `n` turns, oldest first.
    pub fn recent_history(&self, n: usize) -> &[ConversationEntry] {
        let start = self.conversation_history.len().saturating_sub(n);
        &self.conversation_history[start..]
    }
}
