use serde::{Deserialize, Serialize};

use crate::kernel::event::{GenerationStage, RequestId};

// Allowed: IDs, Stages, Durations, Indices
// Forbidden: Candidate text, Conversation history

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TelemetryEvent {
    StageDelivered {
        request_id: RequestId,
        stage: GenerationStage,
        latency_ms: u64,
        candidates: usize,
    },

    StageDropped {
        request_id: RequestId,
        stage: GenerationStage,
        reason: DropReason,
    },

    RequestFinished {
        request_id: RequestId,
        outcome: RequestOutcome,
    },

    SelectionMade {
        request_id: RequestId,
        index: usize,
        stage: GenerationStage,
    },

    EmergencyRaised,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropReason {
    /// Backend answered with nothing usable.
    Empty,
    /// Text came back but parsed to zero candidates.
    Unparseable,
    Timeout,
    Error,
    Cancelled,
    /// Request already completed by the cloud stage.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestOutcome {
    Complete,
    Cancelled,
}
