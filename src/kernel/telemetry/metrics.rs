use std::collections::{HashMap, VecDeque};

use super::event::{DropReason, RequestOutcome, TelemetryEvent};
use crate::kernel::event::GenerationStage;

#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    pub stages: HashMap<GenerationStage, StageStats>,
    pub request_stats: RequestStats,
    pub selections: u64,
    pub emergencies: u64,
}

#[derive(Debug, Clone, Default)]
pub struct StageStats {
    pub delivered: u64,
    pub dropped: u64,
    pub timeouts: u64,
    pub total_latency_ms: u64,
    pub avg_latency_ms: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RequestStats {
    pub completed: u64,
    pub cancelled: u64,
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();

    for event in events {
        match event {
            TelemetryEvent::StageDelivered { stage, latency_ms, .. } => {
                let stats = snap.stages.entry(*stage).or_default();
                stats.delivered += 1;
                stats.total_latency_ms += latency_ms;
            }
            TelemetryEvent::StageDropped { stage, reason, .. } => {
                let stats = snap.stages.entry(*stage).or_default();
                stats.dropped += 1;
                if *reason == DropReason::Timeout {
                    stats.timeouts += 1;
                }
            }
            TelemetryEvent::RequestFinished { outcome, .. } => match outcome {
                RequestOutcome::Complete => snap.request_stats.completed += 1,
                RequestOutcome::Cancelled => snap.request_stats.cancelled += 1,
            },
            TelemetryEvent::SelectionMade { .. } => snap.selections += 1,
            TelemetryEvent::EmergencyRaised => snap.emergencies += 1,
        }
    }

    // Compute Averages
    for stats in snap.stages.values_mut() {
        if stats.delivered > 0 {
            stats.avg_latency_ms = stats.total_latency_ms as f64 / stats.delivered as f64;
        }
    }

    snap
}
