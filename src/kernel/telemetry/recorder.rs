use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::event::TelemetryEvent;
use super::metrics::{compute_snapshot, TelemetrySnapshot};

const MAX_EVENTS: usize = 10_000;

/// Bounded event log. Clones share the buffer so stage tasks can record
/// from their own tasks without routing through the pipeline.
#[derive(Debug, Clone)]
pub struct TelemetryRecorder {
    buffer: Arc<Mutex<VecDeque<TelemetryEvent>>>,
}

impl Default for TelemetryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryRecorder {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(MAX_EVENTS))),
        }
    }

    pub fn record(&self, event: TelemetryEvent) {
        let mut buffer = self.buffer.lock().unwrap_or_else(|p| p.into_inner());
        if buffer.len() >= MAX_EVENTS {
            buffer.pop_front();
        }
        buffer.push_back(event);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        // Delegate to pure functional metrics module
        let buffer = self.buffer.lock().unwrap_or_else(|p| p.into_inner());
        compute_snapshot(&buffer)
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.buffer.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }
}
