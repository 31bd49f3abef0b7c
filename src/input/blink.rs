use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};

use super::ial::{EventCallback, InputAdapter};
use crate::kernel::config::BlinkSettings;
use crate::kernel::event::{EventType, IalEvent, InputSource};
use crate::vision::face::{eye_aspect_ratio, FaceFrame, LEFT_EYE_EAR, RIGHT_EYE_EAR};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EyeState {
    Open,
    Closed,
}

/// Closure classification state. Timestamps are caller-supplied milliseconds.
#[derive(Debug, Clone)]
struct BlinkState {
    eye: EyeState,
    close_start_ms: u64,
    last_blink_ms: Option<u64>,
    blink_count: u32,
}

impl Default for BlinkState {
    fn default() -> Self {
        Self {
            eye: EyeState::Open,
            close_start_ms: 0,
            last_blink_ms: None,
            blink_count: 0,
        }
    }
}

/// Eyelid-closure input: double blink = CONFIRM, triple = EMERGENCY,
/// long closure = CANCEL. CONFIRM fires on the second blink; a third inside
/// the window escalates to EMERGENCY.
pub struct BlinkAdapter {
    config: BlinkSettings,
    callback: Mutex<Option<EventCallback>>,
    running: AtomicBool,
    state: Mutex<BlinkState>,
}

impl BlinkAdapter {
    pub fn new(config: BlinkSettings) -> Self {
        Self {
            config,
            callback: Mutex::new(None),
            running: AtomicBool::new(false),
            state: Mutex::new(BlinkState::default()),
        }
    }

    /// Feeds one landmark frame. Ignored while stopped or without a callback.
    pub fn process_frame(&self, frame: &FaceFrame, now_ms: u64) -> Option<EventType> {
        let left = eye_aspect_ratio(frame, &LEFT_EYE_EAR)?;
        let right = eye_aspect_ratio(frame, &RIGHT_EYE_EAR)?;
        self.process_ear((left + right) / 2.0, now_ms)
    }

    /// Feeds an averaged EAR sample. Returns the event type emitted, if any.
    pub fn process_ear(&self, ear: f32, now_ms: u64) -> Option<EventType> {
        if !self.running.load(Ordering::Acquire) {
            return None;
        }
        let callback = self.callback.lock().unwrap_or_else(|p| p.into_inner()).clone()?;

        let emitted = {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            if ear < self.config.ear_threshold {
                if state.eye == EyeState::Open {
                    state.eye = EyeState::Closed;
                    state.close_start_ms = now_ms;
                }
                None
            } else if state.eye == EyeState::Closed {
                state.eye = EyeState::Open;
                let duration = now_ms.saturating_sub(state.close_start_ms);
                self.classify(&mut state, duration, now_ms)
            } else {
                None
            }
        };

        let event_type = emitted?;
        let event = match event_type {
            EventType::Cancel => IalEvent::cancel(InputSource::Blink, now_ms),
            EventType::Emergency => IalEvent::emergency(InputSource::Blink, now_ms),
            _ => IalEvent::confirm(InputSource::Blink, now_ms),
        };
        callback(event);
        Some(event_type)
    }

    fn classify(&self, state: &mut BlinkState, duration_ms: u64, now_ms: u64) -> Option<EventType> {
        if duration_ms < self.config.min_blink_duration_ms {
            debug!("Blink {}ms too short, ignored", duration_ms);
            return None;
        }

        if duration_ms > self.config.long_blink_duration_ms {
            state.blink_count = 0;
            return Some(EventType::Cancel);
        }

        if duration_ms > self.config.max_blink_duration_ms {
            // between regular and long: ambiguous
            return None;
        }

        let within_window = state
            .last_blink_ms
            .map_or(false, |last| now_ms.saturating_sub(last) < self.config.double_blink_window_ms);
        state.blink_count = if within_window { state.blink_count + 1 } else { 1 };
        state.last_blink_ms = Some(now_ms);

        match state.blink_count {
            n if n >= 3 => {
                state.blink_count = 0;
                Some(EventType::Emergency)
            }
            // count stays at 2 so a third blink in the window still escalates
            2 => Some(EventType::Confirm),
            _ => None,
        }
    }
}

#[async_trait]
impl InputAdapter for BlinkAdapter {
    fn source(&self) -> InputSource {
        InputSource::Blink
    }

    fn set_callback(&self, callback: EventCallback) {
        *self.callback.lock().unwrap_or_else(|p| p.into_inner()) = Some(callback);
    }

    async fn start(&self) -> anyhow::Result<()> {
        self.running.store(true, Ordering::Release);
        info!("Blink adapter started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.running.store(false, Ordering::Release);
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = BlinkState::default();
        Ok(())
    }
}
