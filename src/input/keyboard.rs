use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::info;

use super::ial::{EventCallback, InputAdapter};
use crate::kernel::event::{IalEvent, InputSource, ScrollDirection};
use crate::kernel::time::now_ms;

/// Keyboard stand-in for the assistive inputs, so the whole pipeline runs
/// without special hardware. Keys arrive from the client as DOM key names.
#[derive(Default)]
pub struct KeyboardAdapter {
    callback: Mutex<Option<EventCallback>>,
    running: AtomicBool,
}

impl KeyboardAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Translates `key` and emits it. Returns the emitted event, if any.
    pub fn handle_key(&self, key: &str) -> Option<IalEvent> {
        let callback = self.callback.lock().unwrap_or_else(|p| p.into_inner()).clone()?;
        let event = key_to_event(key, now_ms())?;
        callback(event.clone());
        Some(event)
    }
}

/// Space=CONFIRM, Backspace=CANCEL, Escape=EMERGENCY, 1-4=SELECT, arrows=SCROLL.
pub fn key_to_event(key: &str, timestamp_ms: u64) -> Option<IalEvent> {
    let source = InputSource::Keyboard;
    let event = match key {
        " " | "Space" => IalEvent::confirm(source, timestamp_ms),
        "Backspace" => IalEvent::cancel(source, timestamp_ms),
        "Escape" => IalEvent::emergency(source, timestamp_ms),
        "1" | "2" | "3" | "4" => {
            let index = key.parse::<usize>().ok()? - 1;
            IalEvent::select(source, index, timestamp_ms)
        }
        "ArrowUp" => IalEvent::scroll(source, ScrollDirection::Up, timestamp_ms),
        "ArrowDown" => IalEvent::scroll(source, ScrollDirection::Down, timestamp_ms),
        "ArrowLeft" => IalEvent::scroll(source, ScrollDirection::Left, timestamp_ms),
        "ArrowRight" => IalEvent::scroll(source, ScrollDirection::Right, timestamp_ms),
        _ => return None,
    };
    Some(event)
}

#[async_trait]
impl InputAdapter for KeyboardAdapter {
    fn source(&self) -> InputSource {
        InputSource::Keyboard
    }

    fn set_callback(&self, callback: EventCallback) {
        *self.callback.lock().unwrap_or_else(|p| p.into_inner()) = Some(callback);
    }

    async fn start(&self) -> anyhow::Result<()> {
        self.running.store(true, Ordering::Release);
        info!("Keyboard adapter started (Space=CONFIRM, Backspace=CANCEL, 1-4=SELECT, Esc=EMERGENCY, Arrows=SCROLL)");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.running.store(false, Ordering::Release);
        Ok(())
    }
}
