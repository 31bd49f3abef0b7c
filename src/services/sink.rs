use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::kernel::event::ServerMessage;
use crate::kernel::time::now_ms;

/// Client-bound delivery. Must not block; delivery failures stay with the transport.
pub trait MessageSink: Send + Sync {
    fn deliver(&self, message: ServerMessage);
}

/// Sink backed by a bounded channel drained by the transport task.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<ServerMessage>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<ServerMessage>) -> Self {
        Self { tx }
    }
}

impl MessageSink for ChannelSink {
    fn deliver(&self, message: ServerMessage) {
        if let Err(e) = self.tx.try_send(message) {
            warn!("Transport sink dropped a message: {}", e);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Emergency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub body: String,
    pub timestamp_ms: u64,
    pub requires_ack: bool,
}

impl Notification {
    pub fn emergency(body: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Emergency,
            title: "Emergency".to_string(),
            body: body.into(),
            timestamp_ms: now_ms(),
            requires_ack: true,
        }
    }
}

/// Caregiver alerting. Fire-and-forget.
pub trait CaregiverNotifier: Send + Sync {
    fn notify(&self, notification: Notification);

    /// Who `notify` reaches, for the client acknowledgement.
    fn caregivers(&self) -> Vec<String>;
}

/// Notifier that only writes to the log. Used when no push channel is set up.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    caregivers: Vec<String>,
}

impl LogNotifier {
    pub fn new(caregivers: Vec<String>) -> Self {
        Self { caregivers }
    }
}

impl CaregiverNotifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        warn!(
            "[CAREGIVER-{:?}] {}: {} (ack required: {})",
            notification.level, notification.title, notification.body, notification.requires_ack
        );
    }

    fn caregivers(&self) -> Vec<String> {
        self.caregivers.clone()
    }
}
