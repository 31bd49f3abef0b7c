use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Instant;
use tracing::{info, warn};

/// Where synthesized audio can be fetched from, and how long it plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioRef {
    pub uri: String,
    pub duration_ms: u64,
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// `Ok(None)` when nothing could be produced.
    async fn synthesize(&self, text: &str, speaker_id: &str) -> Result<Option<AudioRef>>;
}

/// Speaks through a local command-line synthesizer (`say` by default) and
/// reports playback as done once the process exits.
pub struct CommandSynthesizer {
    command: String,
}

impl CommandSynthesizer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    async fn synthesize(&self, text: &str, speaker_id: &str) -> Result<Option<AudioRef>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        info!("[AUDIO] Spawning '{}' for speaker {}", self.command, speaker_id);

        let started = Instant::now();
        let status = tokio::process::Command::new(&self.command)
            .arg(text)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| anyhow!("failed to spawn '{}': {}", self.command, e))?;

        if !status.success() {
            warn!("'{}' exited with {}", self.command, status);
            return Ok(None);
        }

        Ok(Some(AudioRef {
            uri: format!("local://{}/{}", self.command, speaker_id),
            duration_ms: started.elapsed().as_millis() as u64,
        }))
    }
}
