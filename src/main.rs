use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use voicereach::kernel::event::ServerMessage;
use voicereach::kernel::telemetry::TelemetryRecorder;
use voicereach::services::sink::{ChannelSink, LogNotifier};
use voicereach::services::speech::CommandSynthesizer;
use voicereach::vision::GazeEstimator;
use voicereach::{Collaborators, Orchestrator, Pipeline, PipelineEvent, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = Settings::load(config_path.as_deref())?;
    tracing::info!("VoiceReach core booting (local LLM at {})", settings.local_llm_base_url);

    let telemetry = TelemetryRecorder::new();
    let orchestrator = Orchestrator::from_settings(&settings, telemetry.clone());

    // Stand-in transport: print what a client would receive.
    let (client_tx, mut client_rx) = mpsc::channel::<ServerMessage>(64);
    tokio::spawn(async move {
        while let Some(message) = client_rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(json) => println!("[CLIENT] {}", json),
                Err(e) => tracing::warn!("Unserializable message: {}", e),
            }
        }
    });

    let collaborators = Collaborators {
        speech: Arc::new(CommandSynthesizer::new(settings.tts_command.clone())),
        sink: Arc::new(ChannelSink::new(client_tx)),
        notifier: Arc::new(LogNotifier::new(vec!["primary caregiver".to_string()])),
    };

    let mut pipeline = Pipeline::new(&settings, orchestrator, GazeEstimator::initialize(None), collaborators)?;
    pipeline.initialize().await;

    let inbox = pipeline.inbox();
    let keyboard = pipeline.keyboard();

    // Stdin: "say <text>" is the partner speaking, "quit" stops, anything else is a key name.
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("Type 'say <text>' for the partner, a key (Space, 1-4, Escape, ...) for the patient, or 'quit'.");

        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "quit" {
                let _ = inbox.send(PipelineEvent::Shutdown).await;
                break;
            }
            if let Some(text) = line.strip_prefix("say ") {
                if inbox.send(PipelineEvent::PartnerUtterance(text.to_string())).await.is_err() {
                    break;
                }
            } else if keyboard.handle_key(line).is_none() {
                tracing::info!("Unmapped key '{}'", line);
            }
        }
    });

    pipeline.run().await;

    pipeline.shutdown().await;
    let snapshot = telemetry.snapshot();
    tracing::info!(
        "Session stats: {} completed, {} cancelled, {} selections, {} emergencies",
        snapshot.request_stats.completed,
        snapshot.request_stats.cancelled,
        snapshot.selections,
        snapshot.emergencies
    );
    Ok(())
}
