//! Pipeline coordinator.
//!
//! Owns the `ContextFrame` and the current candidate set. Everything that
//! changes them (IAL events, stage results, partner speech) arrives as a
//! `PipelineEvent` on one inbox and is applied by `&mut self`, so the
//! orchestrator and the IAL only ever see snapshots.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::cancel::RequestState;
use super::config::{GazeSettings, Settings};
use super::context::{ContextFrame, Speaker};
use super::error::CoreError;
use super::event::{CandidateSet, EventType, IalEvent, RequestId, ServerMessage};
use super::telemetry::{TelemetryEvent, TelemetryRecorder};
use crate::gaze::{CalibrationResult, DualAxisSmoother, GazeCalibrator, SmootherConfig, ZoneMapper, ZoneResult};
use crate::input::{Ial, InputAdapter, KeyboardAdapter};
use crate::planner::Orchestrator;
use crate::services::sink::{CaregiverNotifier, MessageSink, Notification};
use crate::services::speech::SpeechSynthesizer;
use crate::vision::{FaceFrame, GazeEstimator, GazeSource};

const INBOX_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Input(IalEvent),
    Candidates(CandidateSet),
    GenerationFinished(RequestId),
    PartnerUtterance(String),
    Shutdown,
}

/// External capabilities the coordinator talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub sink: Arc<dyn MessageSink>,
    pub notifier: Arc<dyn CaregiverNotifier>,
}

pub struct Pipeline {
    context: ContextFrame,
    current_candidates: Option<CandidateSet>,
    active_request: Option<RequestId>,

    orchestrator: Arc<Orchestrator>,
    num_candidates: usize,

    estimator: GazeEstimator,
    smoother: DualAxisSmoother,
    calibrator: GazeCalibrator,
    zone_mapper: ZoneMapper,
    gaze: GazeSettings,

    ial: Ial,
    keyboard: Arc<KeyboardAdapter>,

    collaborators: Collaborators,
    tts_speaker: String,
    telemetry: TelemetryRecorder,

    inbox_tx: mpsc::Sender<PipelineEvent>,
    inbox_rx: mpsc::Receiver<PipelineEvent>,
}

impl Pipeline {
    pub fn new(
        settings: &Settings,
        orchestrator: Orchestrator,
        estimator: GazeEstimator,
        collaborators: Collaborators,
    ) -> Result<Self, CoreError> {
        let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_CAPACITY);
        let telemetry = orchestrator.telemetry().clone();

        Ok(Self {
            context: ContextFrame::new(),
            current_candidates: None,
            active_request: None,
            orchestrator: Arc::new(orchestrator),
            num_candidates: settings.generation.num_candidates,
            estimator,
            smoother: DualAxisSmoother::new(SmootherConfig::from(&settings.gaze)),
            calibrator: GazeCalibrator::new(),
            zone_mapper: ZoneMapper::new(settings.gaze.num_zones, settings.gaze.hysteresis_margin)?,
            gaze: settings.gaze.clone(),
            ial: Ial::new(),
            keyboard: Arc::new(KeyboardAdapter::new()),
            collaborators,
            tts_speaker: settings.tts_default_speaker.clone(),
            telemetry,
            inbox_tx,
            inbox_rx,
        })
    }

    /// Registers the keyboard adapter, routes IAL events into the inbox and starts the bus.
    pub async fn initialize(&mut self) {
        let keyboard: Arc<dyn InputAdapter> = self.keyboard.clone();
        self.ial.register(keyboard).await;

        let tx = self.inbox_tx.clone();
        self.ial.subscribe(move |event| {
            tx.try_send(PipelineEvent::Input(event.clone()))
                .map_err(|e| anyhow::anyhow!("pipeline inbox rejected event: {}", e))
        });

        self.ial.start().await;
        info!("Pipeline initialized (gaze: {:?})", self.estimator.method());
    }

    pub async fn shutdown(&mut self) {
        if let Some(id) = self.active_request.take() {
            self.orchestrator.cancel(id);
        }
        self.ial.stop().await;
        info!("Pipeline shut down");
    }

    /// Handle for feeding the coordinator from other tasks.
    pub fn inbox(&self) -> mpsc::Sender<PipelineEvent> {
        self.inbox_tx.clone()
    }

    /// Bus for registering additional input adapters.
    pub fn ial_mut(&mut self) -> &mut Ial {
        &mut self.ial
    }

    pub fn ial(&self) -> &Ial {
        &self.ial
    }

    pub fn context(&self) -> &ContextFrame {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ContextFrame {
        &mut self.context
    }

    pub fn current_candidates(&self) -> Option<&CandidateSet> {
        self.current_candidates.as_ref()
    }

    pub fn active_request(&self) -> Option<RequestId> {
        self.active_request
    }

    pub fn request_state(&self, request_id: RequestId) -> Option<RequestState> {
        self.orchestrator.state(request_id)
    }

    pub fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    // --- Gaze ---

    pub fn process_face_data(&mut self, frame: &FaceFrame) -> ZoneResult {
        let gaze = self.estimator.estimate(frame);
        self.process_gaze_sample(gaze.pitch, gaze.yaw)
    }

    /// Smoothed angles go through the calibration when one is stored,
    /// otherwise through the configured angular range.
    pub fn process_gaze_sample(&mut self, pitch: f32, yaw: f32) -> ZoneResult {
        let (pitch, yaw) = self.smoother.update(pitch, yaw);
        let (x, y) = if self.calibrator.is_calibrated() {
            let (x, y) = self.calibrator.apply_one((yaw as f64, pitch as f64));
            (x as f32, y as f32)
        } else {
            normalize_angles(pitch, yaw, &self.gaze)
        };

        let result = self.zone_mapper.map(x, y);
        self.context.current_zone_id = result.zone_id;
        result
    }

    /// Zone reported directly by a client that tracks gaze itself.
    pub fn handle_gaze_update(&mut self, zone_id: i32) {
        self.context.current_zone_id = zone_id;
    }

    pub fn calibrate(
        &mut self,
        gaze_points: &[(f64, f64)],
        screen_points: &[(f64, f64)],
    ) -> Result<CalibrationResult, CoreError> {
        let result = self.calibrator.calibrate(gaze_points, screen_points)?;
        if result.success {
            self.smoother.reset();
        }
        Ok(result)
    }

    pub fn reset_calibration(&mut self) {
        self.calibrator.reset();
        self.smoother.reset();
    }

    // --- Input ---

    pub fn handle_key(&self, key: &str) -> Option<IalEvent> {
        self.keyboard.handle_key(key)
    }

    /// Shared handle so key presses can come from another task.
    pub fn keyboard(&self) -> Arc<KeyboardAdapter> {
        Arc::clone(&self.keyboard)
    }

    pub fn on_event(&mut self, event: &IalEvent) {
        match event.event_type() {
            EventType::Confirm => {
                let zone = self.context.current_zone_id;
                if zone < 0 {
                    debug!("CONFIRM with no gazed zone");
                    return;
                }
                if let Some(request_id) = self.current_candidates.as_ref().map(|c| c.request_id) {
                    self.select_candidate(request_id, zone as usize);
                }
            }
            EventType::Select => {
                let target = event.target_id();
                let request_id = self.current_candidates.as_ref().map(|c| c.request_id);
                if let (Some(request_id), Some(target)) = (request_id, target) {
                    self.select_candidate(request_id, target);
                }
            }
            EventType::Emergency => self.raise_emergency(event),
            other => debug!("Pipeline ignores {:?} from {}", other, event.source()),
        }
    }

    fn raise_emergency(&mut self, event: &IalEvent) {
        warn!("EMERGENCY from {}", event.source());
        self.telemetry.record(TelemetryEvent::EmergencyRaised);

        let notifier = &self.collaborators.notifier;
        notifier.notify(Notification::emergency(format!(
            "The patient raised an emergency via {}",
            event.source()
        )));
        self.collaborators.sink.deliver(ServerMessage::EmergencyAck {
            notified_caregivers: notifier.caregivers(),
        });
    }

    // --- Generation ---

    /// Starts a new generation cycle, cancelling the previous one if still pending.
    /// Its sets arrive in the inbox as `PipelineEvent::Candidates`.
    pub fn trigger_generation(&mut self) -> RequestId {
        if let Some(previous) = self.active_request.take() {
            if self.orchestrator.cancel(previous) {
                debug!("Superseded request {}", previous);
            }
        }

        let mut stream = self.orchestrator.generate(&self.context, self.num_candidates);
        let request_id = stream.request_id();
        self.active_request = Some(request_id);

        let tx = self.inbox_tx.clone();
        tokio::spawn(async move {
            while let Some(set) = stream.next().await {
                if tx.send(PipelineEvent::Candidates(set)).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(PipelineEvent::GenerationFinished(request_id)).await;
        });

        info!("Generation {} started", request_id);
        request_id
    }

    fn on_candidates(&mut self, set: CandidateSet) {
        if self.active_request != Some(set.request_id) {
            debug!("Ignoring set from stale request {}", set.request_id);
            return;
        }

        self.collaborators.sink.deliver(ServerMessage::CandidateUpdate {
            request_id: set.request_id,
            candidate_set: set.clone(),
            is_final: set.is_final,
        });
        self.current_candidates = Some(set);
    }

    /// Speaks candidate `index` of the held set. A stale `request_id` or an
    /// out-of-range index does nothing. Returns whether a selection happened.
    pub fn select_candidate(&mut self, request_id: RequestId, index: usize) -> bool {
        let Some(set) = self.current_candidates.as_ref() else {
            return false;
        };
        if set.request_id != request_id {
            return false;
        }
        let Some(candidate) = set.get(index) else {
            return false;
        };
        let text = candidate.text.clone();
        let stage = set.stage;

        self.context.push_turn(Speaker::Patient, text.clone());
        self.orchestrator.cancel(request_id);
        // Sets still queued for this request must not replace what was spoken.
        self.active_request = None;
        self.telemetry.record(TelemetryEvent::SelectionMade {
            request_id,
            index,
            stage,
        });

        let speech = Arc::clone(&self.collaborators.speech);
        let sink = Arc::clone(&self.collaborators.sink);
        let speaker = self.tts_speaker.clone();
        tokio::spawn(async move {
            match speech.synthesize(&text, &speaker).await {
                Ok(Some(audio)) => sink.deliver(ServerMessage::TtsReady {
                    audio_url: audio.uri,
                    text,
                    duration_ms: audio.duration_ms,
                }),
                Ok(None) => warn!("Speech synthesis produced nothing"),
                Err(e) => {
                    error!("Speech synthesis failed: {:#}", e);
                    sink.deliver(ServerMessage::Error {
                        detail: "speech synthesis failed".to_string(),
                    });
                }
            }
        });
        true
    }

    /// Records what the partner said and restarts generation.
    pub fn add_partner_utterance(&mut self, text: impl Into<String>) -> RequestId {
        self.context.push_turn(Speaker::Partner, text);
        self.trigger_generation()
    }

    // --- Driver ---

    /// Applies one inbox event. Returns false on `Shutdown`.
    pub fn handle(&mut self, event: PipelineEvent) -> bool {
        match event {
            PipelineEvent::Input(event) => self.on_event(&event),
            PipelineEvent::Candidates(set) => self.on_candidates(set),
            PipelineEvent::GenerationFinished(id) => {
                if self.active_request == Some(id) {
                    debug!("Generation {} finished", id);
                }
            }
            PipelineEvent::PartnerUtterance(text) => {
                self.add_partner_utterance(text);
            }
            PipelineEvent::Shutdown => return false,
        }
        true
    }

    /// Waits for the next inbox event and applies it.
    pub async fn step(&mut self) -> bool {
        match self.inbox_rx.recv().await {
            Some(event) => self.handle(event),
            None => false,
        }
    }

    /// Applies events until `Shutdown`.
    pub async fn run(&mut self) {
        info!("Pipeline driver started");
        while self.step().await {}
        info!("Pipeline driver stopped");
    }
}

/// Linear map of the configured angular range onto [0,1]², clamped.
/// Looking up (positive pitch) lands near the top of the screen.
pub fn normalize_angles(pitch: f32, yaw: f32, gaze: &GazeSettings) -> (f32, f32) {
    let x = (yaw + gaze.yaw_range_deg) / (2.0 * gaze.yaw_range_deg);
    let y = (gaze.pitch_range_deg - pitch) / (2.0 * gaze.pitch_range_deg);
    (x.clamp(0.0, 1.0), y.clamp(0.0, 1.0))
}
