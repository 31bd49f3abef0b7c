//! Three-stage candidate generation.
//!
//! Every stage runs as its own task under its own timeout and sends its set
//! into one channel, so the caller sees sets in completion order. A stage that
//! times out, errors or parses to nothing is skipped without a trace in the
//! output. Cancellation only suppresses delivery; in-flight calls finish.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::candidate::parse_candidates;
use super::prompt::build_messages;
use crate::kernel::cancel::{CancellationRegistry, RequestState};
use crate::kernel::config::{GenerationSettings, Settings};
use crate::kernel::context::ContextFrame;
use crate::kernel::event::{CandidateSet, GenerationStage, RequestId};
use crate::kernel::telemetry::{DropReason, RequestOutcome, TelemetryEvent, TelemetryRecorder};
use crate::services::llm::{ChatCompletionsClient, CloudClient, GenerationRequest, TextGenerator};

/// A model tier: who to call and which model id to ask for.
#[derive(Clone)]
pub struct StageBackend {
    pub generator: Arc<dyn TextGenerator>,
    pub model: String,
}

impl StageBackend {
    pub fn new(generator: Arc<dyn TextGenerator>, model: impl Into<String>) -> Self {
        Self {
            generator,
            model: model.into(),
        }
    }
}

pub struct Orchestrator {
    local_fast: StageBackend,
    local_quality: StageBackend,
    cloud: StageBackend,
    settings: GenerationSettings,
    registry: CancellationRegistry,
    telemetry: TelemetryRecorder,
}

impl Orchestrator {
    pub fn new(
        local_fast: StageBackend,
        local_quality: StageBackend,
        cloud: StageBackend,
        settings: GenerationSettings,
        telemetry: TelemetryRecorder,
    ) -> Self {
        Self {
            local_fast,
            local_quality,
            cloud,
            settings,
            registry: CancellationRegistry::new(),
            telemetry,
        }
    }

    /// HTTP-backed stages: both local tiers share one model server, the cloud
    /// tier fails over across the configured providers.
    pub fn from_settings(settings: &Settings, telemetry: TelemetryRecorder) -> Self {
        let local: Arc<dyn TextGenerator> =
            Arc::new(ChatCompletionsClient::new(settings.local_llm_base_url.clone(), None));
        let cloud = CloudClient::from_settings(&settings.cloud_providers);
        info!("Cloud providers available: {:?}", cloud.available_providers());

        Self::new(
            StageBackend::new(Arc::clone(&local), settings.local_llm_model_fast.clone()),
            StageBackend::new(local, settings.local_llm_model_quality.clone()),
            // Each provider substitutes its own model id.
            StageBackend::new(Arc::new(cloud), String::new()),
            settings.generation.clone(),
            telemetry,
        )
    }

    fn stage_params(&self, stage: GenerationStage) -> (&StageBackend, f32, Duration) {
        let s = &self.settings;
        match stage {
            GenerationStage::LocalFast => (&self.local_fast, s.stage1_temperature, s.stage1_timeout()),
            GenerationStage::LocalQuality => {
                (&self.local_quality, s.stage2_temperature, s.stage2_timeout())
            }
            GenerationStage::Cloud => (&self.cloud, s.stage3_temperature, s.stage3_timeout()),
        }
    }

    /// Launches all three stages and returns the stream of their results.
    /// Must be called from inside a tokio runtime.
    pub fn generate(&self, context: &ContextFrame, num_candidates: usize) -> CandidateStream {
        let request_id = RequestId::new();
        let token = self.registry.open(request_id);
        let messages = build_messages(context, num_candidates);
        let (tx, rx) = mpsc::channel(GenerationStage::ALL.len());

        debug!("Request {} launching {} stages", request_id, GenerationStage::ALL.len());
        for stage in GenerationStage::ALL {
            let (backend, temperature, stage_timeout) = self.stage_params(stage);
            let job = StageJob {
                stage,
                request_id,
                generator: Arc::clone(&backend.generator),
                request: GenerationRequest {
                    model: backend.model.clone(),
                    messages: messages.clone(),
                    temperature,
                    max_tokens: self.settings.max_tokens,
                    timeout: stage_timeout,
                },
                num_candidates,
                token: token.clone(),
                tx: tx.clone(),
                telemetry: self.telemetry.clone(),
            };
            tokio::spawn(job.run());
        }

        CandidateStream {
            request_id,
            rx,
            token,
            registry: self.registry.clone(),
            telemetry: self.telemetry.clone(),
            finished: false,
        }
    }

    /// Suppresses any further delivery for `request_id`. False if it was
    /// unknown or already terminal.
    pub fn cancel(&self, request_id: RequestId) -> bool {
        let cancelled = self.registry.cancel(request_id);
        if cancelled {
            self.telemetry.record(TelemetryEvent::RequestFinished {
                request_id,
                outcome: RequestOutcome::Cancelled,
            });
        }
        cancelled
    }

    pub fn state(&self, request_id: RequestId) -> Option<RequestState> {
        self.registry.state(request_id)
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }
}

struct StageJob {
    stage: GenerationStage,
    request_id: RequestId,
    generator: Arc<dyn TextGenerator>,
    request: GenerationRequest,
    num_candidates: usize,
    token: CancellationToken,
    tx: mpsc::Sender<CandidateSet>,
    telemetry: TelemetryRecorder,
}

impl StageJob {
    fn dropped(&self, reason: DropReason) {
        debug!("Stage {:?} of {} dropped: {:?}", self.stage, self.request_id, reason);
        self.telemetry.record(TelemetryEvent::StageDropped {
            request_id: self.request_id,
            stage: self.stage,
            reason,
        });
    }

    async fn run(self) {
        let started = Instant::now();
        let outcome = timeout(self.request.timeout, self.generator.generate(&self.request)).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let raw = match outcome {
            Ok(Ok(Some(text))) => text,
            Ok(Ok(None)) => return self.dropped(DropReason::Empty),
            Ok(Err(e)) => {
                warn!("Stage {:?} failed: {:#}", self.stage, e);
                return self.dropped(DropReason::Error);
            }
            Err(_) => return self.dropped(DropReason::Timeout),
        };

        let candidates = parse_candidates(&raw, self.stage, latency_ms, self.num_candidates);
        if candidates.is_empty() {
            return self.dropped(DropReason::Unparseable);
        }
        if self.token.is_cancelled() {
            return self.dropped(DropReason::Cancelled);
        }

        let set = CandidateSet::new(candidates, self.stage, self.request_id);
        if self.tx.send(set).await.is_err() {
            // Stream already finished or was dropped.
            self.dropped(DropReason::Superseded);
        }
    }
}

/// Completion-ordered results of one `generate` call.
///
/// Ends once every stage has reported, or on cancel. The cloud set marks the
/// request complete, but local sets finishing after it are still yielded.
/// Dropping an unfinished stream cancels its request.
pub struct CandidateStream {
    request_id: RequestId,
    rx: mpsc::Receiver<CandidateSet>,
    token: CancellationToken,
    registry: CancellationRegistry,
    telemetry: TelemetryRecorder,
    finished: bool,
}

impl CandidateStream {
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub async fn next(&mut self) -> Option<CandidateSet> {
        if self.finished {
            return None;
        }

        let received = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            set = self.rx.recv() => Some(set),
        };

        match received {
            // Cancelled while waiting.
            None => {
                self.close(DropReason::Cancelled);
                None
            }
            // Every stage has reported.
            Some(None) => {
                self.complete();
                None
            }
            Some(Some(set)) if self.token.is_cancelled() => {
                self.telemetry.record(TelemetryEvent::StageDropped {
                    request_id: self.request_id,
                    stage: set.stage,
                    reason: DropReason::Cancelled,
                });
                self.close(DropReason::Cancelled);
                None
            }
            Some(Some(set)) => {
                self.telemetry.record(TelemetryEvent::StageDelivered {
                    request_id: self.request_id,
                    stage: set.stage,
                    latency_ms: set.candidates.first().map(|c| c.latency_ms).unwrap_or(0),
                    candidates: set.len(),
                });
                if set.is_final {
                    self.mark_complete();
                }
                Some(set)
            }
        }
    }

    /// Drains the stream.
    pub async fn collect(mut self) -> Vec<CandidateSet> {
        let mut sets = Vec::new();
        while let Some(set) = self.next().await {
            sets.push(set);
        }
        sets
    }

    fn mark_complete(&self) {
        if self.registry.complete(self.request_id) {
            self.telemetry.record(TelemetryEvent::RequestFinished {
                request_id: self.request_id,
                outcome: RequestOutcome::Complete,
            });
        }
    }

    fn complete(&mut self) {
        self.mark_complete();
        self.close(DropReason::Superseded);
    }

    /// Stops accepting results; anything already queued counts as dropped.
    fn close(&mut self, reason: DropReason) {
        self.finished = true;
        self.rx.close();
        while let Ok(set) = self.rx.try_recv() {
            self.telemetry.record(TelemetryEvent::StageDropped {
                request_id: self.request_id,
                stage: set.stage,
                reason,
            });
        }
    }
}

impl Drop for CandidateStream {
    fn drop(&mut self) {
        if !self.finished && self.registry.cancel(self.request_id) {
            self.telemetry.record(TelemetryEvent::RequestFinished {
                request_id: self.request_id,
                outcome: RequestOutcome::Cancelled,
            });
        }
    }
}
