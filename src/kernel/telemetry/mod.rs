//! Generation and selection telemetry.
//!
//! # SAFETY INVARIANT
//! Telemetry is a READ-ONLY side-effect layer.
//! It must **NEVER** be read inside decision logic (Orchestrator or Pipeline).
//!
//! # PRIVACY INVARIANT
//! Telemetry events must **NEVER** contain what the patient or partner said.
//! Only request ids, stages, indices and durations are allowed.

pub mod event;
pub mod metrics;
pub mod recorder;

pub use event::{DropReason, RequestOutcome, TelemetryEvent};
pub use metrics::{compute_snapshot, RequestStats, StageStats, TelemetrySnapshot};
pub use recorder::TelemetryRecorder;
