use thiserror::Error;

/// Validation failures. Surfaced only to the immediate caller;
/// nothing in the core treats these as fatal.
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f32),

    #[error("SELECT event requires a target_id")]
    MissingTarget,

    #[error("zone layout needs at least one zone")]
    EmptyZoneLayout,

    #[error("calibration input mismatch: {gaze} gaze samples vs {targets} targets")]
    CalibrationMismatch { gaze: usize, targets: usize },

    #[error("config error: {0}")]
    Config(String),
}
