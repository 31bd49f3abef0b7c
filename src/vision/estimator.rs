use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::face::{
    distance, FaceFrame, LEFT_EYE_CONTOUR, LEFT_EYE_INNER, LEFT_EYE_OUTER, RIGHT_EYE_CONTOUR,
    RIGHT_EYE_INNER, RIGHT_EYE_OUTER,
};

/// Full horizontal / vertical range the iris heuristic maps onto, in degrees.
const HEURISTIC_YAW_SPAN: f32 = 60.0;
const HEURISTIC_PITCH_SPAN: f32 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GazeMethod {
    Model,
    Heuristic,
}

/// One gaze reading. Degrees: positive pitch = up, positive yaw = right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeResult {
    pub pitch: f32,
    pub yaw: f32,
    pub confidence: f32,
    pub method: GazeMethod,
}

/// Anything that turns a face frame into a gaze reading.
pub trait GazeSource: Send {
    fn estimate(&mut self, frame: &FaceFrame) -> GazeResult;
}

/// A learned gaze-angle regressor. Returns (pitch, yaw) in degrees.
pub trait GazeModel: Send {
    fn infer(&mut self, frame: &FaceFrame) -> anyhow::Result<(f32, f32)>;
}

/// Gaze estimation, selected once at start-up.
/// Callers never branch on which variant they hold.
pub enum GazeEstimator {
    Model(Box<dyn GazeModel>),
    Heuristic,
}

impl GazeEstimator {
    pub fn initialize(model: Option<Box<dyn GazeModel>>) -> Self {
        match model {
            Some(m) => {
                info!("Gaze estimator: model-backed");
                GazeEstimator::Model(m)
            }
            None => {
                info!("Gaze estimator: no model available, using iris heuristic");
                GazeEstimator::Heuristic
            }
        }
    }

    pub fn method(&self) -> GazeMethod {
        match self {
            GazeEstimator::Model(_) => GazeMethod::Model,
            GazeEstimator::Heuristic => GazeMethod::Heuristic,
        }
    }
}

impl GazeSource for GazeEstimator {
    fn estimate(&mut self, frame: &FaceFrame) -> GazeResult {
        if let GazeEstimator::Model(model) = self {
            match model.infer(frame) {
                Ok((pitch, yaw)) => {
                    return GazeResult {
                        pitch,
                        yaw,
                        confidence: 0.9,
                        method: GazeMethod::Model,
                    }
                }
                Err(e) => warn!("Gaze model inference failed, heuristic for this frame: {}", e),
            }
        }
        estimate_heuristic(frame)
    }
}

/// Iris offset from the eye centre, normalised by eye width, averaged over both eyes.
pub fn estimate_heuristic(frame: &FaceFrame) -> GazeResult {
    let fallback = GazeResult {
        pitch: 0.0,
        yaw: 0.0,
        confidence: 0.1,
        method: GazeMethod::Heuristic,
    };

    let (Some(left_center), Some(right_center)) = (
        frame.centroid(&LEFT_EYE_CONTOUR),
        frame.centroid(&RIGHT_EYE_CONTOUR),
    ) else {
        return fallback;
    };
    let (Some(lo), Some(li), Some(ro), Some(ri)) = (
        frame.landmark(LEFT_EYE_OUTER),
        frame.landmark(LEFT_EYE_INNER),
        frame.landmark(RIGHT_EYE_OUTER),
        frame.landmark(RIGHT_EYE_INNER),
    ) else {
        return fallback;
    };

    let left_width = distance(lo, li);
    let right_width = distance(ro, ri);
    if left_width < 1.0 || right_width < 1.0 {
        return fallback;
    }

    let left_dx = (frame.left_iris[0] - left_center[0]) / left_width;
    let left_dy = (frame.left_iris[1] - left_center[1]) / left_width;
    let right_dx = (frame.right_iris[0] - right_center[0]) / right_width;
    let right_dy = (frame.right_iris[1] - right_center[1]) / right_width;

    let dx = (left_dx + right_dx) / 2.0;
    let dy = (left_dy + right_dy) / 2.0;

    GazeResult {
        // image y grows downward
        pitch: -dy * HEURISTIC_PITCH_SPAN,
        yaw: dx * HEURISTIC_YAW_SPAN,
        confidence: 0.5,
        method: GazeMethod::Heuristic,
    }
}
