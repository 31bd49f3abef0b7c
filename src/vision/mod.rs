pub mod estimator;
pub mod face;

pub use estimator::{GazeEstimator, GazeMethod, GazeModel, GazeResult, GazeSource};
pub use face::FaceFrame;
