pub mod gaze;
pub mod input;
pub mod kernel;
pub mod planner;
pub mod services;
pub mod vision;

// Re-export specific items if needed for convenient access
pub use kernel::config::Settings;
pub use kernel::error::CoreError;
pub use kernel::pipeline::{Collaborators, Pipeline, PipelineEvent};
pub use planner::Orchestrator;
