pub mod candidate;
pub mod orchestrator;
pub mod prompt;

pub use candidate::{parse_candidates, DEFAULT_INTENT_CYCLE};
pub use orchestrator::{CandidateStream, Orchestrator, StageBackend};
pub use prompt::build_messages;
