pub mod cancel;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod pipeline;
pub mod telemetry;
pub mod time;
