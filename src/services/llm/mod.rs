pub mod client;
pub mod cloud;

pub use client::{ChatCompletionsClient, ChatMessage, ChatRole, GenerationRequest, TextGenerator};
pub use cloud::{CloudClient, CloudProvider};
