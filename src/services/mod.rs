pub mod llm;
pub mod sink;
pub mod speech;
