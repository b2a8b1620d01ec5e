//! Generation backend implementations.

pub mod command;
pub mod ollama;

pub use command::CommandClient;
pub use ollama::OllamaClient;
