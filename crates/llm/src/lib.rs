//! LLM integration crate for DocQA.
//!
//! This crate provides a backend-agnostic abstraction over the local
//! generation backends that answer questions from retrieved context.
//!
//! # Backends
//! - **Ollama**: Local LLM runtime reached over HTTP
//! - **Command**: A local generator program spawned once per request
//!
//! # Example
//! ```no_run
//! use docqa_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "llama3.2:1b");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use error::{LlmError, LlmResult};
pub use factory::{candidate_model, create_client};
pub use providers::{CommandClient, OllamaClient};
pub use types::ProviderType;
