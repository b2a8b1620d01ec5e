//! Prompt system for DocQA.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions
//! - Handlebars template rendering
//! - A built-in grounded-answer prompt that workspaces may override

pub mod builder;
pub mod defaults;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use defaults::{grounded_answer, GROUNDED_ANSWER_ID};
pub use loader::{list_prompts, load_or_default, load_prompt};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, PromptInputSpec};
