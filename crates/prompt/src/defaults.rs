//! Built-in prompt definitions.

use crate::types::{PromptDefinition, PromptInputSpec};

/// Identifier of the prompt used to answer questions from retrieved context.
pub const GROUNDED_ANSWER_ID: &str = "answer.grounded";

const GROUNDED_ANSWER_TEMPLATE: &str = "\
You are a helpful assistant that answers questions based on provided document context. \
Please provide a clear, well-structured answer based only on the information given.

Context from documents:
{{context}}

Question: {{question}}

Please answer the question based on the context above. \
If the answer cannot be found in the context, say so clearly.";

/// The grounded-answer prompt used when the workspace does not override it.
pub fn grounded_answer() -> PromptDefinition {
    PromptDefinition {
        id: GROUNDED_ANSWER_ID.to_string(),
        title: "Answer a question from document context".to_string(),
        api_version: "1.0".to_string(),
        created_by: "docqa".to_string(),
        system: None,
        input: PromptInputSpec {
            required: vec!["question".to_string(), "context".to_string()],
        },
        template: GROUNDED_ANSWER_TEMPLATE.to_string(),
    }
}
