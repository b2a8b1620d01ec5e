//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use docqa_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Build a prompt from a definition and input variables.
///
/// This function:
/// 1. Checks that every variable the definition requires is present
/// 2. Renders the system and user templates using Handlebars
/// 3. Returns a `BuiltPrompt` ready for LLM execution
///
/// # Example
/// ```no_run
/// use docqa_prompt::{build_prompt, grounded_answer};
/// use std::collections::HashMap;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut vars = HashMap::new();
/// vars.insert("question".to_string(), "What is the capital of France?".to_string());
/// vars.insert("context".to_string(), "Paris is the capital of France.".to_string());
///
/// let built = build_prompt(&grounded_answer(), vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    if let Some(missing) = definition
        .input
        .required
        .iter()
        .find(|name| !variables.contains_key(name.as_str()))
    {
        return Err(AppError::Prompt(format!(
            "Prompt '{}' requires variable '{}'",
            definition.id, missing
        )));
    }

    let system = definition
        .system
        .as_deref()
        .map(|template| render_template(template, &variables))
        .transpose()?;
    let user = render_template(&definition.template, &variables)?;

    Ok(BuiltPrompt::new(system, user, definition.id.clone(), variables))
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("prompt", &variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::grounded_answer;

    fn vars(question: &str, context: &str) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("context".to_string(), context.to_string());
        vars
    }

    #[test]
    fn test_render_simple_template() {
        let result = render_template("Question: {{question}}", &vars("Hello, world!", ""));
        assert_eq!(result.unwrap(), "Question: Hello, world!");
    }

    #[test]
    fn test_no_html_escaping() {
        let result = render_template("{{context}}", &vars("", "Tom & \"Jerry\" <3"));
        assert_eq!(result.unwrap(), "Tom & \"Jerry\" <3");
    }

    #[test]
    fn test_grounded_answer_prompt() {
        let built = build_prompt(
            &grounded_answer(),
            vars("What is the capital of France?", "Paris is the capital of France."),
        )
        .unwrap();

        assert!(built.system.is_none());
        assert!(built.user.contains("Context from documents:\nParis is the capital of France."));
        assert!(built.user.contains("Question: What is the capital of France?"));
        assert!(built.user.contains("say so clearly"));
        assert_eq!(built.metadata.source_prompt_id, "answer.grounded");
    }

    #[test]
    fn test_missing_required_variable() {
        let mut variables = vars("q", "c");
        variables.remove("context");
        let result = build_prompt(&grounded_answer(), variables);
        assert!(matches!(result, Err(AppError::Prompt(msg)) if msg.contains("context")));
    }

    #[test]
    fn test_system_template_rendered() {
        let mut def = grounded_answer();
        def.system = Some("Answer about: {{question}}".to_string());
        let built = build_prompt(&def, vars("rivers", "")).unwrap();
        assert_eq!(built.system.as_deref(), Some("Answer about: rivers"));
    }
}
