//! Generation backend factory.
//!
//! This module turns configured candidates into `LlmClient` trait objects.
//! Ollama candidates share a single HTTP client per endpoint.

use crate::client::LlmClient;
use crate::error::{LlmError, LlmResult};
use crate::providers::{CommandClient, OllamaClient};
use docqa_core::CandidateConfig;
use std::sync::Arc;

/// Create the client serving a configured candidate.
///
/// # Arguments
/// * `candidate` - The configured candidate
/// * `endpoint` - Ollama base URL, used by `ollama` candidates
/// * `shared_ollama` - Reused for `ollama` candidates when present
///
/// # Errors
/// Returns `InvalidConfig` if the endpoint is not an http(s) URL or the
/// command program is empty.
pub fn create_client(
    candidate: &CandidateConfig,
    endpoint: &str,
    shared_ollama: Option<&Arc<OllamaClient>>,
) -> LlmResult<Arc<dyn LlmClient>> {
    match candidate {
        CandidateConfig::Ollama { .. } => {
            if let Some(client) = shared_ollama {
                let client: Arc<dyn LlmClient> = client.clone();
                return Ok(client);
            }
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(LlmError::InvalidConfig(format!(
                    "Ollama endpoint must be an http(s) URL, got '{}'",
                    endpoint
                )));
            }
            Ok(Arc::new(OllamaClient::with_base_url(endpoint)))
        }
        CandidateConfig::Command { program, args, .. } => {
            if program.trim().is_empty() {
                return Err(LlmError::InvalidConfig(format!(
                    "candidate '{}' has an empty program",
                    candidate.name()
                )));
            }
            Ok(Arc::new(CommandClient::new(program.clone(), args.clone())))
        }
    }
}

/// Model identifier sent with requests for a candidate.
pub fn candidate_model(candidate: &CandidateConfig) -> String {
    match candidate {
        CandidateConfig::Ollama { name, model, .. } => {
            model.clone().unwrap_or_else(|| name.clone())
        }
        CandidateConfig::Command { name, .. } => name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let candidate = CandidateConfig::ollama("llama3.2:1b");
        let client = create_client(&candidate, "http://localhost:11434", None).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_shared_ollama_client_reused() {
        let shared = Arc::new(OllamaClient::with_base_url("http://localhost:8080"));
        let candidate = CandidateConfig::ollama("mistral:7b");
        let client = create_client(&candidate, "ignored", Some(&shared)).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let candidate = CandidateConfig::ollama("mistral:7b");
        match create_client(&candidate, "localhost:11434", None) {
            Err(LlmError::InvalidConfig(msg)) => assert!(msg.contains("http(s)")),
            _ => panic!("Expected invalid config error"),
        }
    }

    #[test]
    fn test_command_client() {
        let candidate = CandidateConfig::Command {
            name: "llamacpp".to_string(),
            rank: Some(1),
            program: "llama-cli".to_string(),
            args: vec!["-p".to_string(), "{prompt}".to_string()],
        };
        let client = create_client(&candidate, "", None).unwrap();
        assert_eq!(client.provider_name(), "command");
        assert_eq!(candidate_model(&candidate), "llamacpp");
    }

    #[test]
    fn test_candidate_model_defaults_to_name() {
        assert_eq!(
            candidate_model(&CandidateConfig::ollama("mistral:latest")),
            "mistral:latest"
        );
        let aliased = CandidateConfig::Ollama {
            name: "fast".to_string(),
            rank: None,
            model: Some("llama3.2:1b".to_string()),
        };
        assert_eq!(candidate_model(&aliased), "llama3.2:1b");
    }
}
