//! Backend kind enumeration.

use docqa_core::CandidateConfig;

/// Provider type enum for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    Ollama,
    Command,
}

impl ProviderType {
    /// Parse provider type from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "command" | "process" => Some(Self::Command),
            _ => None,
        }
    }

    /// Get the canonical provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Command => "command",
        }
    }

    /// Provider type of a configured candidate.
    pub fn of(candidate: &CandidateConfig) -> Self {
        match candidate {
            CandidateConfig::Ollama { .. } => Self::Ollama,
            CandidateConfig::Command { .. } => Self::Command,
        }
    }
}
