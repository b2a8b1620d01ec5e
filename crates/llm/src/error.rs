//! Error types for generation backends.
//!
//! Backends classify their failures so the answer chain can log what went
//! wrong with a candidate before moving on to the next one.

use docqa_core::AppError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    /// The backend or the requested model cannot be reached or started
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// The backend did not answer within its budget
    #[error("Backend timed out after {0:?}")]
    Timeout(Duration),

    /// The backend answered with something that is not usable text
    #[error("Malformed backend output: {0}")]
    Malformed(String),

    /// The backend ran but reported a failure
    #[error("Backend failed: {0}")]
    Failed(String),

    /// The backend is misconfigured
    #[error("Invalid backend configuration: {0}")]
    InvalidConfig(String),
}

impl LlmError {
    /// Stable short name, used in logs and attempt records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Timeout(_) => "timeout",
            Self::Malformed(_) => "malformed",
            Self::Failed(_) => "failed",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        AppError::Llm(err.to_string())
    }
}

pub type LlmResult<T> = Result<T, LlmError>;
