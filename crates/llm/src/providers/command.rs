//! Spawned-process generation backend.
//!
//! Runs a local generator program once per request. The prompt replaces a
//! `{prompt}` argument placeholder, or is written to stdin when no argument
//! contains one. The child is spawned with `kill_on_drop`, so abandoning the
//! `complete` future (timeout, deadline, caller cancellation) kills it.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use crate::error::{LlmError, LlmResult};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const PROMPT_PLACEHOLDER: &str = "{prompt}";
const MODEL_PLACEHOLDER: &str = "{model}";

/// Generation backend backed by a local program.
#[derive(Debug, Clone)]
pub struct CommandClient {
    program: String,
    args: Vec<String>,
}

impl CommandClient {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn uses_stdin(&self) -> bool {
        !self.args.iter().any(|a| a.contains(PROMPT_PLACEHOLDER))
    }

    fn render_args(&self, request: &LlmRequest) -> Vec<String> {
        self.args
            .iter()
            .map(|a| {
                a.replace(MODEL_PLACEHOLDER, &request.model)
                    .replace(PROMPT_PLACEHOLDER, &request.prompt)
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl LlmClient for CommandClient {
    fn provider_name(&self) -> &str {
        "command"
    }

    async fn complete(&self, request: &LlmRequest) -> LlmResult<LlmResponse> {
        let stdin = self.uses_stdin();
        let mut command = Command::new(&self.program);
        command
            .args(self.render_args(request))
            .stdin(if stdin { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            LlmError::Unavailable(format!("Failed to start '{}': {}", self.program, e))
        })?;
        tracing::debug!(program = %self.program, pid = ?child.id(), "Spawned generator");

        let pipe = if stdin { child.stdin.take() } else { None };
        let feed = async move {
            if let Some(mut pipe) = pipe {
                pipe.write_all(request.prompt.as_bytes()).await?;
                // Dropping the pipe closes stdin so the program sees EOF
            }
            Ok::<(), std::io::Error>(())
        };

        // stdout is drained while the prompt is written so neither pipe fills up
        let (written, output) = tokio::join!(feed, child.wait_with_output());
        let output = output.map_err(|e| {
            LlmError::Failed(format!("Failed to wait for '{}': {}", self.program, e))
        })?;
        match written {
            // The program may exit without reading all of its input
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                tracing::debug!(program = %self.program, "Generator closed stdin early")
            }
            Err(e) => return Err(LlmError::Failed(format!("Failed to write prompt: {}", e))),
            Ok(()) => {}
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LlmError::Failed(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr_tail(&stderr)
            )));
        }

        let content = String::from_utf8(output.stdout)
            .map_err(|_| LlmError::Malformed("generator output is not valid UTF-8".to_string()))?;

        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::default(),
            done: true,
        })
    }
}

/// Last few lines of stderr, enough to explain a failure in a log line.
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim().lines().collect();
    let start = lines.len().saturating_sub(3);
    lines[start..].join(" | ")
}
