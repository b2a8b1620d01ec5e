//! Format-specific text extraction.
//!
//! Plain text is decoded in-process. PDF and the DOC family are handed to
//! external tools configured as argument templates where `{path}` stands for
//! the document path. A missing or failing tool affects only that document.

use crate::document::{Document, DocumentFormat};
use crate::error::ExtractError;
use docqa_core::ExtractionConfig;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

const PATH_PLACEHOLDER: &str = "{path}";
const TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// Turns a document into plain text.
#[async_trait::async_trait]
pub trait TextExtractor: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(&self, document: &Document) -> Result<String, ExtractError>;
}

/// UTF-8 text files. Content with NUL bytes is treated as binary and rejected.
#[derive(Debug, Default)]
pub struct PlainTextExtractor;

#[async_trait::async_trait]
impl TextExtractor for PlainTextExtractor {
    fn name(&self) -> &str {
        "plain-text"
    }

    async fn extract(&self, document: &Document) -> Result<String, ExtractError> {
        let failed = |reason: &str| ExtractError::ExtractionFailed {
            path: document.path.clone(),
            reason: reason.to_string(),
        };

        if document.bytes.contains(&0) {
            return Err(failed("file looks binary"));
        }

        let text = std::str::from_utf8(&document.bytes).map_err(|_| failed("not valid UTF-8"))?;
        Ok(text.strip_prefix('\u{feff}').unwrap_or(text).to_string())
    }
}

/// Runs an external converter that prints plain text on stdout.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: String,
    args: Vec<String>,
}

impl CommandExtractor {
    /// Build from an argument template; `None` when the template is empty.
    pub fn from_template(template: &[String]) -> Option<Self> {
        let (program, args) = template.split_first()?;
        if program.trim().is_empty() {
            return None;
        }
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait::async_trait]
impl TextExtractor for CommandExtractor {
    fn name(&self) -> &str {
        &self.program
    }

    async fn extract(&self, document: &Document) -> Result<String, ExtractError> {
        let failed = |reason: String| ExtractError::ExtractionFailed {
            path: document.path.clone(),
            reason,
        };

        let path = document.path.to_string_lossy();
        let args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace(PATH_PLACEHOLDER, &path))
            .collect();

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| failed(format!("cannot run '{}': {}", self.program, e)))?;

        let output = tokio::time::timeout(TOOL_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| failed(format!("'{}' timed out", self.program)))?
            .map_err(|e| failed(format!("'{}' failed: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Extractor lookup by document format.
#[derive(Clone)]
pub struct ExtractorRegistry {
    extractors: HashMap<DocumentFormat, Arc<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    /// Registry that only understands plain text.
    pub fn plain_text_only() -> Self {
        let mut extractors: HashMap<DocumentFormat, Arc<dyn TextExtractor>> = HashMap::new();
        extractors.insert(DocumentFormat::PlainText, Arc::new(PlainTextExtractor));
        Self { extractors }
    }

    /// Plain text plus the configured external converters.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        let mut registry = Self::plain_text_only();
        for (format, template) in [
            (DocumentFormat::Pdf, &config.pdf),
            (DocumentFormat::Doc, &config.doc),
            (DocumentFormat::Docx, &config.docx),
        ] {
            if let Some(extractor) = CommandExtractor::from_template(template) {
                registry = registry.with(format, Arc::new(extractor));
            }
        }
        registry
    }

    /// Register or replace the extractor for a format.
    pub fn with(mut self, format: DocumentFormat, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractors.insert(format, extractor);
        self
    }

    pub fn supports(&self, format: DocumentFormat) -> bool {
        self.extractors.contains_key(&format)
    }

    pub async fn extract(&self, document: &Document) -> Result<String, ExtractError> {
        let extractor = self
            .extractors
            .get(&document.format)
            .ok_or_else(|| ExtractError::UnsupportedFormat(document.path.clone()))?;

        tracing::debug!(
            path = %document.path.display(),
            extractor = extractor.name(),
            "Extracting text"
        );
        extractor.extract(document).await
    }
}
