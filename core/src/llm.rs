//! LLM-backed knowledge summarizer.
//!
//! Turns a (task, report) pair into a `(title, content)` knowledge draft via
//! an OpenAI-compatible chat completions endpoint. Failures never propagate:
//! the caller always gets a pair, with the sentinel title marking drafts
//! that could not be generated.

use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::config::LlmConfig;
use crate::errors::{KnowledgeError, KnowledgeResult};

/// Title marking a draft whose generation failed.
pub const KNOWLEDGE_FAILED_TITLE: &str = "Knowledge Generation Failed";

/// Fallback title when the model reply has no separator.
const FALLBACK_TITLE: &str = "Task Summary";

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Client for the configured summarization model.
pub struct LlmSummarizer {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl LlmSummarizer {
    /// Build a summarizer from configuration. Fails when the key is missing.
    pub fn new(config: &LlmConfig) -> KnowledgeResult<Self> {
        if config.api_key.is_empty() {
            return Err(KnowledgeError::Unconfigured);
        }
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(LlmSummarizer {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    /// Summarize a finished task into a reusable knowledge item.
    ///
    /// Returns `(title, content)`. On any failure the sentinel pair comes
    /// back instead, carrying the diagnostic as content.
    pub async fn summarize_for_knowledge(
        &self,
        task_details: &str,
        report_result: &str,
    ) -> (String, String) {
        info!("generating knowledge summary");
        match self.request_summary(task_details, report_result).await {
            Ok(raw) => split_summary(&raw),
            Err(e) => {
                error!(error = %e, "knowledge summarization failed");
                (
                    KNOWLEDGE_FAILED_TITLE.to_string(),
                    format!("Could not summarize task. Error: {}", e),
                )
            }
        }
    }

    async fn request_summary(
        &self,
        task_details: &str,
        report_result: &str,
    ) -> KnowledgeResult<String> {
        let prompt = format!(
            "Based on the following task description and its successful result, \
             generate a concise and reusable knowledge item.\n\n\
             The output should be in two parts, separated by \"---\":\n\
             1. A short, clear title for the knowledge item.\n\
             2. The main content, written to help others facing a similar task.\n\n\
             ---\nTask Description:\n{}\n\n---\nSuccessful Result/Report:\n{}\n---",
            task_details, report_result
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
                "temperature": self.temperature,
            }))
            .send()
            .await?
            .error_for_status()?;

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| KnowledgeError::InvalidResponse(e.to_string()))?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| KnowledgeError::InvalidResponse("empty choices".to_string()))
    }
}

/// Split a model reply into `(title, content)` on the first `---`.
fn split_summary(raw: &str) -> (String, String) {
    match raw.split_once("---") {
        Some((title, content)) => (title.trim().to_string(), content.trim().to_string()),
        None => (FALLBACK_TITLE.to_string(), raw.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_summary_on_separator() {
        let (title, content) = split_summary("Lease handling\n---\nAlways clear the lease on start.");
        assert_eq!(title, "Lease handling");
        assert_eq!(content, "Always clear the lease on start.");
    }

    #[test]
    fn test_split_summary_without_separator() {
        let (title, content) = split_summary("  just one blob of text  ");
        assert_eq!(title, FALLBACK_TITLE);
        assert_eq!(content, "just one blob of text");
    }

    #[test]
    fn test_split_summary_keeps_later_separators() {
        let (title, content) = split_summary("T---first---second");
        assert_eq!(title, "T");
        assert_eq!(content, "first---second");
    }

    #[test]
    fn test_summarizer_requires_api_key() {
        let config = LlmConfig::default();
        assert!(matches!(
            LlmSummarizer::new(&config),
            Err(KnowledgeError::Unconfigured)
        ));
    }
}
