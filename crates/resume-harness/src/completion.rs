//! Completion provider implementations for answer generation.
//!
//! | Config value | Provider |
//! |--------------|----------|
//! | `"openai"` | [`OpenAiCompletions`] — OpenAI-compatible `/v1/chat/completions` |
//! | `"local"` | [`LocalCompletions`] — deterministic canned answers |
//!
//! Providers return the raw completion text; the RAG service owns the
//! empty-answer fallback, citations, and confidence scoring. A response
//! with no content is returned as an empty string, not an error.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use resume_harness_core::completion::{CompletionProvider, CompletionRequest};
use resume_harness_core::error::PipelineError;

use crate::config::CompletionConfig;

/// Chat-completion provider backed by an OpenAI-compatible HTTP endpoint.
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiCompletions {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompletions {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let api_key = match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => bail!("OPENAI_API_KEY environment variable not set"),
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletions {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, PipelineError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.prompt },
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::CompletionProvider(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::CompletionProvider(format!(
                "openai {status}: {body_text}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PipelineError::CompletionProvider(e.to_string()))?;
        Ok(extract_content(&json))
    }
}

/// Pull `choices[0].message.content` out of a chat-completion response.
/// Anything missing yields an empty string.
fn extract_content(json: &serde_json::Value) -> String {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Deterministic offline provider for tests and development.
///
/// Answers depend only on whether the prompt carries retrieved context,
/// so assertions about the empty-context path stay stable.
pub struct LocalCompletions;

const NO_CONTEXT_ANSWER: &str =
    "The context does not contain enough information to answer this question.";
const CONTEXT_ANSWER: &str =
    "Based on the provided context, the candidate's background matches the question; \
     the retrieved passages describe the relevant skills and experience.";

#[async_trait]
impl CompletionProvider for LocalCompletions {
    fn model_name(&self) -> &str {
        "local-canned"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, PipelineError> {
        // The answer prompt renders empty context as "Context:" followed
        // by a blank line.
        if request.prompt.contains("Context:\n\n") {
            Ok(NO_CONTEXT_ANSWER.to_string())
        } else {
            Ok(CONTEXT_ANSWER.to_string())
        }
    }
}

/// Instantiate the configured completion provider.
pub fn create_provider(config: &CompletionConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiCompletions::new(config)?)),
        "local" => Ok(Arc::new(LocalCompletions)),
        other => bail!("unknown completion provider: {other}"),
    }
}
