//! Completion provider trait.
//!
//! The answer-generation step talks to a chat-completion model through this
//! seam; the application crate supplies the OpenAI-compatible HTTP
//! implementation and tests supply canned providers.

use async_trait::async_trait;

use crate::error::PipelineError;

/// One completion call: a system instruction plus a user prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System-role instruction establishing the assistant's behavior.
    pub system: String,
    /// User-role prompt carrying the question and its context.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Response length cap in model tokens.
    pub max_tokens: u32,
}

/// Generates a text completion for a request.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Model identifier (e.g. `"gpt-4"`).
    fn model_name(&self) -> &str;

    /// Run one completion and return the assistant text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, PipelineError>;
}
