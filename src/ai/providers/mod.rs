//! LLM provider implementations

pub mod anthropic;
pub mod ollama;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;

use crate::ai::{AIError, AIResult};
use crate::config::{LlmConfig, LlmProviderType};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// One chat completion request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A chat completion backend
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Send one request and return the raw reply text
    async fn complete(&self, request: &ChatRequest) -> AIResult<String>;
}

/// Build the provider selected in the configuration
pub fn create_provider(config: &LlmConfig) -> AIResult<Arc<dyn LlmProvider>> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let api_base = config.api_base.clone();

    let provider: Arc<dyn LlmProvider> = match config.provider {
        LlmProviderType::OpenAI => {
            // A custom base may be a local OpenAI-compatible server without auth
            if config.api_key.is_none() && api_base.is_none() {
                return Err(AIError::config_error(
                    "OpenAI API key not configured (set OPENAI_API_KEY)",
                ));
            }
            Arc::new(OpenAIProvider::new(config.api_key.clone(), api_base, timeout))
        }
        LlmProviderType::Anthropic => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                AIError::config_error("Anthropic API key not configured (set ANTHROPIC_API_KEY)")
            })?;
            Arc::new(AnthropicProvider::new(api_key, api_base, timeout))
        }
        LlmProviderType::Ollama => Arc::new(OllamaProvider::new(api_base, timeout)),
    };

    tracing::info!("Using {} LLM provider", provider.name());
    Ok(provider)
}

/// Parse a `Retry-After` header given in seconds
pub(crate) fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Turn a provider response into its body, mapping failure statuses to errors
pub(crate) async fn check_status(provider: &str, response: reqwest::Response) -> AIResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = retry_after(&response);
    let body = response.text().await.unwrap_or_default();
    Err(AIError::from_status(provider, status, &body, retry_after))
}
