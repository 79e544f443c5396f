//! Anthropic Claude provider implementation

use super::{check_status, ChatRequest, LlmProvider};
use crate::ai::{AIError, AIResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;

const DEFAULT_API_BASE: &str = "https://api.anthropic.com";

/// Anthropic API request structure
#[derive(Debug, Clone, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<AnthropicMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Anthropic API response structure
#[derive(Debug, Clone, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

/// Anthropic messages API provider
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    api_base: String,
    request_timeout: Duration,
}

impl AnthropicProvider {
    pub fn new(api_key: String, api_base: Option<String>, request_timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key,
            api_base: api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            request_timeout,
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "Anthropic"
    }

    async fn complete(&self, request: &ChatRequest) -> AIResult<String> {
        let body = AnthropicRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            messages: vec![AnthropicMessage {
                role: "user",
                content: &request.prompt,
            }],
            system: request.system.as_deref(),
            temperature: request.temperature,
        };

        let response = timeout(
            self.request_timeout,
            self.client
                .post(format!("{}/v1/messages", self.api_base))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&body)
                .send(),
        )
        .await
        .map_err(|_| AIError::timeout(self.request_timeout))??;
        let response = check_status(self.name(), response).await?;

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| AIError::invalid_response(format!("Failed to parse Anthropic response: {}", e)))?;

        let text: String = parsed
            .content
            .into_iter()
            .filter(|block| block.content_type == "text")
            .map(|block| block.text)
            .collect();

        if text.is_empty() {
            return Err(AIError::invalid_response("No text content in Anthropic response"));
        }
        Ok(text)
    }
}
