//! OpenAI provider implementation

use super::{check_status, ChatRequest, LlmProvider};
use crate::ai::{AIError, AIResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI API request structure
#[derive(Debug, Clone, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI API response structure
#[derive(Debug, Clone, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

/// OpenAI (or OpenAI-compatible) chat completions provider
pub struct OpenAIProvider {
    client: Client,
    api_key: Option<String>,
    api_base: String,
    request_timeout: Duration,
}

impl OpenAIProvider {
    pub fn new(api_key: Option<String>, api_base: Option<String>, request_timeout: Duration) -> Self {
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

    fn create_messages(request: &ChatRequest) -> Vec<OpenAIMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: Some(system.clone()),
            });
        }
        messages.push(OpenAIMessage {
            role: "user".to_string(),
            content: Some(request.prompt.clone()),
        });
        messages
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn complete(&self, request: &ChatRequest) -> AIResult<String> {
        let body = OpenAIRequest {
            model: &request.model,
            messages: Self::create_messages(request),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = timeout(self.request_timeout, builder.send())
            .await
            .map_err(|_| AIError::timeout(self.request_timeout))??;
        let response = check_status(self.name(), response).await?;

        let parsed: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| AIError::invalid_response(format!("Failed to parse OpenAI response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| AIError::invalid_response("No choices in OpenAI response"))
    }
}
