//! Ollama local provider implementation

use super::{check_status, ChatRequest, LlmProvider};
use crate::ai::{AIError, AIResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;

const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Ollama generate request
#[derive(Debug, Clone, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Clone, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct OllamaResponse {
    response: String,
}

/// Local Ollama server provider
pub struct OllamaProvider {
    client: Client,
    endpoint: String,
    request_timeout: Duration,
}

impl OllamaProvider {
    pub fn new(endpoint: Option<String>, request_timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint: endpoint
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
                .trim_end_matches('/')
                .to_string(),
            request_timeout,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "Ollama"
    }

    async fn complete(&self, request: &ChatRequest) -> AIResult<String> {
        let body = OllamaRequest {
            model: &request.model,
            prompt: &request.prompt,
            system: request.system.as_deref(),
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.endpoint);
        let response = timeout(self.request_timeout, self.client.post(&url).json(&body).send())
            .await
            .map_err(|_| AIError::timeout(self.request_timeout))??;
        let response = check_status(self.name(), response).await?;

        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| AIError::invalid_response(format!("Failed to parse Ollama response: {}", e)))?;
        Ok(parsed.response)
    }
}
