//! Rate-limited, retrying LLM client shared by every AI step

use crate::ai::providers::{create_provider, ChatRequest, LlmProvider};
use crate::ai::retry::{RetryConfig, RetryManager};
use crate::ai::AIResult;
use crate::config::LlmConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

pub struct LlmClient {
    provider: Arc<dyn LlmProvider>,
    retry: RetryManager,
    config: LlmConfig,
    min_interval: Duration,
    /// Start of the most recent request
    last_call: Mutex<Option<Instant>>,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn LlmProvider>, config: LlmConfig) -> Self {
        let min_interval = Duration::from_secs_f64(config.min_interval_secs.max(0.0));
        Self {
            provider,
            retry: RetryManager::new(RetryConfig::from_llm_config(&config)),
            config,
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn from_config(config: &LlmConfig) -> AIResult<Self> {
        Ok(Self::new(create_provider(config)?, config.clone()))
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = RetryManager::new(retry);
        self
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Send `prompt` and return the trimmed reply. Unset options fall back to the configuration.
    pub async fn call(
        &self,
        prompt: &str,
        system: Option<&str>,
        model: Option<&str>,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> AIResult<String> {
        let request = ChatRequest {
            model: model.unwrap_or(&self.config.model).to_string(),
            system: system.map(str::to_string),
            prompt: prompt.to_string(),
            temperature: temperature.unwrap_or(self.config.temperature),
            max_tokens: max_tokens.unwrap_or(self.config.max_tokens),
        };

        let this = self;
        let request = &request;
        let reply = self
            .retry
            .execute_with_retry(move || async move {
                this.wait_for_rate_limit().await;
                this.provider.complete(request).await
            })
            .await?;

        Ok(reply.trim().to_string())
    }

    /// Keep consecutive requests at least `min_interval` apart
    async fn wait_for_rate_limit(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                tracing::debug!("LLM rate limiter: sleeping {:?}", wait);
                sleep(wait).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}
