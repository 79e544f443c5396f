//! Retry with exponential backoff for LLM calls

use crate::ai::{AIError, AIResult};
use crate::config::LlmConfig;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: usize,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter_enabled: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter_enabled: true,
        }
    }
}

impl RetryConfig {
    pub fn from_llm_config(config: &LlmConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: Duration::from_secs(config.retry_base_delay_secs),
            ..Self::default()
        }
    }
}

/// Retry mechanism for AI operations
#[derive(Debug, Clone)]
pub struct RetryManager {
    config: RetryConfig,
}

impl RetryManager {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Execute an operation, retrying retryable errors
    pub async fn execute_with_retry<F, Fut, T>(&self, operation: F) -> AIResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AIResult<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!("LLM call attempt {}/{}", attempt, self.config.max_attempts);

            let error = match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => error,
            };

            if !error.is_retryable() {
                warn!("LLM call failed with non-retryable error: {}", error);
                return Err(error);
            }

            if attempt >= self.config.max_attempts {
                warn!(
                    "LLM call failed after {} attempts, last error: {}",
                    self.config.max_attempts, error
                );
                return Err(error);
            }

            let delay = self.calculate_delay(attempt, &error);
            warn!(
                "LLM call failed (attempt {}/{}), retrying in {:?}: {}",
                attempt, self.config.max_attempts, delay, error
            );
            sleep(delay).await;
        }
    }

    /// Delay before the attempt after `attempt`
    fn calculate_delay(&self, attempt: usize, error: &AIError) -> Duration {
        if let Some(error_delay) = error.retry_delay() {
            return std::cmp::min(error_delay, self.config.max_delay);
        }

        let delay_ms = (self.config.base_delay.as_millis() as f64
            * self.config.backoff_multiplier.powi((attempt - 1) as i32)) as u64;
        let delay = std::cmp::min(Duration::from_millis(delay_ms), self.config.max_delay);

        if self.config.jitter_enabled {
            self.add_jitter(delay)
        } else {
            delay
        }
    }

    /// Add up to 10% random jitter
    fn add_jitter(&self, delay: Duration) -> Duration {
        use rand::Rng;

        let jitter_range = delay.as_millis() as f64 * 0.1;
        if jitter_range <= 0.0 {
            return delay;
        }
        let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
        let adjusted_ms = (delay.as_millis() as f64 + jitter).max(0.0) as u64;
        Duration::from_millis(adjusted_ms)
    }
}
