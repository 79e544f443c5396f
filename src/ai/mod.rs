//! LLM integration
//!
//! Provider backends (OpenAI-compatible, Anthropic, Ollama) sit behind [`LlmProvider`].
//! [`LlmClient`] adds rate limiting and retries on top, and the judgment, summarizer and
//! briefing steps build their prompts on that client.

pub mod briefing;
pub mod client;
pub mod error;
pub mod judgment;
pub mod providers;
pub mod retry;
pub mod summarizer;

#[cfg(test)]
pub(crate) mod testing;

pub use briefing::BriefingGenerator;
pub use client::LlmClient;
pub use error::{AIError, AIResult};
pub use judgment::{JudgmentReport, JudgmentService};
pub use providers::{create_provider, ChatRequest, LlmProvider};
pub use retry::{RetryConfig, RetryManager};
pub use summarizer::Summarizer;

/// Strip Markdown code fences and surrounding prose from a JSON reply
pub fn extract_json(text: &str) -> &str {
    let mut body = text.trim();

    if let Some(rest) = body.strip_prefix("```") {
        // Drop the fence line, which may carry a language tag
        body = rest.split_once('\n').map(|(_, r)| r).unwrap_or("");
        body = body.trim_end();
        if let Some(inner) = body.strip_suffix("```") {
            body = inner;
        }
        body = body.trim();
    }

    let start = body.find(['{', '[']);
    let end = body.rfind(['}', ']']);
    match (start, end) {
        (Some(start), Some(end)) if start <= end => &body[start..=end],
        _ => body,
    }
}
