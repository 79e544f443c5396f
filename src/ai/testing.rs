//! Scripted provider for unit tests

use crate::ai::providers::{ChatRequest, LlmProvider};
use crate::ai::{AIError, AIResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replies with queued results in order and records every request
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<AIResult<String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<AIResult<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "Scripted"
    }

    async fn complete(&self, request: &ChatRequest) -> AIResult<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AIError::invalid_response("no scripted reply left")))
    }
}
