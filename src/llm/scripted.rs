//! Deterministic provider that replays canned responses.
//!
//! Used by tests and for running the server without network access. Every
//! request is recorded so callers can assert on what the runner sent.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::llm::provider::{LlmProvider, ToolCompletionRequest, ToolCompletionResponse};

pub struct ScriptedProvider {
    responses: Mutex<VecDeque<ToolCompletionResponse>>,
    requests: Mutex<Vec<ToolCompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ToolCompletionResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue another response.
    pub fn push(&self, response: ToolCompletionResponse) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
    }

    /// Requests seen so far, oldest first.
    pub fn requests(&self) -> Vec<ToolCompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete_with_tools(
        &self,
        request: ToolCompletionRequest,
    ) -> Result<ToolCompletionResponse, LlmError> {
        let call = match self.requests.lock() {
            Ok(mut seen) => {
                seen.push(request);
                seen.len()
            }
            Err(_) => 0,
        };
        self.responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .ok_or(LlmError::ScriptExhausted { call })
    }
}
