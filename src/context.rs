//! Tool execution context.

use serde::Serialize;

/// What a tool knows about the call it is serving.
#[derive(Debug, Clone, Serialize)]
pub struct ToolContext {
    /// Authenticated user the turn runs for.
    pub user_id: String,
    pub thread_id: String,
    pub resource_id: String,
    /// Id of this invocation. Stable across suspend and resume.
    pub tool_call_id: String,
    /// Client-supplied data when re-invoking a suspended call.
    pub resume_data: Option<serde_json::Value>,
}

impl ToolContext {
    pub fn new(
        user_id: impl Into<String>,
        thread_id: impl Into<String>,
        resource_id: impl Into<String>,
        tool_call_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            thread_id: thread_id.into(),
            resource_id: resource_id.into(),
            tool_call_id: tool_call_id.into(),
            resume_data: None,
        }
    }

    pub fn with_resume_data(mut self, data: serde_json::Value) -> Self {
        self.resume_data = Some(data);
        self
    }

    pub fn is_resume(&self) -> bool {
        self.resume_data.is_some()
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new("default", "default", "default", "call_default")
    }
}
